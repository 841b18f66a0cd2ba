//! Basic procedural mesh generation routines.
//!
//! Generated meshes have every cell in material `1` and the following boundaries:
//!
//! | id | face     |
//! |----|----------|
//! | 1  | `x = 0`  |
//! | 2  | `y = 0`  |
//! | 3  | `x = lx` |
//! | 4  | `y = ly` |
//! | 5  | `z = 0`  |
//! | 6  | `z = lz` |
use crate::element::ElementType;
use crate::mesh::{Cell, Mesh};
use eyre::eyre;
use nalgebra::DVector;

pub const X_MIN: usize = 1;
pub const Y_MIN: usize = 2;
pub const X_MAX: usize = 3;
pub const Y_MAX: usize = 4;
pub const Z_MIN: usize = 5;
pub const Z_MAX: usize = 6;

/// Generates the rectangle `[0, lx] x [0, ly]` split into `nx * ny` quadrilaterals.
pub fn create_rectangular_uniform_quad_mesh(lx: f64, ly: f64, nx: usize, ny: usize) -> eyre::Result<Mesh> {
    if nx == 0 || ny == 0 {
        return Err(eyre!("at least one cell per direction is required"));
    }
    let to_global_vertex_index = |i: usize, j: usize| (nx + 1) * j + i;

    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            let x = lx * i as f64 / nx as f64;
            let y = ly * j as f64 / ny as f64;
            vertices.push(DVector::from_column_slice(&[x, y]));
        }
    }

    let mut cells = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let nodes = vec![
                to_global_vertex_index(i, j),
                to_global_vertex_index(i + 1, j),
                to_global_vertex_index(i + 1, j + 1),
                to_global_vertex_index(i, j + 1),
            ];
            cells.push(Cell::new(ElementType::Quad4, nodes, 1));
        }
    }

    let mut mesh = Mesh::from_vertices_and_cells(2, vertices, cells)?;
    mesh.add_boundary(X_MIN, (0..=ny).map(|j| to_global_vertex_index(0, j)))?;
    mesh.add_boundary(X_MAX, (0..=ny).map(|j| to_global_vertex_index(nx, j)))?;
    mesh.add_boundary(Y_MIN, (0..=nx).map(|i| to_global_vertex_index(i, 0)))?;
    mesh.add_boundary(Y_MAX, (0..=nx).map(|i| to_global_vertex_index(i, ny)))?;
    Ok(mesh)
}

/// Same as [`create_rectangular_uniform_quad_mesh`], with every quadrilateral split into two
/// triangles.
pub fn create_rectangular_uniform_tri_mesh(lx: f64, ly: f64, nx: usize, ny: usize) -> eyre::Result<Mesh> {
    let quads = create_rectangular_uniform_quad_mesh(lx, ly, nx, ny)?;
    let cells = quads
        .cells()
        .iter()
        .flat_map(|quad| {
            let [a, b, c, d] = [quad.nodes[0], quad.nodes[1], quad.nodes[2], quad.nodes[3]];
            [
                Cell::new(ElementType::Tri3, vec![a, b, c], quad.attribute),
                Cell::new(ElementType::Tri3, vec![a, c, d], quad.attribute),
            ]
        })
        .collect();
    let mut mesh = Mesh::from_vertices_and_cells(2, quads.vertices().to_vec(), cells)?;
    for id in [X_MIN, Y_MIN, X_MAX, Y_MAX] {
        let nodes = quads.boundary_nodes(id).unwrap_or(&[]).to_vec();
        mesh.add_boundary(id, nodes)?;
    }
    Ok(mesh)
}

/// Generates the box `[0, lx] x [0, ly] x [0, lz]` split into `nx * ny * nz` hexahedra.
pub fn create_rectangular_uniform_hex_mesh(
    [lx, ly, lz]: [f64; 3],
    [nx, ny, nz]: [usize; 3],
) -> eyre::Result<Mesh> {
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(eyre!("at least one cell per direction is required"));
    }
    let to_global_vertex_index = |i: usize, j: usize, k: usize| (nx + 1) * (ny + 1) * k + (nx + 1) * j + i;

    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                let x = lx * i as f64 / nx as f64;
                let y = ly * j as f64 / ny as f64;
                let z = lz * k as f64 / nz as f64;
                vertices.push(DVector::from_column_slice(&[x, y, z]));
            }
        }
    }

    let mut cells = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let nodes = vec![
                    to_global_vertex_index(i, j, k),
                    to_global_vertex_index(i + 1, j, k),
                    to_global_vertex_index(i + 1, j + 1, k),
                    to_global_vertex_index(i, j + 1, k),
                    to_global_vertex_index(i, j, k + 1),
                    to_global_vertex_index(i + 1, j, k + 1),
                    to_global_vertex_index(i + 1, j + 1, k + 1),
                    to_global_vertex_index(i, j + 1, k + 1),
                ];
                cells.push(Cell::new(ElementType::Hex8, nodes, 1));
            }
        }
    }

    let mut mesh = Mesh::from_vertices_and_cells(3, vertices, cells)?;
    let all = || (0..=nz).flat_map(move |k| (0..=ny).flat_map(move |j| (0..=nx).map(move |i| (i, j, k))));
    let face = |predicate: &dyn Fn(usize, usize, usize) -> bool| -> Vec<usize> {
        all()
            .filter(|&(i, j, k)| predicate(i, j, k))
            .map(|(i, j, k)| to_global_vertex_index(i, j, k))
            .collect()
    };
    mesh.add_boundary(X_MIN, face(&|i, _, _| i == 0))?;
    mesh.add_boundary(Y_MIN, face(&|_, j, _| j == 0))?;
    mesh.add_boundary(X_MAX, face(&|i, _, _| i == nx))?;
    mesh.add_boundary(Y_MAX, face(&|_, j, _| j == ny))?;
    mesh.add_boundary(Z_MIN, face(&|_, _, k| k == 0))?;
    mesh.add_boundary(Z_MAX, face(&|_, _, k| k == nz))?;
    Ok(mesh)
}
