//! Vector-valued Lagrange discretization of a mesh.
use crate::element::ElementType;
use crate::mesh::Mesh;
use eyre::eyre;
use nalgebra::{DMatrix, DVector};
use nlfem_behaviour::Hypothesis;
use std::f64::consts::{PI, SQRT_2};
use std::ops::Range;

/// Linear Lagrange discretization with one unknown per node and space direction.
///
/// The degrees of freedom are interleaved: `dof = node * number_of_components + component`.
/// When partitioned, a discretization owns a contiguous chunk of the elements of the mesh while
/// the vector of unknowns is replicated on every partition.
#[derive(Debug, Clone)]
pub struct FiniteElementDiscretization {
    mesh: Mesh,
    rank: usize,
    size: usize,
    owned_elements: Range<usize>,
}

impl FiniteElementDiscretization {
    pub fn new(mesh: Mesh) -> Self {
        let n = mesh.number_of_cells();
        Self {
            mesh,
            rank: 0,
            size: 1,
            owned_elements: 0..n,
        }
    }

    /// Discretization of partition `rank` out of `size`.
    pub fn partitioned(mesh: Mesh, rank: usize, size: usize) -> eyre::Result<Self> {
        if size == 0 || rank >= size {
            return Err(eyre!("invalid partition {} of {}", rank, size));
        }
        let n = mesh.number_of_cells();
        let chunk = (n + size - 1) / size;
        let begin = usize::min(rank * chunk, n);
        let end = usize::min(begin + chunk, n);
        Ok(Self {
            mesh,
            rank,
            size,
            owned_elements: begin..end,
        })
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn number_of_partitions(&self) -> usize {
        self.size
    }

    pub fn number_of_components(&self) -> usize {
        self.mesh.dimension()
    }

    pub fn number_of_dofs(&self) -> usize {
        self.number_of_components() * self.mesh.number_of_vertices()
    }

    /// Elements owned by this partition.
    pub fn elements(&self) -> Range<usize> {
        self.owned_elements.clone()
    }

    pub fn owns_element(&self, element: usize) -> bool {
        self.owned_elements.contains(&element)
    }

    pub fn element_type(&self, element: usize) -> ElementType {
        self.mesh.cell(element).element_type
    }

    pub fn material_attribute(&self, element: usize) -> usize {
        self.mesh.cell(element).attribute
    }

    pub fn dof(&self, node: usize, component: usize) -> usize {
        debug_assert!(component < self.number_of_components());
        node * self.number_of_components() + component
    }

    /// Writes the global degrees of freedom of an element, node by node.
    pub fn populate_element_dofs(&self, element: usize, dofs: &mut Vec<usize>) {
        let ncomp = self.number_of_components();
        dofs.clear();
        for &node in &self.mesh.cell(element).nodes {
            dofs.extend((0..ncomp).map(|c| node * ncomp + c));
        }
    }

    pub fn element_dofs(&self, element: usize) -> Vec<usize> {
        let mut dofs = Vec::new();
        self.populate_element_dofs(element, &mut dofs);
        dofs
    }

    /// Restricts a global vector to the degrees of freedom of an element.
    pub fn restrict(&self, element: usize, u: &DVector<f64>, ue: &mut DVector<f64>) {
        let ncomp = self.number_of_components();
        let nodes = &self.mesh.cell(element).nodes;
        if ue.len() != nodes.len() * ncomp {
            *ue = DVector::zeros(nodes.len() * ncomp);
        }
        for (i, &node) in nodes.iter().enumerate() {
            for c in 0..ncomp {
                ue[i * ncomp + c] = u[node * ncomp + c];
            }
        }
    }

    /// Nodal coordinates of an element, one column per node.
    pub fn element_coordinates(&self, element: usize) -> DMatrix<f64> {
        let cell = self.mesh.cell(element);
        let vertices = self.mesh.vertices();
        DMatrix::from_fn(self.mesh.dimension(), cell.nodes.len(), |i, j| vertices[cell.nodes[j]][i])
    }

    /// The degrees of freedom of the given component on a boundary of the mesh.
    pub fn boundary_dofs(&self, boundary: usize, component: usize) -> eyre::Result<Vec<usize>> {
        if component >= self.number_of_components() {
            return Err(eyre!(
                "component {} does not exist, the discretization has {} components",
                component,
                self.number_of_components()
            ));
        }
        let nodes = self
            .mesh
            .boundary_nodes(boundary)
            .ok_or_else(|| eyre!("boundary {} does not exist", boundary))?;
        Ok(nodes
            .iter()
            .map(|&node| self.dof(node, component))
            .collect())
    }
}

/// Integration weight factor at a point: `2 π r` for axisymmetry, `1` otherwise.
pub fn hypothesis_measure(hypothesis: Hypothesis, position: &DVector<f64>) -> f64 {
    match hypothesis {
        Hypothesis::Axisymmetrical => 2.0 * PI * position[0],
        _ => 1.0,
    }
}

/// The matrix `B` such that the symmetric small strain tensor is `ε = B u_e`.
///
/// The strain uses the ordering `(xx, yy, zz, xy, xz, yz)` with shear components scaled by
/// `√2`. For axisymmetry, `x` is the radius, `y` the axis and `zz` the hoop strain `u_r / r`.
#[allow(non_snake_case)]
pub fn strain_displacement_matrix(
    hypothesis: Hypothesis,
    values: &DVector<f64>,
    gradients: &DMatrix<f64>,
    position: &DVector<f64>,
) -> DMatrix<f64> {
    let n = values.len();
    let d = hypothesis.space_dimension();
    assert_eq!(gradients.nrows(), d);
    assert_eq!(gradients.ncols(), n);
    let mut B = DMatrix::zeros(hypothesis.stensor_size(), d * n);
    let shear = 1.0 / SQRT_2;
    for a in 0..n {
        let (dx, dy) = (gradients[(0, a)], gradients[(1, a)]);
        let (ux, uy) = (d * a, d * a + 1);
        B[(0, ux)] = dx;
        B[(1, uy)] = dy;
        B[(3, ux)] = shear * dy;
        B[(3, uy)] = shear * dx;
        match hypothesis {
            Hypothesis::PlaneStrain => {}
            Hypothesis::Axisymmetrical => {
                B[(2, ux)] = values[a] / position[0];
            }
            Hypothesis::Tridimensional => {
                let dz = gradients[(2, a)];
                let uz = d * a + 2;
                B[(2, uz)] = dz;
                B[(4, ux)] = shear * dz;
                B[(4, uz)] = shear * dx;
                B[(5, uy)] = shear * dz;
                B[(5, uz)] = shear * dy;
            }
        }
    }
    B
}
