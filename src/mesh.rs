use crate::element::ElementType;
use eyre::eyre;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub mod procedural;

/// A cell of a mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub element_type: ElementType,
    /// Global indices of the vertices of the cell.
    pub nodes: Vec<usize>,
    /// Material identifier of the cell.
    pub attribute: usize,
}

impl Cell {
    pub fn new(element_type: ElementType, nodes: Vec<usize>, attribute: usize) -> Self {
        Self {
            element_type,
            nodes,
            attribute,
        }
    }
}

/// An unstructured mesh of linear cells with named boundary node sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    dim: usize,
    vertices: Vec<DVector<f64>>,
    cells: Vec<Cell>,
    boundaries: BTreeMap<usize, Vec<usize>>,
}

impl Mesh {
    pub fn from_vertices_and_cells(dim: usize, vertices: Vec<DVector<f64>>, cells: Vec<Cell>) -> eyre::Result<Self> {
        if dim != 2 && dim != 3 {
            return Err(eyre!("unsupported mesh dimension {}", dim));
        }
        if let Some(v) = vertices.iter().position(|v| v.len() != dim) {
            return Err(eyre!("vertex {} does not have {} coordinates", v, dim));
        }
        for (i, cell) in cells.iter().enumerate() {
            if cell.element_type.reference_dimension() != dim {
                return Err(eyre!("cell {} of type {} cannot be part of a {}D mesh", i, cell.element_type, dim));
            }
            if cell.nodes.len() != cell.element_type.number_of_nodes() {
                return Err(eyre!(
                    "cell {} of type {} has {} nodes",
                    i,
                    cell.element_type,
                    cell.nodes.len()
                ));
            }
            if let Some(&node) = cell.nodes.iter().find(|&&node| node >= vertices.len()) {
                return Err(eyre!("cell {} refers to vertex {} which does not exist", i, node));
            }
        }
        Ok(Self {
            dim,
            vertices,
            cells,
            boundaries: BTreeMap::new(),
        })
    }

    /// Registers the set of vertices forming the boundary `id`.
    ///
    /// Nodes are stored sorted and without duplicates, adding to any set registered before.
    pub fn add_boundary(&mut self, id: usize, nodes: impl IntoIterator<Item = usize>) -> eyre::Result<()> {
        let nodes: Vec<usize> = nodes.into_iter().collect();
        if let Some(&node) = nodes.iter().find(|&&node| node >= self.vertices.len()) {
            return Err(eyre!("boundary {} refers to vertex {} which does not exist", id, node));
        }
        let entry = self.boundaries.entry(id).or_default();
        let set: BTreeSet<usize> = entry.iter().copied().chain(nodes).collect();
        *entry = set.into_iter().collect();
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn vertices(&self) -> &[DVector<f64>] {
        &self.vertices
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    pub fn number_of_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn number_of_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn set_attribute(&mut self, cell: usize, attribute: usize) {
        self.cells[cell].attribute = attribute;
    }

    pub fn boundary_nodes(&self, id: usize) -> Option<&[usize]> {
        self.boundaries.get(&id).map(Vec::as_slice)
    }

    pub fn boundary_identifiers(&self) -> impl Iterator<Item = usize> + '_ {
        self.boundaries.keys().copied()
    }

    /// The distinct material identifiers of the cells, in increasing order.
    pub fn material_identifiers(&self) -> BTreeSet<usize> {
        self.cells.iter().map(|cell| cell.attribute).collect()
    }
}
