//! Linear Lagrange elements.
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementType {
    Tri3,
    Quad4,
    Tet4,
    Hex8,
}

impl Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// Reference vertices of the quadrilateral and hexahedron, in the usual counter-clockwise order
#[rustfmt::skip]
const QUAD4_VERTICES: [[f64; 2]; 4] = [
    [-1.0, -1.0],
    [ 1.0, -1.0],
    [ 1.0,  1.0],
    [-1.0,  1.0],
];

#[rustfmt::skip]
const HEX8_VERTICES: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [ 1.0, -1.0, -1.0],
    [ 1.0,  1.0, -1.0],
    [-1.0,  1.0, -1.0],
    [-1.0, -1.0,  1.0],
    [ 1.0, -1.0,  1.0],
    [ 1.0,  1.0,  1.0],
    [-1.0,  1.0,  1.0],
];

impl ElementType {
    pub fn reference_dimension(&self) -> usize {
        match self {
            Self::Tri3 | Self::Quad4 => 2,
            Self::Tet4 | Self::Hex8 => 3,
        }
    }

    pub fn number_of_nodes(&self) -> usize {
        match self {
            Self::Tri3 => 3,
            Self::Quad4 => 4,
            Self::Tet4 => 4,
            Self::Hex8 => 8,
        }
    }

    /// Shape function values at the reference point `xi`.
    pub fn evaluate_basis(&self, xi: &[f64]) -> DVector<f64> {
        assert_eq!(xi.len(), self.reference_dimension());
        match self {
            Self::Tri3 => DVector::from_column_slice(&[1.0 - xi[0] - xi[1], xi[0], xi[1]]),
            Self::Tet4 => DVector::from_column_slice(&[1.0 - xi[0] - xi[1] - xi[2], xi[0], xi[1], xi[2]]),
            // N_{alpha, beta}([alpha, beta]) = 1 with alpha, beta = 1 or -1
            Self::Quad4 => DVector::from_iterator(
                4,
                QUAD4_VERTICES
                    .iter()
                    .map(|[a, b]| (1.0 + a * xi[0]) * (1.0 + b * xi[1]) / 4.0),
            ),
            Self::Hex8 => DVector::from_iterator(
                8,
                HEX8_VERTICES
                    .iter()
                    .map(|[a, b, c]| (1.0 + a * xi[0]) * (1.0 + b * xi[1]) * (1.0 + c * xi[2]) / 8.0),
            ),
        }
    }

    /// Reference gradients at `xi`, one column per node.
    #[rustfmt::skip]
    pub fn gradients(&self, xi: &[f64]) -> DMatrix<f64> {
        assert_eq!(xi.len(), self.reference_dimension());
        match self {
            Self::Tri3 => DMatrix::from_row_slice(2, 3, &[-1.0, 1.0, 0.0,
                                                          -1.0, 0.0, 1.0]),
            Self::Tet4 => DMatrix::from_row_slice(3, 4, &[-1.0, 1.0, 0.0, 0.0,
                                                          -1.0, 0.0, 1.0, 0.0,
                                                          -1.0, 0.0, 0.0, 1.0]),
            Self::Quad4 => DMatrix::from_fn(2, 4, |i, j| {
                let [a, b] = QUAD4_VERTICES[j];
                match i {
                    0 => a * (1.0 + b * xi[1]) / 4.0,
                    _ => b * (1.0 + a * xi[0]) / 4.0,
                }
            }),
            Self::Hex8 => DMatrix::from_fn(3, 8, |i, j| {
                let [a, b, c] = HEX8_VERTICES[j];
                let (fa, fb, fc) = (1.0 + a * xi[0], 1.0 + b * xi[1], 1.0 + c * xi[2]);
                match i {
                    0 => a * fb * fc / 8.0,
                    1 => b * fa * fc / 8.0,
                    _ => c * fa * fb / 8.0,
                }
            }),
        }
    }
}

/// Values of the basis of an element at one point of its physical domain.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisEvaluation {
    /// Shape function values.
    pub values: DVector<f64>,
    /// Physical gradients, one column per node.
    pub gradients: DMatrix<f64>,
    /// Determinant of the Jacobian of the reference-to-physical map.
    pub jacobian_determinant: f64,
    /// Physical coordinates of the point.
    pub position: DVector<f64>,
}

/// Evaluates the basis of an element with the given nodal coordinates (one column per node) at
/// the reference point `xi`.
///
/// Returns `None` if the element is degenerate or inverted at `xi`.
#[allow(non_snake_case)]
pub fn evaluate_basis_at(element_type: ElementType, X: &DMatrix<f64>, xi: &[f64]) -> Option<BasisEvaluation> {
    assert_eq!(X.ncols(), element_type.number_of_nodes());
    assert_eq!(X.nrows(), element_type.reference_dimension());
    let values = element_type.evaluate_basis(xi);
    let G = element_type.gradients(xi);
    // J = dx/dxi
    let J = X * G.transpose();
    let jacobian_determinant = J.determinant();
    if !(jacobian_determinant > 0.0) {
        return None;
    }
    let J_inv_t = J.try_inverse()?.transpose();
    Some(BasisEvaluation {
        gradients: J_inv_t * G,
        position: X * &values,
        values,
        jacobian_determinant,
    })
}
