//! Operations on symmetric tensors stored as vectors.
//!
//! The first three components are always the normal components `xx, yy, zz`, the remaining ones
//! are shear components scaled by $\sqrt 2$.
use nalgebra::{DMatrix, DVector, DVectorView};

/// The second order identity tensor.
pub fn identity(size: usize) -> DVector<f64> {
    DVector::from_fn(size, |i, _| if i < 3 { 1.0 } else { 0.0 })
}

pub fn trace(s: &DVectorView<f64>) -> f64 {
    s[0] + s[1] + s[2]
}

/// Deviatoric part $\vec s - \frac{1}{3} \operatorname{tr}(\vec s) \vec I$.
pub fn deviator(s: &DVectorView<f64>) -> DVector<f64> {
    let tr = trace(s);
    let mut d = s.clone_owned();
    for i in 0..3 {
        d[i] -= tr / 3.0;
    }
    d
}

/// The von Mises equivalent $\sqrt{\frac{3}{2} \vec s : \vec s}$ of the deviator `s`.
pub fn von_mises_equivalent(deviator: &DVector<f64>) -> f64 {
    (1.5 * deviator.norm_squared()).sqrt()
}

/// The fourth order tensor $\vec I \otimes \vec I$.
pub fn identity_outer_identity(size: usize) -> DMatrix<f64> {
    let id = identity(size);
    &id * id.transpose()
}

/// The projector onto deviatoric tensors $\mathbb I - \frac{1}{3} \vec I \otimes \vec I$.
pub fn deviatoric_projector(size: usize) -> DMatrix<f64> {
    DMatrix::identity(size, size) - identity_outer_identity(size) / 3.0
}
