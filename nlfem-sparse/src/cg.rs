//! Preconditioned conjugate gradient iterations for symmetric positive definite systems.
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::CsrMatrix;
use std::error::Error;
use std::fmt;

/// A linear map `y = A x` on vectors of `f64`.
pub trait LinearOperator {
    fn apply(&self, y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>>;
}

impl<A: ?Sized + LinearOperator> LinearOperator for &A {
    fn apply(&self, y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        (**self).apply(y, x)
    }
}

impl LinearOperator for CsrMatrix<f64> {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        if y.len() != self.nrows() || x.len() != self.ncols() {
            return Err(format!(
                "cannot apply {}x{} matrix to vector of length {} with output of length {}",
                self.nrows(),
                self.ncols(),
                x.len(),
                y.len()
            )
            .into());
        }
        for (y_i, row) in y.iter_mut().zip(self.row_iter()) {
            *y_i = row
                .col_indices()
                .iter()
                .zip(row.values())
                .map(|(&j, a_ij)| a_ij * x[j])
                .sum();
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct IdentityOperator;

impl LinearOperator for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        Ok(())
    }
}

/// Scaling by the inverse of the diagonal of a matrix.
///
/// Rows with a missing or zero diagonal entry are left unscaled, which is what happens to the
/// rows of eliminated Dirichlet dofs when their diagonal is stored explicitly as zero.
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner {
    inverse_diagonal: DVector<f64>,
}

impl JacobiPreconditioner {
    pub fn from_csr(matrix: &CsrMatrix<f64>) -> Self {
        let diagonal = matrix.row_iter().enumerate().map(|(i, row)| {
            match row.get_entry(i).map(|entry| entry.into_value()) {
                Some(a_ii) if a_ii != 0.0 => a_ii.recip(),
                _ => 1.0,
            }
        });
        Self {
            inverse_diagonal: DVector::from_iterator(matrix.nrows(), diagonal),
        }
    }
}

impl LinearOperator for JacobiPreconditioner {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        for ((y_i, x_i), d_i) in y.iter_mut().zip(x.iter()).zip(self.inverse_diagonal.iter()) {
            *y_i = d_i * x_i;
        }
        Ok(())
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum CgErrorKind {
    OperatorFailed(Box<dyn Error>),
    PreconditionerFailed(Box<dyn Error>),
    /// `p^T A p <= 0` for some search direction `p`.
    IndefiniteOperator,
    /// `z^T r <= 0` for some preconditioned residual `z`.
    IndefinitePreconditioner,
    MaxIterationsReached { max_iterations: usize },
}

impl fmt::Display for CgErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorFailed(err) => write!(f, "applying the operator failed: {}", err),
            Self::PreconditionerFailed(err) => write!(f, "applying the preconditioner failed: {}", err),
            Self::IndefiniteOperator => write!(f, "the operator is not positive definite"),
            Self::IndefinitePreconditioner => write!(f, "the preconditioner is not positive definite"),
            Self::MaxIterationsReached { max_iterations } => {
                write!(f, "no convergence within {} iterations", max_iterations)
            }
        }
    }
}

#[derive(Debug)]
pub struct CgError {
    /// Number of updates made to the solution before the failure.
    pub iterations: usize,
    pub kind: CgErrorKind,
}

impl fmt::Display for CgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conjugate gradient failed after {} iterations: {}", self.iterations, self.kind)
    }
}

impl Error for CgError {}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CgOutput {
    pub iterations: usize,
    /// Norm of the recursively updated residual at exit.
    pub residual_norm: f64,
}

/// Conjugate gradient iterations stopping when `|r| <= relative_tolerance * |b|`.
///
/// The residual used in the stopping test is the one updated by the recurrence, not `b - A x`.
/// The work vectors are kept between solves.
#[derive(Debug, Clone)]
pub struct ConjugateGradient {
    relative_tolerance: f64,
    max_iterations: Option<usize>,
    r: DVector<f64>,
    z: DVector<f64>,
    p: DVector<f64>,
    q: DVector<f64>,
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-8,
            max_iterations: None,
            r: DVector::zeros(0),
            z: DVector::zeros(0),
            p: DVector::zeros(0),
            q: DVector::zeros(0),
        }
    }
}

impl ConjugateGradient {
    pub fn with_relative_tolerance(self, relative_tolerance: f64) -> Self {
        Self {
            relative_tolerance,
            ..self
        }
    }

    pub fn with_max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations: Some(max_iterations),
            ..self
        }
    }

    /// Solves `A x = b` starting from the current content of `x`.
    ///
    /// A zero right-hand side yields `x = 0` without any iteration.
    pub fn solve(
        &mut self,
        operator: &dyn LinearOperator,
        preconditioner: &dyn LinearOperator,
        b: DVectorView<f64>,
        mut x: DVectorViewMut<f64>,
    ) -> Result<CgOutput, CgError> {
        assert_eq!(b.len(), x.len(), "right-hand side and solution must have the same length");
        let n = b.len();
        let fail = |iterations, kind| CgError { iterations, kind };

        let b_norm = b.norm();
        if b_norm == 0.0 {
            x.fill(0.0);
            return Ok(CgOutput {
                iterations: 0,
                residual_norm: 0.0,
            });
        }

        let Self {
            relative_tolerance,
            max_iterations,
            r,
            z,
            p,
            q,
        } = self;
        for v in [&mut *r, &mut *z, &mut *p, &mut *q] {
            v.resize_vertically_mut(n, 0.0);
        }

        operator
            .apply((&mut *r).into(), (&x).into())
            .map_err(|err| fail(0, CgErrorKind::OperatorFailed(err)))?;
        r.neg_mut();
        *r += &b;
        preconditioner
            .apply((&mut *z).into(), (&*r).into())
            .map_err(|err| fail(0, CgErrorKind::PreconditionerFailed(err)))?;
        p.copy_from(&*z);
        let mut rz = r.dot(&*z);

        let mut iterations = 0;
        loop {
            let residual_norm = r.norm();
            if residual_norm <= *relative_tolerance * b_norm {
                return Ok(CgOutput {
                    iterations,
                    residual_norm,
                });
            }
            if let Some(max_iterations) = *max_iterations {
                if iterations >= max_iterations {
                    return Err(fail(iterations, CgErrorKind::MaxIterationsReached { max_iterations }));
                }
            }
            if rz <= 0.0 {
                return Err(fail(iterations, CgErrorKind::IndefinitePreconditioner));
            }

            operator
                .apply((&mut *q).into(), (&*p).into())
                .map_err(|err| fail(iterations, CgErrorKind::OperatorFailed(err)))?;
            let pq = p.dot(&*q);
            if pq <= 0.0 {
                return Err(fail(iterations, CgErrorKind::IndefiniteOperator));
            }

            let alpha = rz / pq;
            x.axpy(alpha, &*p, 1.0);
            r.axpy(-alpha, &*q, 1.0);
            iterations += 1;

            preconditioner
                .apply((&mut *z).into(), (&*r).into())
                .map_err(|err| fail(iterations, CgErrorKind::PreconditionerFailed(err)))?;
            let rz_next = r.dot(&*z);
            // p = z + beta p
            p.axpy(1.0, &*z, rz_next / rz);
            rz = rz_next;
        }
    }
}
