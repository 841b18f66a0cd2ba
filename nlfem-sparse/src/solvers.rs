//! Linear solvers for sparse systems `A x = b`.
//!
//! A solver is first given the operator with [`LinearSolver::set_operator`], which is where
//! direct solvers compute their factorization, and may then solve any number of systems.
use crate::cg::{CgError, ConjugateGradient, IdentityOperator, JacobiPreconditioner, LinearOperator};
use log::debug;
use nalgebra::{DMatrix, DVectorView, DVectorViewMut, Dyn, LU};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};
use std::error::Error;
use std::fmt;

#[derive(Debug)]
#[non_exhaustive]
pub enum LinearSolveError {
    /// `solve` was called before an operator was set.
    MissingOperator,
    /// The operator is not square or does not match the size of the right-hand side.
    DimensionMismatch { expected: usize, actual: usize },
    /// A direct solver could not factorize the operator.
    FactorizationFailed(String),
    /// The conjugate gradient iterations did not converge.
    IterativeSolveFailed(CgError),
}

impl fmt::Display for LinearSolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOperator => write!(f, "No operator was given to the linear solver"),
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            Self::FactorizationFailed(reason) => write!(f, "Factorization failed: {}", reason),
            Self::IterativeSolveFailed(err) => err.fmt(f),
        }
    }
}

impl Error for LinearSolveError {}

pub trait LinearSolver: fmt::Debug + Send {
    fn name(&self) -> &str;

    /// Sets the operator of subsequent solves.
    fn set_operator(&mut self, matrix: &CsrMatrix<f64>) -> Result<(), LinearSolveError>;

    /// Solves `A x = b` for the current operator `A`.
    fn solve(&mut self, x: &mut DVectorViewMut<f64>, b: &DVectorView<f64>) -> Result<(), LinearSolveError>;
}

fn check_square(matrix: &CsrMatrix<f64>) -> Result<(), LinearSolveError> {
    if matrix.nrows() != matrix.ncols() {
        return Err(LinearSolveError::DimensionMismatch {
            expected: matrix.nrows(),
            actual: matrix.ncols(),
        });
    }
    Ok(())
}

fn check_rhs(n: usize, x: &DVectorViewMut<f64>, b: &DVectorView<f64>) -> Result<(), LinearSolveError> {
    for actual in [x.len(), b.len()] {
        if actual != n {
            return Err(LinearSolveError::DimensionMismatch { expected: n, actual });
        }
    }
    Ok(())
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PreconditionerKind {
    Identity,
    Jacobi,
}

#[derive(Debug, Clone)]
enum Preconditioner {
    Identity,
    Jacobi(JacobiPreconditioner),
}

impl LinearOperator for Preconditioner {
    fn apply(&self, y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        match self {
            Self::Identity => IdentityOperator.apply(y, x),
            Self::Jacobi(jacobi) => jacobi.apply(y, x),
        }
    }
}

/// Preconditioned conjugate gradient for symmetric positive definite operators.
#[derive(Debug, Clone)]
pub struct ConjugateGradientSolver {
    relative_tolerance: f64,
    max_iterations: Option<usize>,
    preconditioner_kind: PreconditionerKind,
    operator: Option<(CsrMatrix<f64>, Preconditioner)>,
}

impl Default for ConjugateGradientSolver {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-10,
            max_iterations: None,
            preconditioner_kind: PreconditionerKind::Jacobi,
            operator: None,
        }
    }
}

impl ConjugateGradientSolver {
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

    pub fn with_preconditioner(self, preconditioner_kind: PreconditionerKind) -> Self {
        Self {
            preconditioner_kind,
            ..self
        }
    }

    pub fn preconditioner(&self) -> PreconditionerKind {
        self.preconditioner_kind
    }
}

impl LinearSolver for ConjugateGradientSolver {
    fn name(&self) -> &str {
        "CGSolver"
    }

    fn set_operator(&mut self, matrix: &CsrMatrix<f64>) -> Result<(), LinearSolveError> {
        check_square(matrix)?;
        let preconditioner = match self.preconditioner_kind {
            PreconditionerKind::Identity => Preconditioner::Identity,
            PreconditionerKind::Jacobi => Preconditioner::Jacobi(JacobiPreconditioner::from_csr(matrix)),
        };
        self.operator = Some((matrix.clone(), preconditioner));
        Ok(())
    }

    fn solve(&mut self, x: &mut DVectorViewMut<f64>, b: &DVectorView<f64>) -> Result<(), LinearSolveError> {
        let (matrix, preconditioner) = self
            .operator
            .as_ref()
            .ok_or(LinearSolveError::MissingOperator)?;
        check_rhs(matrix.nrows(), x, b)?;

        x.fill(0.0);
        let mut cg = ConjugateGradient::default().with_relative_tolerance(self.relative_tolerance);
        if let Some(max_iterations) = self.max_iterations {
            cg = cg.with_max_iterations(max_iterations);
        }
        let n = x.len();
        let output = cg
            .solve(matrix, preconditioner, *b, x.rows_mut(0, n))
            .map_err(LinearSolveError::IterativeSolveFailed)?;
        debug!(
            "CG converged in {} iterations, |r| = {:e}",
            output.iterations, output.residual_norm
        );
        Ok(())
    }
}

/// Sparse Cholesky factorization for symmetric positive definite operators.
#[derive(Default)]
pub struct CholeskySolver {
    factorization: Option<CscCholesky<f64>>,
}

impl fmt::Debug for CholeskySolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CholeskySolver")
            .field("factorized", &self.factorization.is_some())
            .finish()
    }
}

impl LinearSolver for CholeskySolver {
    fn name(&self) -> &str {
        "CholeskySolver"
    }

    fn set_operator(&mut self, matrix: &CsrMatrix<f64>) -> Result<(), LinearSolveError> {
        check_square(matrix)?;
        self.factorization = None;
        let csc = CscMatrix::from(matrix);
        let factorization =
            CscCholesky::factor(&csc).map_err(|err| LinearSolveError::FactorizationFailed(format!("{:?}", err)))?;
        self.factorization = Some(factorization);
        Ok(())
    }

    fn solve(&mut self, x: &mut DVectorViewMut<f64>, b: &DVectorView<f64>) -> Result<(), LinearSolveError> {
        let factorization = self
            .factorization
            .as_ref()
            .ok_or(LinearSolveError::MissingOperator)?;
        check_rhs(factorization.l().nrows(), x, b)?;
        let rhs = DMatrix::from_iterator(b.len(), 1, b.iter().copied());
        let solution = factorization.solve(&rhs);
        x.copy_from(&solution.column(0));
        Ok(())
    }
}

/// Dense LU factorization with partial pivoting. Only suitable for small systems.
#[derive(Debug, Default, Clone)]
pub struct LuSolver {
    lu: Option<LU<f64, Dyn, Dyn>>,
}

impl LinearSolver for LuSolver {
    fn name(&self) -> &str {
        "LUSolver"
    }

    fn set_operator(&mut self, matrix: &CsrMatrix<f64>) -> Result<(), LinearSolveError> {
        check_square(matrix)?;
        self.lu = None;
        let lu = DMatrix::from(matrix).lu();
        if !lu.is_invertible() {
            return Err(LinearSolveError::FactorizationFailed("matrix is singular".to_string()));
        }
        self.lu = Some(lu);
        Ok(())
    }

    fn solve(&mut self, x: &mut DVectorViewMut<f64>, b: &DVectorView<f64>) -> Result<(), LinearSolveError> {
        let lu = self.lu.as_ref().ok_or(LinearSolveError::MissingOperator)?;
        check_rhs(lu.u().nrows(), x, b)?;
        x.copy_from(b);
        if !lu.solve_mut(x) {
            return Err(LinearSolveError::FactorizationFailed("matrix is singular".to_string()));
        }
        Ok(())
    }
}
