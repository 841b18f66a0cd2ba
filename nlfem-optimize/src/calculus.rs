use crate::Real;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, Scalar};
use std::error::Error;

/// A vector function whose evaluation may fail.
///
/// A failed evaluation means that the function is not defined at the requested point, for
/// instance because a constitutive law could not be integrated there.
pub trait VectorFunction<T: Scalar> {
    fn dimension(&self) -> usize;

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) -> Result<(), Box<dyn Error>>;
}

/// A vector function able to solve linear systems with its Jacobian.
pub trait DifferentiableVectorFunction<T: Scalar>: VectorFunction<T> {
    /// Solves `J(x) sol = rhs`, where `J` is the Jacobian at the last evaluated point `x`.
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), Box<dyn Error>>;

    /// Computes an initial estimate of the solution in place.
    ///
    /// Returns `false` if no prediction was performed, in which case `x` is untouched.
    fn predict(&mut self, _x: &mut DVectorViewMut<T>) -> Result<bool, Box<dyn Error>> {
        Ok(false)
    }
}

impl<T: Scalar, X: VectorFunction<T>> VectorFunction<T> for &mut X {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) -> Result<(), Box<dyn Error>> {
        (**self).eval_into(f, x)
    }
}

impl<T: Scalar, X: DifferentiableVectorFunction<T>> DifferentiableVectorFunction<T> for &mut X {
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), Box<dyn Error>> {
        (**self).solve_jacobian_system(sol, x, rhs)
    }

    fn predict(&mut self, x: &mut DVectorViewMut<T>) -> Result<bool, Box<dyn Error>> {
        (**self).predict(x)
    }
}

/// A vector function given by closures.
///
/// ```
/// # use nalgebra::{DVector, DVectorView, DVectorViewMut};
/// # use nlfem_optimize::calculus::{ClosureFunction, VectorFunction};
/// # use std::error::Error;
/// let mut square = ClosureFunction::new(
///     1,
///     |f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
///         f[0] = x[0] * x[0];
///         Ok(())
///     },
/// );
/// let mut f = DVector::<f64>::zeros(1);
/// let x = DVector::from_element(1, 3.0);
/// square.eval_into(&mut DVectorViewMut::from(&mut f), &DVectorView::from(&x)).unwrap();
/// assert_eq!(f[0], 9.0);
/// ```
#[derive(Debug, Clone)]
pub struct ClosureFunction<F, J = ()> {
    dimension: usize,
    evaluate: F,
    jacobian_solver: J,
}

impl<F> ClosureFunction<F> {
    pub fn new<T>(dimension: usize, evaluate: F) -> Self
    where
        T: Scalar,
        F: FnMut(&mut DVectorViewMut<T>, &DVectorView<T>) -> Result<(), Box<dyn Error>>,
    {
        Self {
            dimension,
            evaluate,
            jacobian_solver: (),
        }
    }

    /// Attaches a solver for `J(x) sol = rhs`, called as `jacobian_solver(sol, x, rhs)`.
    pub fn with_jacobian_solver<T, J>(self, jacobian_solver: J) -> ClosureFunction<F, J>
    where
        T: Scalar,
        J: FnMut(&mut DVectorViewMut<T>, &DVectorView<T>, &DVectorView<T>) -> Result<(), Box<dyn Error>>,
    {
        ClosureFunction {
            dimension: self.dimension,
            evaluate: self.evaluate,
            jacobian_solver,
        }
    }
}

impl<T, F, J> VectorFunction<T> for ClosureFunction<F, J>
where
    T: Scalar,
    F: FnMut(&mut DVectorViewMut<T>, &DVectorView<T>) -> Result<(), Box<dyn Error>>,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) -> Result<(), Box<dyn Error>> {
        (self.evaluate)(f, x)
    }
}

impl<T, F, J> DifferentiableVectorFunction<T> for ClosureFunction<F, J>
where
    T: Scalar,
    F: FnMut(&mut DVectorViewMut<T>, &DVectorView<T>) -> Result<(), Box<dyn Error>>,
    J: FnMut(&mut DVectorViewMut<T>, &DVectorView<T>, &DVectorView<T>) -> Result<(), Box<dyn Error>>,
{
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), Box<dyn Error>> {
        (self.jacobian_solver)(sol, x, rhs)
    }
}

/// Central finite difference approximation of the Jacobian of `f` at `x` with step `h`.
///
/// Column `j` is `(f(x + h e_j) - f(x - h e_j)) / 2h`. Any failed evaluation is returned as is.
pub fn approximate_jacobian<T: Real>(
    mut f: impl VectorFunction<T>,
    x: &DVector<T>,
    h: &T,
) -> Result<DMatrix<T>, Box<dyn Error>> {
    let h = *h;
    let mut jacobian = DMatrix::zeros(f.dimension(), x.len());
    let mut shifted = x.clone();
    let mut f_plus = DVector::zeros(f.dimension());
    let mut f_minus = DVector::zeros(f.dimension());

    for j in 0..x.len() {
        shifted[j] = x[j] + h;
        f.eval_into(&mut (&mut f_plus).into(), &(&shifted).into())?;
        shifted[j] = x[j] - h;
        f.eval_into(&mut (&mut f_minus).into(), &(&shifted).into())?;
        shifted[j] = x[j];

        for i in 0..f_plus.len() {
            jacobian[(i, j)] = (f_plus[i] - f_minus[i]) / (h + h);
        }
    }

    Ok(jacobian)
}
