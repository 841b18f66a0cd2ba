use crate::calculus::{DifferentiableVectorFunction, VectorFunction};
use crate::Real;
use itertools::iterate;
use log::{debug, warn};
use nalgebra::{DVector, DVectorView, DVectorViewMut, Scalar};
use numeric_literals::replace_float_literals;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// States of the Newton solver.
///
/// A solve goes through `Idle -> Predicting -> Iterating` and ends in one of the three final
/// states, which is kept until the next solve starts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NewtonState {
    Idle,
    Predicting,
    Iterating,
    Converged,
    Diverged,
    Failed,
}

/// Outcome of a Newton solve.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NewtonStatus {
    Converged,
    /// The iteration budget was exhausted, the residual grew too much or a step could not be
    /// computed.
    Diverged,
    /// The residual could not be evaluated.
    Failed,
}

impl NewtonStatus {
    fn as_state(&self) -> NewtonState {
        match self {
            Self::Converged => NewtonState::Converged,
            Self::Diverged => NewtonState::Diverged,
            Self::Failed => NewtonState::Failed,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LineSearchStrategy<T> {
    /// Always take the full Newton step.
    None,
    /// Backtracking with the Armijo condition, see [`BacktrackingLineSearch`].
    Backtracking { sufficient_decrease: T, min_step_length: T },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NewtonSettings<T> {
    pub max_iterations: usize,
    pub absolute_tolerance: T,
    pub relative_tolerance: T,
    /// Declare divergence when `|F(u)| > divergence_factor * |F(u_0)|`.
    pub divergence_factor: Option<T>,
    pub line_search: LineSearchStrategy<T>,
}

impl Default for NewtonSettings<f64> {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            absolute_tolerance: 1e-12,
            relative_tolerance: 1e-12,
            divergence_factor: None,
            line_search: LineSearchStrategy::None,
        }
    }
}

#[derive(Debug)]
pub enum NewtonError {
    /// The procedure failed because the maximum number of iterations was reached.
    MaximumIterationsReached(usize),
    /// The residual grew beyond the allowed multiple of the initial residual.
    ResidualGrowth { iteration: usize },
    /// The residual is no longer a finite number.
    NonFiniteResidual { iteration: usize },
    /// The procedure failed because solving the Jacobian system failed.
    JacobianError(Box<dyn Error>),
    /// The line search failed to produce a valid step.
    LineSearchError(Box<dyn Error>),
    /// The prediction of the initial state failed.
    PredictionError(Box<dyn Error>),
    /// The residual could not be evaluated.
    ResidualEvaluationError(Box<dyn Error>),
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            &NewtonError::MaximumIterationsReached(maxit) => {
                write!(f, "Failed to converge within maximum number of iterations ({}).", maxit)
            }
            &NewtonError::ResidualGrowth { iteration } => {
                write!(f, "Residual grew beyond the divergence threshold at iteration {}.", iteration)
            }
            &NewtonError::NonFiniteResidual { iteration } => {
                write!(f, "Residual is not finite at iteration {}.", iteration)
            }
            &NewtonError::JacobianError(ref err) => {
                write!(f, "Failed to solve Jacobian system. Error: {}", err)
            }
            &NewtonError::LineSearchError(ref err) => {
                write!(f, "Line search failed to produce valid step direction. Error: {}", err)
            }
            &NewtonError::PredictionError(ref err) => {
                write!(f, "Prediction of the initial state failed. Error: {}", err)
            }
            &NewtonError::ResidualEvaluationError(ref err) => {
                write!(f, "Failed to evaluate residual. Error: {}", err)
            }
        }
    }
}

impl Error for NewtonError {}

#[derive(Debug)]
pub struct NewtonReport<T> {
    pub status: NewtonStatus,
    /// Number of updates made to the solution.
    pub iterations: usize,
    /// Norm of the residual before the first iteration, zero if it could not be evaluated.
    pub initial_residual_norm: T,
    /// Norm of the last evaluated residual, zero if it could not be evaluated.
    pub residual_norm: T,
    /// Why the solve did not converge.
    pub error: Option<NewtonError>,
}

impl<T> NewtonReport<T> {
    pub fn is_converged(&self) -> bool {
        self.status == NewtonStatus::Converged
    }
}

/// Newton solver for the non-linear equation F(u) = 0.
///
/// The solution is said to have converged if
/// ```|F(u)|_2 <= max(absolute_tolerance, relative_tolerance * |F(u_0)|_2)```.
/// The test is performed before the first iteration and after every iteration.
#[derive(Debug, Clone)]
pub struct NewtonSolver<T: Scalar> {
    settings: NewtonSettings<T>,
    state: NewtonState,
    f: DVector<T>,
    minus_dx: DVector<T>,
}

impl<T: Real> NewtonSolver<T> {
    pub fn new(settings: NewtonSettings<T>) -> Self {
        Self {
            settings,
            state: NewtonState::Idle,
            f: DVector::zeros(0),
            minus_dx: DVector::zeros(0),
        }
    }

    pub fn settings(&self) -> &NewtonSettings<T> {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut NewtonSettings<T> {
        &mut self.settings
    }

    pub fn state(&self) -> NewtonState {
        self.state
    }

    /// The residual at the last evaluated point.
    pub fn residual(&self) -> &DVector<T> {
        &self.f
    }

    fn transition(&mut self, state: NewtonState) {
        debug!("Newton solver: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn finish(
        &mut self,
        status: NewtonStatus,
        iterations: usize,
        initial_residual_norm: T,
        residual_norm: T,
        error: Option<NewtonError>,
    ) -> NewtonReport<T> {
        if let Some(err) = &error {
            warn!("Newton solver stopped after {} iterations: {}", iterations, err);
        }
        self.transition(status.as_state());
        NewtonReport {
            status,
            iterations,
            initial_residual_norm,
            residual_norm,
            error,
        }
    }

    /// Attempts to solve F(x) = 0, starting from the given `x`.
    ///
    /// On return `x` holds the last iterate, whatever the outcome.
    pub fn solve<'a, F>(&mut self, mut function: F, x: impl Into<DVectorViewMut<'a, T>>) -> NewtonReport<T>
    where
        F: DifferentiableVectorFunction<T>,
    {
        let mut x = x.into();
        let n = x.nrows();
        assert_eq!(n, function.dimension());
        if self.f.nrows() != n {
            self.f = DVector::zeros(n);
            self.minus_dx = DVector::zeros(n);
        }
        let zero = T::zero();

        self.transition(NewtonState::Predicting);
        match function.predict(&mut DVectorViewMut::from(&mut x)) {
            Ok(true) => debug!("Newton solver: prediction performed"),
            Ok(false) => debug!("Newton solver: no prediction performed"),
            Err(err) => {
                return self.finish(NewtonStatus::Diverged, 0, zero, zero, Some(NewtonError::PredictionError(err)))
            }
        }

        self.transition(NewtonState::Iterating);
        if let Err(err) = function.eval_into(&mut DVectorViewMut::from(&mut self.f), &DVectorView::from(&x)) {
            return self.finish(
                NewtonStatus::Failed,
                0,
                zero,
                zero,
                Some(NewtonError::ResidualEvaluationError(err)),
            );
        }

        let settings = self.settings;
        let r0 = self.f.norm();
        let threshold = settings
            .absolute_tolerance
            .max(settings.relative_tolerance * r0);
        debug!("Newton iteration 0: residual norm {}", r0);

        let mut r = r0;
        let mut iter = 0;
        loop {
            if r <= threshold {
                return self.finish(NewtonStatus::Converged, iter, r0, r, None);
            }
            if !r.is_finite() {
                let error = NewtonError::NonFiniteResidual { iteration: iter };
                return self.finish(NewtonStatus::Diverged, iter, r0, r, Some(error));
            }
            if iter == settings.max_iterations {
                let error = NewtonError::MaximumIterationsReached(iter);
                return self.finish(NewtonStatus::Diverged, iter, r0, r, Some(error));
            }

            // Solve the system J dx = -f   <=>   J (-dx) = f
            let j_result = function.solve_jacobian_system(
                &mut DVectorViewMut::from(&mut self.minus_dx),
                &DVectorView::from(&x),
                &DVectorView::from(&self.f),
            );
            if let Err(err) = j_result {
                return self.finish(NewtonStatus::Diverged, iter, r0, r, Some(NewtonError::JacobianError(err)));
            }

            // Flip sign to make it consistent with line search
            self.minus_dx.neg_mut();
            let direction = DVectorView::from(&self.minus_dx);
            let f = DVectorViewMut::from(&mut self.f);
            let x_view = DVectorViewMut::from(&mut x);
            let step = match settings.line_search {
                LineSearchStrategy::None => NoLineSearch.step(&mut function, f, x_view, direction),
                LineSearchStrategy::Backtracking {
                    sufficient_decrease,
                    min_step_length,
                } => BacktrackingLineSearch {
                    sufficient_decrease,
                    min_step_length,
                }
                .step(&mut function, f, x_view, direction),
            };
            iter += 1;

            let step_length = match step {
                Ok(step_length) => step_length,
                Err(LineSearchError::Evaluation(err)) => {
                    let error = NewtonError::ResidualEvaluationError(err);
                    return self.finish(NewtonStatus::Failed, iter, r0, r, Some(error));
                }
                Err(err @ LineSearchError::InsufficientDecrease { .. }) => {
                    let error = NewtonError::LineSearchError(Box::new(err));
                    return self.finish(NewtonStatus::Diverged, iter, r0, r, Some(error));
                }
            };

            r = self.f.norm();
            debug!(
                "Newton iteration {}: residual norm {} (step length {})",
                iter, r, step_length
            );

            if let Some(factor) = settings.divergence_factor {
                if r > factor * r0 {
                    let error = NewtonError::ResidualGrowth { iteration: iter };
                    return self.finish(NewtonStatus::Diverged, iter, r0, r, Some(error));
                }
            }
        }
    }
}

#[derive(Debug)]
pub enum LineSearchError<T> {
    /// The function could not be evaluated at a trial point.
    Evaluation(Box<dyn Error>),
    InsufficientDecrease { step_length: T, min_step_length: T },
}

impl<T: Display> Display for LineSearchError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evaluation(err) => write!(f, "Evaluation failed during line search. Error: {}", err),
            Self::InsufficientDecrease {
                step_length,
                min_step_length,
            } => write!(
                f,
                "Failed to produce valid step direction. \
                 Step length {} is smaller than minimum allowed step length {}.",
                step_length, min_step_length
            ),
        }
    }
}

impl<T: fmt::Debug + Display> Error for LineSearchError<T> {}

pub trait LineSearch<T: Scalar, F: VectorFunction<T>> {
    /// Moves `x` along `direction`, leaving `f` evaluated at the new `x`.
    ///
    /// Returns the step length.
    fn step(
        &mut self,
        function: &mut F,
        f: DVectorViewMut<T>,
        x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, LineSearchError<T>>;
}

/// Trivial implementation of line search. Equivalent to a single, full Newton step.
#[derive(Clone, Debug)]
pub struct NoLineSearch;

impl<T, F> LineSearch<T, F> for NoLineSearch
where
    T: Real,
    F: VectorFunction<T>,
{
    fn step(
        &mut self,
        function: &mut F,
        mut f: DVectorViewMut<T>,
        mut x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, LineSearchError<T>> {
        let p = direction;
        x.axpy(T::one(), &p, T::one());
        function
            .eval_into(&mut f, &DVectorView::from(&x))
            .map_err(LineSearchError::Evaluation)?;
        Ok(T::one())
    }
}

/// Standard backtracking line search using the Armijo condition.
///
/// See Jorge & Nocedal (2006), Numerical Optimization, Chapter 3.1.
#[derive(Clone, Debug)]
pub struct BacktrackingLineSearch<T> {
    pub sufficient_decrease: T,
    pub min_step_length: T,
}

impl Default for BacktrackingLineSearch<f64> {
    fn default() -> Self {
        Self {
            sufficient_decrease: 1e-4,
            min_step_length: 1e-6,
        }
    }
}

impl<T, F> LineSearch<T, F> for BacktrackingLineSearch<T>
where
    T: Real,
    F: VectorFunction<T>,
{
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn step(
        &mut self,
        function: &mut F,
        mut f: DVectorViewMut<T>,
        mut x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, LineSearchError<T>> {
        // We seek to solve F(x) = 0 by minimizing g(x) = (1/2) || F(x) ||^2.
        // Assuming grad F^T p_k ~= - F(x_k), the sufficient decrease condition becomes
        //  g(x_k + alpha * p_k) <= (1 - c * alpha) * g(x_k)
        let c = self.sufficient_decrease;
        let alpha_min = self.min_step_length;

        let p = direction;
        let g_initial = 0.5 * f.magnitude_squared();

        // Start out with some alphas that don't decrease too quickly, then
        // decrease them much faster if the first few iterations don't let us take a step.
        let initial_alphas = [0.0, 1.0, 0.75, 0.5];
        let mut alpha_iter = initial_alphas
            .iter()
            .copied()
            .chain(iterate(0.25, |alpha_i| 0.25 * *alpha_i));

        let mut alpha_prev = alpha_iter.next().expect("alpha sequence is infinite");
        let mut alpha = alpha_iter.next().expect("alpha sequence is infinite");

        loop {
            // x^{k + 1} = x^k + (alpha^k - alpha^{k - 1}) * p
            let delta_alpha = alpha - alpha_prev;
            x.axpy(delta_alpha, &p, T::one());
            function
                .eval_into(&mut f, &DVectorView::from(&x))
                .map_err(LineSearchError::Evaluation)?;

            let g = 0.5 * f.magnitude_squared();
            if g <= (1.0 - c * alpha) * g_initial {
                break;
            } else if alpha < alpha_min {
                return Err(LineSearchError::InsufficientDecrease {
                    step_length: alpha,
                    min_step_length: alpha_min,
                });
            } else {
                alpha_prev = alpha;
                alpha = alpha_iter.next().expect("alpha sequence is infinite");
            }
        }

        Ok(alpha)
    }
}
