use nalgebra::{DVector, DVectorView, DVectorViewMut, Matrix3, Vector3};
use nlfem_optimize::calculus::{ClosureFunction, DifferentiableVectorFunction, VectorFunction};
use nlfem_optimize::newton::*;
use numeric_literals::replace_numeric_literals;
use std::error::Error;

struct MockLinearVectorFunction;

impl VectorFunction<f64> for MockLinearVectorFunction {
    fn dimension(&self) -> usize {
        3
    }

    #[replace_numeric_literals(f64::from(literal))]
    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        let a = Matrix3::new(5, 1, 2, 1, 4, 2, 2, 2, 4);
        let b = Vector3::new(1, 2, 3);
        let r = a * x - b;
        f.copy_from(&r);
        Ok(())
    }
}

impl DifferentiableVectorFunction<f64> for MockLinearVectorFunction {
    #[replace_numeric_literals(f64::from(literal))]
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        _x: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
    ) -> Result<(), Box<dyn Error>> {
        let a = Matrix3::new(5, 1, 2, 1, 4, 2, 2, 2, 4);
        let a_inv = a.try_inverse().unwrap();
        sol.copy_from(&(a_inv * rhs));
        Ok(())
    }
}

fn linear_settings() -> NewtonSettings<f64> {
    NewtonSettings {
        max_iterations: 2,
        absolute_tolerance: Vector3::new(1.0, 2.0, 3.0).norm() * 1e-6,
        relative_tolerance: 1e-12,
        divergence_factor: None,
        line_search: LineSearchStrategy::None,
    }
}

#[test]
fn newton_converges_in_single_iteration_for_linear_system() {
    let expected_solution = Vector3::new(-0.125, 0.16666667, 0.72916667);

    let mut solver = NewtonSolver::new(linear_settings());
    assert_eq!(solver.state(), NewtonState::Idle);

    let mut x = DVector::<f64>::zeros(3);
    let report = solver.solve(MockLinearVectorFunction, &mut x);

    assert_eq!(report.status, NewtonStatus::Converged);
    assert_eq!(report.iterations, 1);
    assert!(report.error.is_none());
    assert_eq!(solver.state(), NewtonState::Converged);
    assert!((report.initial_residual_norm - Vector3::<f64>::new(1.0, 2.0, 3.0).norm()).abs() < 1e-12);
    let diff = x - expected_solution;
    assert!(diff.norm() < 1e-6);
}

#[test]
fn newton_with_backtracking_takes_full_step_for_linear_system() {
    let mut settings = linear_settings();
    settings.line_search = LineSearchStrategy::Backtracking {
        sufficient_decrease: 1e-4,
        min_step_length: 1e-6,
    };
    let mut x = DVector::<f64>::zeros(3);
    let report = NewtonSolver::new(settings).solve(MockLinearVectorFunction, &mut x);
    assert_eq!(report.status, NewtonStatus::Converged);
    assert_eq!(report.iterations, 1);
}

#[test]
fn newton_converges_without_iterations_at_solution() {
    let mut x = DVector::from_column_slice(&[-0.125, 1.0 / 6.0, 0.7291666666666666]);
    let mut solver = NewtonSolver::new(linear_settings());
    let report = solver.solve(MockLinearVectorFunction, &mut x);
    assert_eq!(report.status, NewtonStatus::Converged);
    assert_eq!(report.iterations, 0);
}

#[test]
fn newton_converges_for_scalar_nonlinear_equation() {
    // x^2 - 2 = 0
    let function = ClosureFunction::new(
        1,
        |f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            f[0] = x[0] * x[0] - 2.0;
            Ok(())
        },
    )
    .with_jacobian_solver(
        |sol: &mut DVectorViewMut<f64>, x: &DVectorView<f64>, rhs: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            sol[0] = rhs[0] / (2.0 * x[0]);
            Ok(())
        },
    );

    let settings = NewtonSettings {
        max_iterations: 20,
        ..NewtonSettings::default()
    };
    let mut x = DVector::from_column_slice(&[1.0]);
    let report = NewtonSolver::new(settings).solve(function, &mut x);
    assert_eq!(report.status, NewtonStatus::Converged);
    assert!(report.iterations > 1);
    assert!((x[0] - 2.0f64.sqrt()).abs() < 1e-10);
}

#[test]
fn newton_diverges_when_iteration_budget_is_exhausted() {
    // Only a quarter of the Newton step is applied, so the solution is never reached
    let function = ClosureFunction::new(
        1,
        |f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            f[0] = x[0] - 1.0;
            Ok(())
        },
    )
    .with_jacobian_solver(
        |sol: &mut DVectorViewMut<f64>, _x: &DVectorView<f64>, rhs: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            sol[0] = 0.25 * rhs[0];
            Ok(())
        },
    );

    let settings = NewtonSettings {
        max_iterations: 3,
        ..NewtonSettings::default()
    };
    let mut solver = NewtonSolver::new(settings);
    let mut x = DVector::<f64>::zeros(1);
    let report = solver.solve(function, &mut x);
    assert_eq!(report.status, NewtonStatus::Diverged);
    assert_eq!(report.iterations, 3);
    assert!(matches!(report.error, Some(NewtonError::MaximumIterationsReached(3))));
    assert_eq!(solver.state(), NewtonState::Diverged);
}

#[test]
fn newton_diverges_when_residual_grows() {
    // The Jacobian solver returns a step in the wrong direction
    let function = ClosureFunction::new(
        1,
        |f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            f[0] = x[0] - 1.0;
            Ok(())
        },
    )
    .with_jacobian_solver(
        |sol: &mut DVectorViewMut<f64>, _x: &DVectorView<f64>, rhs: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            sol[0] = -rhs[0];
            Ok(())
        },
    );

    let settings = NewtonSettings {
        divergence_factor: Some(1.5),
        ..NewtonSettings::default()
    };
    let mut x = DVector::<f64>::zeros(1);
    let report = NewtonSolver::new(settings).solve(function, &mut x);
    assert_eq!(report.status, NewtonStatus::Diverged);
    assert_eq!(report.iterations, 1);
    assert!(matches!(report.error, Some(NewtonError::ResidualGrowth { iteration: 1 })));
}

#[test]
fn newton_diverges_when_jacobian_system_cannot_be_solved() {
    let function = ClosureFunction::new(
        1,
        |f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            f[0] = x[0] - 1.0;
            Ok(())
        },
    )
    .with_jacobian_solver(
        |_sol: &mut DVectorViewMut<f64>, _x: &DVectorView<f64>, _rhs: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            Err("singular".into())
        },
    );

    let mut x = DVector::<f64>::zeros(1);
    let report = NewtonSolver::new(NewtonSettings::default()).solve(function, &mut x);
    assert_eq!(report.status, NewtonStatus::Diverged);
    assert_eq!(report.iterations, 0);
    assert!(matches!(report.error, Some(NewtonError::JacobianError(_))));
}

#[test]
fn newton_fails_when_residual_cannot_be_evaluated() {
    let function = ClosureFunction::new(
        1,
        |_f: &mut DVectorViewMut<f64>, _x: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            Err("integration failed".into())
        },
    )
    .with_jacobian_solver(
        |sol: &mut DVectorViewMut<f64>, _x: &DVectorView<f64>, rhs: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            sol.copy_from(rhs);
            Ok(())
        },
    );

    let mut solver = NewtonSolver::new(NewtonSettings::default());
    let mut x = DVector::<f64>::zeros(1);
    let report = solver.solve(function, &mut x);
    assert_eq!(report.status, NewtonStatus::Failed);
    assert_eq!(report.iterations, 0);
    assert!(matches!(report.error, Some(NewtonError::ResidualEvaluationError(_))));
    assert_eq!(solver.state(), NewtonState::Failed);
}

#[test]
fn newton_fails_when_evaluation_fails_during_iteration() {
    // Defined only for x < 0.5, while the root lies at x = 1
    let function = ClosureFunction::new(
        1,
        |f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            if x[0] >= 0.5 {
                return Err("outside of domain".into());
            }
            f[0] = x[0] - 1.0;
            Ok(())
        },
    )
    .with_jacobian_solver(
        |sol: &mut DVectorViewMut<f64>, _x: &DVectorView<f64>, rhs: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            sol.copy_from(rhs);
            Ok(())
        },
    );

    let mut x = DVector::<f64>::zeros(1);
    let report = NewtonSolver::new(NewtonSettings::default()).solve(function, &mut x);
    assert_eq!(report.status, NewtonStatus::Failed);
    assert_eq!(report.iterations, 1);
    assert_eq!(report.residual_norm, 1.0);
}

struct PredictingFunction {
    predicted: bool,
}

impl VectorFunction<f64> for PredictingFunction {
    fn dimension(&self) -> usize {
        1
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        f[0] = x[0] - 3.0;
        Ok(())
    }
}

impl DifferentiableVectorFunction<f64> for PredictingFunction {
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        _x: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
    ) -> Result<(), Box<dyn Error>> {
        sol.copy_from(rhs);
        Ok(())
    }

    fn predict(&mut self, x: &mut DVectorViewMut<f64>) -> Result<bool, Box<dyn Error>> {
        self.predicted = true;
        x[0] = 3.0;
        Ok(true)
    }
}

#[test]
fn exact_prediction_converges_without_iterations() {
    let mut function = PredictingFunction { predicted: false };
    let mut x = DVector::<f64>::zeros(1);
    let report = NewtonSolver::new(NewtonSettings::default()).solve(&mut function, &mut x);
    assert!(function.predicted);
    assert!(report.is_converged());
    assert_eq!(report.iterations, 0);
    assert_eq!(x[0], 3.0);
}
