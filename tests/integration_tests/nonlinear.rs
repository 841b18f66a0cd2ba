use super::{add_uniaxial_loading, elastic_parameters, local_problem, unit_square, young_poisson, POISSON, YOUNG};
use crate::CubicElasticity;
use matrixcompare::assert_scalar_eq;
use nlfem::behaviour::Hypothesis;
use nlfem::boundary::UniformDirichletBoundaryCondition;
use nlfem::mesh::procedural::{X_MAX, X_MIN};
use nlfem::optimize::newton::{NewtonError, NewtonState, NewtonStatus};
use nlfem::parameters::Parameters;
use nlfem::post_processing::MeanThermodynamicForces;
use nlfem::problem::NonLinearEvolutionProblem;
use std::sync::Arc;

/// A clamped square stretched by `0.05` on its right side, made of a strongly stiffening material.
fn stiffening_problem(parameters: &Parameters) -> NonLinearEvolutionProblem {
    let fed = unit_square(2);
    let mut problem = local_problem(Arc::clone(&fed));
    problem.set_solver_parameters(parameters).unwrap();
    let behaviour = CubicElasticity::new(Hypothesis::PlaneStrain, young_poisson(), 2e4);
    problem
        .add_behaviour_integrator("Mechanics", 1, Box::new(behaviour))
        .unwrap();
    for c in 0..2 {
        problem.add_boundary_condition(Box::new(UniformDirichletBoundaryCondition::fixed(&fed, X_MIN, c).unwrap()));
    }
    problem.add_boundary_condition(Box::new(
        UniformDirichletBoundaryCondition::new(&fed, X_MAX, 0, |t| 0.05 * t).unwrap(),
    ));
    problem
}

#[test]
fn iteration_budget_exhaustion_is_divergence() {
    let mut problem = stiffening_problem(&Parameters::new().with("MaximumNumberOfIterations", 1usize));
    let report = problem.solve(0.0, 1.0);
    assert_eq!(report.status, NewtonStatus::Diverged);
    assert_eq!(report.iterations, 1);
    assert!(matches!(report.error, Some(NewtonError::MaximumIterationsReached(1))));
    assert_eq!(problem.newton_state(), NewtonState::Diverged);

    // The step can be retried from the beginning with a larger budget
    problem.revert();
    problem
        .set_solver_parameters(
            &Parameters::new()
                .with("MaximumNumberOfIterations", 50usize)
                .with("LineSearch", "Backtracking"),
        )
        .unwrap();
    assert!(problem.solve(0.0, 1.0).is_converged());
}

#[test]
fn stiffening_material_converges_with_line_search() {
    let parameters = Parameters::new()
        .with("MaximumNumberOfIterations", 50usize)
        .with("LineSearch", "Backtracking");
    let mut problem = stiffening_problem(&parameters);
    let report = problem.solve(0.0, 1.0);
    assert_eq!(report.status, NewtonStatus::Converged);
    assert!(report.iterations > 1);
    assert!(report.residual_norm <= 1e-10 * report.initial_residual_norm);
}

#[test]
fn plasticity_under_increasing_load() {
    const YIELD_STRENGTH: f64 = 0.2;
    let fed = unit_square(1);
    let mut problem = local_problem(Arc::clone(&fed));
    let parameters = elastic_parameters()
        .with("YieldStrength", YIELD_STRENGTH)
        .with("HardeningSlope", 20.0);
    problem
        .add_behaviour_integrator_by_name("Mechanics", 1, "Plasticity", &parameters)
        .unwrap();
    add_uniaxial_loading(&mut problem, |t| 1e-3 * t);
    let mean_stress = MeanThermodynamicForces::new(1);
    let history = mean_stress.history();
    problem.add_post_processing(Box::new(mean_stress));

    // Yield is reached between the first and the second step
    let elastic_modulus = YOUNG / (1.0 - POISSON * POISSON);
    let von_mises_factor = (1.0 - POISSON + POISSON * POISSON).sqrt();
    assert!(von_mises_factor * elastic_modulus * 1e-3 < YIELD_STRENGTH);
    assert!(von_mises_factor * elastic_modulus * 2e-3 > YIELD_STRENGTH);
    for step in 0..4 {
        let t = step as f64;
        let report = problem.solve(t, 1.0);
        assert!(report.is_converged(), "step {} did not converge", step);
        problem.execute_post_processings(t, 1.0).unwrap();
        problem.update();
    }

    let history = history.lock();
    assert_eq!(history.len(), 4);
    assert_eq!(history[3].time, 4.0);
    // Elastic first step
    assert_scalar_eq!(history[0].values[0], elastic_modulus * 1e-3, comp = abs, tol = 1e-10);
    let last = &history[3].values;
    assert!(last[0] < elastic_modulus * 4e-3);
    assert!(last[0] > history[2].values[0]);
    assert_scalar_eq!(last[1], 0.0, comp = abs, tol = 1e-8);

    let material = problem.material(1).unwrap();
    for ip in 0..material.number_of_integration_points() {
        let p = material.s1.internal_state_variables_at(ip)[4];
        assert!(p > 0.0);
    }
}
