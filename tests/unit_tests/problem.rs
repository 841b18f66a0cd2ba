use nlfem::behaviour::Hypothesis;
use nlfem::boundary::{DirichletBoundaryCondition, UniformDirichletBoundaryCondition};
use nlfem::context::{ExecutionContext, LocalContext};
use nlfem::discretization::FiniteElementDiscretization;
use nlfem::mesh::procedural::{create_rectangular_uniform_hex_mesh, create_rectangular_uniform_quad_mesh, X_MIN, Y_MIN};
use nlfem::optimize::newton::{LineSearchStrategy, NewtonSettings, NewtonState};
use nlfem::parameters::Parameters;
use nlfem::problem::{parse_newton_settings, NonLinearEvolutionProblem};
use nalgebra::DVector;
use std::sync::Arc;

fn local() -> Arc<dyn ExecutionContext> {
    Arc::new(LocalContext)
}

fn square(n: usize) -> Arc<FiniteElementDiscretization> {
    let mesh = create_rectangular_uniform_quad_mesh(1.0, 1.0, n, n).unwrap();
    Arc::new(FiniteElementDiscretization::new(mesh))
}

#[test]
fn newton_settings_from_parameters() {
    let defaults = NewtonSettings::default();
    let parameters = Parameters::new()
        .with("RelativeTolerance", 1e-8)
        .with("AbsoluteTolerance", 0.0)
        .with("MaximumNumberOfIterations", 25usize)
        .with("DivergenceFactor", 1e3)
        .with("LineSearch", "Backtracking");
    let settings = parse_newton_settings(&parameters, &defaults).unwrap();
    assert_eq!(settings.relative_tolerance, 1e-8);
    assert_eq!(settings.absolute_tolerance, 0.0);
    assert_eq!(settings.max_iterations, 25);
    assert_eq!(settings.divergence_factor, Some(1e3));
    assert_eq!(
        settings.line_search,
        LineSearchStrategy::Backtracking {
            sufficient_decrease: 1e-4,
            min_step_length: 1e-6
        }
    );

    let parameters = Parameters::new().with(
        "LineSearch",
        Parameters::new()
            .with("Name", "Backtracking")
            .with("SufficientDecrease", 0.1),
    );
    let settings = parse_newton_settings(&parameters, &defaults).unwrap();
    assert_eq!(
        settings.line_search,
        LineSearchStrategy::Backtracking {
            sufficient_decrease: 0.1,
            min_step_length: 1e-6
        }
    );
    assert_eq!(settings.max_iterations, defaults.max_iterations);
}

#[test]
fn invalid_newton_settings() {
    let defaults = NewtonSettings::default();
    let invalid = [
        Parameters::new().with("Tolerance", 1e-8),
        Parameters::new().with("MaximumNumberOfIterations", -1i64),
        Parameters::new().with("DivergenceFactor", 0.5),
        Parameters::new().with("LineSearch", "Trust"),
        Parameters::new().with("RelativeTolerance", -1.0),
    ];
    for parameters in &invalid {
        assert!(parse_newton_settings(parameters, &defaults).is_err());
    }
}

#[test]
fn hypothesis_must_match_mesh_dimension() {
    let mesh = create_rectangular_uniform_hex_mesh([1.0; 3], [1, 1, 1]).unwrap();
    let fed = Arc::new(FiniteElementDiscretization::new(mesh));
    assert!(NonLinearEvolutionProblem::new(Arc::clone(&fed), Hypothesis::PlaneStrain, local(), &Parameters::new()).is_err());
    assert!(NonLinearEvolutionProblem::new(fed, Hypothesis::Tridimensional, local(), &Parameters::new()).is_ok());
}

#[test]
fn new_problem_state() {
    let fed = square(2);
    let problem = NonLinearEvolutionProblem::new(fed, Hypothesis::PlaneStrain, local(), &Parameters::new()).unwrap();
    assert_eq!(problem.newton_state(), NewtonState::Idle);
    assert_eq!(problem.linear_solver().linear_solver.name(), "CholeskySolver");
    assert_eq!(problem.unknowns_at_beginning_of_time_step().len(), 18);
    assert_eq!(problem.unknowns_at_end_of_time_step(), &DVector::zeros(18));
    assert!(problem.constrained_dofs().is_empty());
    assert!(problem.material(1).is_err());
}

#[test]
fn constrained_dofs_are_sorted_and_unique() {
    let fed = square(1);
    let mut problem = NonLinearEvolutionProblem::new(Arc::clone(&fed), Hypothesis::PlaneStrain, local(), &Parameters::new())
        .unwrap();
    problem.add_boundary_condition(Box::new(UniformDirichletBoundaryCondition::fixed(&fed, X_MIN, 0).unwrap()));
    problem.add_boundary_condition(Box::new(UniformDirichletBoundaryCondition::fixed(&fed, Y_MIN, 1).unwrap()));
    problem.add_boundary_condition(Box::new(UniformDirichletBoundaryCondition::fixed(&fed, X_MIN, 0).unwrap()));
    // X_MIN holds nodes 0 and 2, Y_MIN nodes 0 and 1
    assert_eq!(problem.constrained_dofs(), &[0, 1, 3, 4]);
}

#[test]
fn uniform_boundary_condition_follows_time() {
    let fed = square(1);
    let bc = UniformDirichletBoundaryCondition::new(&fed, X_MIN, 1, |t| 2.0 * t).unwrap();
    assert_eq!(bc.degrees_of_freedom(), &[1, 5]);
    let mut u = DVector::zeros(fed.number_of_dofs());
    bc.update_imposed_values(&mut u, 0.25);
    assert_eq!(u[1], 0.5);
    assert_eq!(u[5], 0.5);
    assert_eq!(u.iter().filter(|&&v| v != 0.0).count(), 2);

    assert!(UniformDirichletBoundaryCondition::with_value(&fed, 99, 0, 1.0).is_err());
}

#[test]
fn solver_configuration_errors_keep_previous_settings() {
    let fed = square(1);
    let parameters = Parameters::new().with("MaximumNumberOfIterations", 4usize);
    let mut problem = NonLinearEvolutionProblem::new(fed, Hypothesis::PlaneStrain, local(), &parameters).unwrap();
    assert_eq!(problem.newton_settings().max_iterations, 4);

    let invalid = Parameters::new()
        .with("MaximumNumberOfIterations", 8usize)
        .with("LineSearch", "Unknown");
    assert!(problem.set_solver_parameters(&invalid).is_err());
    assert_eq!(problem.newton_settings().max_iterations, 4);

    assert!(problem.set_linear_solver("Unknown", &Parameters::new()).is_err());
    assert_eq!(problem.linear_solver().linear_solver.name(), "CholeskySolver");
    problem
        .set_linear_solver("CGSolver", &Parameters::new())
        .unwrap();
    assert_eq!(problem.linear_solver().linear_solver.name(), "CGSolver");
}

#[test]
fn behaviours_by_name() {
    let fed = square(1);
    let mut problem = NonLinearEvolutionProblem::new(fed, Hypothesis::PlaneStrain, local(), &Parameters::new()).unwrap();
    let parameters = Parameters::new()
        .with("YoungModulus", 1.0)
        .with("PoissonRatio", 0.2);
    problem
        .add_behaviour_integrator_by_name("Mechanics", 1, "Elasticity", &parameters)
        .unwrap();
    assert_eq!(problem.material(1).unwrap().behaviour().name(), "Elasticity");
    assert!(problem
        .add_behaviour_integrator_by_name("Mechanics", 2, "Unknown", &parameters)
        .is_err());
    assert!(problem
        .add_post_processing_by_name("MeanThermodynamicForces", &Parameters::new().with("Material", 2usize))
        .is_err());
    assert!(problem
        .add_post_processing_by_name("MeanThermodynamicForces", &Parameters::new().with("Material", 1usize))
        .is_ok());
    assert!(problem
        .add_post_processing_by_name("ResultantForceOnBoundary", &Parameters::new().with("Boundary", 12usize))
        .is_err());
}

#[test]
fn post_processings_run_in_insertion_order_until_first_error() {
    let fed = square(1);
    let mut problem = NonLinearEvolutionProblem::new(fed, Hypothesis::PlaneStrain, local(), &Parameters::new()).unwrap();
    let calls = Arc::new(parking_lot::Mutex::new(Vec::new()));
    for label in ["first", "second"] {
        let calls = Arc::clone(&calls);
        problem.add_post_processing_fn(move |_, t, dt| {
            calls.lock().push((label, t, dt));
            Ok(())
        });
    }
    problem.execute_post_processings(0.5, 0.25).unwrap();
    assert_eq!(*calls.lock(), vec![("first", 0.5, 0.25), ("second", 0.5, 0.25)]);

    problem.add_post_processing_fn(|_, _, _| Err(eyre::eyre!("output failed")));
    {
        let calls = Arc::clone(&calls);
        problem.add_post_processing_fn(move |_, _, _| {
            calls.lock().push(("after error", 0.0, 0.0));
            Ok(())
        });
    }
    assert!(problem.execute_post_processings(1.0, 0.25).is_err());
    assert_eq!(calls.lock().len(), 4);
    assert!(calls.lock().iter().all(|&(label, _, _)| label != "after error"));
}
