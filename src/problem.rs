//! The nonlinear evolution problem: equilibrium over one time step, solved by Newton's method.
use crate::behaviour_factory::BehaviourFactory;
use crate::boundary::DirichletBoundaryCondition;
use crate::context::ExecutionContext;
use crate::discretization::FiniteElementDiscretization;
use crate::linear_solver::{LinearSolverFactory, LinearSolverHandler};
use crate::material::Material;
use crate::multi_material::{LinearizedSystem, MultiMaterialNonLinearIntegrator};
use crate::parameters::{Parameter, Parameters};
use crate::post_processing::{ClosurePostProcessing, PostProcessing, PostProcessingFactory};
use eyre::eyre;
use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::CsrMatrix;
use nlfem_behaviour::{Behaviour, Hypothesis, IntegrationType};
use nlfem_optimize::calculus::{DifferentiableVectorFunction, VectorFunction};
use nlfem_optimize::newton::{LineSearchStrategy, NewtonReport, NewtonSettings, NewtonSolver, NewtonState};
use nlfem_sparse::dirichlet::{apply_dirichlet_elimination_csr, apply_dirichlet_elimination_rhs};
use nlfem_sparse::solvers::CholeskySolver;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Names of the parameters accepted by [`NonLinearEvolutionProblem::set_solver_parameters`].
pub const SOLVER_PARAMETERS: [&str; 5] = [
    "RelativeTolerance",
    "AbsoluteTolerance",
    "MaximumNumberOfIterations",
    "DivergenceFactor",
    "LineSearch",
];

/// Reported when a behaviour could not be integrated on some partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BehaviourIntegrationFailed;

impl fmt::Display for BehaviourIntegrationFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "behaviour integration failed")
    }
}

impl Error for BehaviourIntegrationFailed {}

fn parse_line_search(parameter: &Parameter) -> eyre::Result<LineSearchStrategy<f64>> {
    let (name, options) = match parameter {
        Parameter::String(name) => (name.as_str(), Parameters::new()),
        Parameter::Parameters(options) => {
            options.check_parameters(&["Name", "SufficientDecrease", "MinimumStepLength"])?;
            (options.get_string("Name")?, options.clone())
        }
        _ => return Err(eyre!("parameter 'LineSearch' must be a string or a parameter set")),
    };
    match name {
        "None" => Ok(LineSearchStrategy::None),
        "Backtracking" => {
            let real_or = |key: &str, default: f64| -> eyre::Result<f64> {
                if options.contains(key) {
                    options.get_real(key)
                } else {
                    Ok(default)
                }
            };
            Ok(LineSearchStrategy::Backtracking {
                sufficient_decrease: real_or("SufficientDecrease", 1e-4)?,
                min_step_length: real_or("MinimumStepLength", 1e-6)?,
            })
        }
        other => Err(eyre!("unknown line search '{}', expected one of: None, Backtracking", other)),
    }
}

/// Updates `settings` from the solver parameters. Unknown parameters are rejected and `settings`
/// is left untouched on error.
pub fn parse_newton_settings(parameters: &Parameters, settings: &NewtonSettings<f64>) -> eyre::Result<NewtonSettings<f64>> {
    parameters.check_parameters(&SOLVER_PARAMETERS)?;
    let mut settings = *settings;
    if parameters.contains("RelativeTolerance") {
        settings.relative_tolerance = parameters.get_real("RelativeTolerance")?;
    }
    if parameters.contains("AbsoluteTolerance") {
        settings.absolute_tolerance = parameters.get_real("AbsoluteTolerance")?;
    }
    if parameters.contains("MaximumNumberOfIterations") {
        settings.max_iterations = parameters.get_usize("MaximumNumberOfIterations")?;
    }
    if parameters.contains("DivergenceFactor") {
        let factor = parameters.get_real("DivergenceFactor")?;
        if factor <= 1.0 {
            return Err(eyre!("DivergenceFactor must be greater than one, got {}", factor));
        }
        settings.divergence_factor = Some(factor);
    }
    if parameters.contains("LineSearch") {
        settings.line_search = parse_line_search(parameters.get("LineSearch")?)?;
    }
    if settings.relative_tolerance < 0.0 || settings.absolute_tolerance < 0.0 {
        return Err(eyre!("tolerances must be non-negative"));
    }
    Ok(settings)
}

/// Residual and Jacobian of the problem as seen by the Newton solver.
struct Equilibrium<'a> {
    integrator: &'a mut MultiMaterialNonLinearIntegrator,
    system: &'a mut LinearizedSystem,
    eliminated_jacobian: &'a mut CsrMatrix<f64>,
    linear_solver: &'a mut LinearSolverHandler,
    constrained_dofs: &'a [usize],
    inner_forces: &'a mut DVector<f64>,
    u: DVector<f64>,
}

impl VectorFunction<f64> for Equilibrium<'_> {
    fn dimension(&self) -> usize {
        self.system.number_of_dofs()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        self.u.copy_from(x);
        let it = IntegrationType::IntegrationWithConsistentTangentOperator;
        if !self.integrator.integrate(&self.u, it, self.system) {
            return Err(Box::new(BehaviourIntegrationFailed));
        }
        self.inner_forces.copy_from(&self.system.residual);
        f.copy_from(&self.system.residual);
        apply_dirichlet_elimination_rhs(DVectorViewMut::from(&mut *f), self.constrained_dofs);
        Ok(())
    }
}

impl DifferentiableVectorFunction<f64> for Equilibrium<'_> {
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        _x: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
    ) -> Result<(), Box<dyn Error>> {
        // Both matrices share the sparsity pattern of the system
        self.eliminated_jacobian
            .values_mut()
            .copy_from_slice(self.system.jacobian.values());
        apply_dirichlet_elimination_csr(self.eliminated_jacobian, self.constrained_dofs);
        let mut b = rhs.clone_owned();
        apply_dirichlet_elimination_rhs(&mut b, self.constrained_dofs);
        let solver = &mut self.linear_solver.linear_solver;
        solver.set_operator(self.eliminated_jacobian)?;
        solver.solve(sol, &DVectorView::from(&b))?;
        Ok(())
    }
}

/// Evolution of a mechanical structure over time steps.
///
/// The unknowns `u0` and `u1` hold the displacements at the beginning and at the end of the
/// current time step. [`solve`](Self::solve) only modifies `u1` and the end of step state of the
/// materials; the caller then either commits the step with [`update`](Self::update) or discards
/// it with [`revert`](Self::revert).
#[derive(Debug)]
pub struct NonLinearEvolutionProblem {
    fed: Arc<FiniteElementDiscretization>,
    hypothesis: Hypothesis,
    integrator: MultiMaterialNonLinearIntegrator,
    solver: NewtonSolver<f64>,
    linear_solver: LinearSolverHandler,
    boundary_conditions: Vec<Box<dyn DirichletBoundaryCondition>>,
    constrained_dofs: Vec<usize>,
    post_processings: Vec<Box<dyn PostProcessing>>,
    system: LinearizedSystem,
    eliminated_jacobian: CsrMatrix<f64>,
    inner_forces: DVector<f64>,
    u0: DVector<f64>,
    u1: DVector<f64>,
}

impl NonLinearEvolutionProblem {
    /// Creates a problem on the given discretization. `parameters` configure the Newton solver,
    /// see [`set_solver_parameters`](Self::set_solver_parameters).
    pub fn new(
        fed: Arc<FiniteElementDiscretization>,
        hypothesis: Hypothesis,
        context: Arc<dyn ExecutionContext>,
        parameters: &Parameters,
    ) -> eyre::Result<Self> {
        let dim = fed.mesh().dimension();
        if dim != hypothesis.space_dimension() {
            return Err(eyre!(
                "the hypothesis '{}' requires a mesh of dimension {}, got {}",
                hypothesis,
                hypothesis.space_dimension(),
                dim
            ));
        }
        if context.size() != fed.number_of_partitions() || context.rank() != fed.rank() {
            return Err(eyre!(
                "partition {} of {} of the discretization does not match partition {} of {} of the context",
                fed.rank(),
                fed.number_of_partitions(),
                context.rank(),
                context.size()
            ));
        }
        let settings = parse_newton_settings(parameters, &NewtonSettings::default())?;
        let system = LinearizedSystem::new(&fed)?;
        let n = fed.number_of_dofs();
        Ok(Self {
            integrator: MultiMaterialNonLinearIntegrator::new(Arc::clone(&fed), hypothesis, context),
            fed,
            hypothesis,
            solver: NewtonSolver::new(settings),
            linear_solver: LinearSolverHandler::new(Box::new(CholeskySolver::default())),
            boundary_conditions: Vec::new(),
            constrained_dofs: Vec::new(),
            post_processings: Vec::new(),
            eliminated_jacobian: system.jacobian.clone(),
            system,
            inner_forces: DVector::zeros(n),
            u0: DVector::zeros(n),
            u1: DVector::zeros(n),
        })
    }

    pub fn finite_element_discretization(&self) -> &Arc<FiniteElementDiscretization> {
        &self.fed
    }

    pub fn hypothesis(&self) -> Hypothesis {
        self.hypothesis
    }

    pub fn context(&self) -> &Arc<dyn ExecutionContext> {
        self.integrator.context()
    }

    /// Attaches a behaviour to the material region `material_id`, integrated by the behaviour
    /// integrator named `name`.
    pub fn add_behaviour_integrator(
        &mut self,
        name: &str,
        material_id: usize,
        behaviour: Box<dyn Behaviour>,
    ) -> eyre::Result<()> {
        self.integrator
            .add_behaviour_integrator(name, material_id, behaviour)
    }

    /// Same as [`add_behaviour_integrator`](Self::add_behaviour_integrator), with the behaviour
    /// created by the behaviour factory.
    pub fn add_behaviour_integrator_by_name(
        &mut self,
        name: &str,
        material_id: usize,
        behaviour: &str,
        parameters: &Parameters,
    ) -> eyre::Result<()> {
        let behaviour = BehaviourFactory::global().generate(behaviour, self.hypothesis, parameters)?;
        self.add_behaviour_integrator(name, material_id, behaviour)
    }

    pub fn behaviour_integrators(&self) -> &MultiMaterialNonLinearIntegrator {
        &self.integrator
    }

    pub fn material(&self, material_id: usize) -> eyre::Result<&Material> {
        self.integrator
            .material(material_id)
            .ok_or_else(|| eyre!("no behaviour integrator defined for material {}", material_id))
    }

    pub fn material_mut(&mut self, material_id: usize) -> eyre::Result<&mut Material> {
        self.integrator
            .material_mut(material_id)
            .ok_or_else(|| eyre!("no behaviour integrator defined for material {}", material_id))
    }

    pub fn add_boundary_condition(&mut self, boundary_condition: Box<dyn DirichletBoundaryCondition>) {
        self.boundary_conditions.push(boundary_condition);
        self.constrained_dofs = self
            .boundary_conditions
            .iter()
            .flat_map(|bc| bc.degrees_of_freedom().iter().copied())
            .sorted_unstable()
            .dedup()
            .collect();
    }

    /// Sorted constrained degrees of freedom, without duplicates.
    pub fn constrained_dofs(&self) -> &[usize] {
        &self.constrained_dofs
    }

    /// Configures the Newton solver. Accepted parameters are `RelativeTolerance`,
    /// `AbsoluteTolerance`, `MaximumNumberOfIterations`, `DivergenceFactor` and `LineSearch`.
    pub fn set_solver_parameters(&mut self, parameters: &Parameters) -> eyre::Result<()> {
        let settings = parse_newton_settings(parameters, self.solver.settings())?;
        *self.solver.settings_mut() = settings;
        Ok(())
    }

    pub fn newton_settings(&self) -> &NewtonSettings<f64> {
        self.solver.settings()
    }

    pub fn newton_state(&self) -> NewtonState {
        self.solver.state()
    }

    pub fn set_linear_solver(&mut self, name: &str, parameters: &Parameters) -> eyre::Result<()> {
        self.linear_solver = LinearSolverFactory::global().generate(name, &self.fed, parameters)?;
        Ok(())
    }

    pub fn linear_solver(&self) -> &LinearSolverHandler {
        &self.linear_solver
    }

    pub fn add_post_processing(&mut self, post_processing: Box<dyn PostProcessing>) {
        self.post_processings.push(post_processing);
    }

    pub fn add_post_processing_fn<F>(&mut self, f: F)
    where
        F: FnMut(&NonLinearEvolutionProblem, f64, f64) -> eyre::Result<()> + Send + 'static,
    {
        self.add_post_processing(Box::new(ClosurePostProcessing::new(f)));
    }

    pub fn add_post_processing_by_name(&mut self, name: &str, parameters: &Parameters) -> eyre::Result<()> {
        let post_processing = PostProcessingFactory::global().generate(name, self, parameters)?;
        self.add_post_processing(post_processing);
        Ok(())
    }

    /// Executes the post-processings in the order in which they were added, stopping at the
    /// first error.
    pub fn execute_post_processings(&mut self, t: f64, dt: f64) -> eyre::Result<()> {
        let mut post_processings = std::mem::take(&mut self.post_processings);
        let result = post_processings
            .iter_mut()
            .try_for_each(|post_processing| post_processing.execute(self, t, dt));
        self.post_processings = post_processings;
        result
    }

    /// Solves the equilibrium at the end of the time step `[t, t + dt]`.
    ///
    /// Never fails for numerical reasons: non-convergence is reported through the status of the
    /// returned report, and `u1` then holds the last Newton iterate.
    pub fn solve(&mut self, t: f64, dt: f64) -> NewtonReport<f64> {
        let missing = self.integrator.materials_without_integrator();
        if !missing.is_empty() {
            warn!(
                "Partition {}: no behaviour integrator for materials {:?}, their elements are ignored",
                self.context().rank(),
                missing
            );
        }
        self.integrator.set_time_increment(dt);
        for bc in &self.boundary_conditions {
            bc.update_imposed_values(&mut self.u1, t + dt);
        }
        let n = self.u1.len();
        let mut equilibrium = Equilibrium {
            integrator: &mut self.integrator,
            system: &mut self.system,
            eliminated_jacobian: &mut self.eliminated_jacobian,
            linear_solver: &mut self.linear_solver,
            constrained_dofs: &self.constrained_dofs,
            inner_forces: &mut self.inner_forces,
            u: DVector::zeros(n),
        };
        let report = self.solver.solve(&mut equilibrium, &mut self.u1);
        if report.is_converged() {
            info!(
                "Time step [{}, {}] converged in {} iterations (residual norm {:e})",
                t,
                t + dt,
                report.iterations,
                report.residual_norm
            );
        } else {
            warn!("Time step [{}, {}] did not converge: {:?}", t, t + dt, report.status);
        }
        report
    }

    /// Integrates the behaviours for the unknowns `u` and assembles the residual and, if
    /// requested, the Jacobian. Returns `false` if the integration failed on any partition.
    pub fn integrate(&mut self, u: &DVector<f64>, integration_type: IntegrationType) -> bool {
        let success = self
            .integrator
            .integrate(u, integration_type, &mut self.system);
        if success {
            self.inner_forces.copy_from(&self.system.residual);
        }
        success
    }

    /// The last assembled system, before elimination of the constrained degrees of freedom.
    pub fn linearized_system(&self) -> &LinearizedSystem {
        &self.system
    }

    /// Inner forces assembled at the last successful integration.
    pub fn inner_forces(&self) -> &DVector<f64> {
        &self.inner_forces
    }

    /// Commits the time step: `u0 <- u1` and `s0 <- s1` for every material.
    pub fn update(&mut self) {
        debug!("Committing time step");
        self.u0.copy_from(&self.u1);
        self.integrator.update();
    }

    /// Discards the time step: `u1 <- u0` and `s1 <- s0` for every material.
    pub fn revert(&mut self) {
        debug!("Reverting time step");
        self.u1.copy_from(&self.u0);
        self.integrator.revert();
    }

    /// Unknowns at the beginning of the time step.
    pub fn unknowns_at_beginning_of_time_step(&self) -> &DVector<f64> {
        &self.u0
    }

    /// Unknowns at the end of the time step.
    pub fn unknowns_at_end_of_time_step(&self) -> &DVector<f64> {
        &self.u1
    }

    pub fn unknowns_at_end_of_time_step_mut(&mut self) -> &mut DVector<f64> {
        &mut self.u1
    }
}
