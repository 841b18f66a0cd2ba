//! Name-keyed construction of linear solvers.
use crate::discretization::FiniteElementDiscretization;
use crate::parameters::Parameters;
use eyre::eyre;
use nlfem_sparse::solvers::{CholeskySolver, ConjugateGradientSolver, LinearSolver, LuSolver, PreconditionerKind};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

/// A linear solver together with the preconditioner it was configured with, if any.
#[derive(Debug)]
pub struct LinearSolverHandler {
    pub linear_solver: Box<dyn LinearSolver>,
    pub preconditioner: Option<PreconditionerKind>,
}

impl LinearSolverHandler {
    pub fn new(linear_solver: Box<dyn LinearSolver>) -> Self {
        Self {
            linear_solver,
            preconditioner: None,
        }
    }
}

fn parse_preconditioner(parameters: &Parameters) -> eyre::Result<PreconditionerKind> {
    parameters.check_parameters(&["Name"])?;
    match parameters.get_string("Name")? {
        "Jacobi" => Ok(PreconditionerKind::Jacobi),
        "Identity" => Ok(PreconditionerKind::Identity),
        other => Err(eyre!("unknown preconditioner '{}', expected one of: Jacobi, Identity", other)),
    }
}

type LinearSolverGenerator =
    Box<dyn Fn(&FiniteElementDiscretization, &Parameters) -> eyre::Result<LinearSolverHandler> + Send + Sync>;

/// Process-wide registry of linear solvers.
///
/// Built-in solvers are `CGSolver`, `CholeskySolver` and `LUSolver`.
pub struct LinearSolverFactory {
    generators: RwLock<FxHashMap<String, LinearSolverGenerator>>,
}

impl LinearSolverFactory {
    pub fn global() -> &'static Self {
        static FACTORY: OnceLock<LinearSolverFactory> = OnceLock::new();
        FACTORY.get_or_init(|| {
            let factory = LinearSolverFactory {
                generators: RwLock::new(FxHashMap::default()),
            };
            factory.register("CGSolver", |_, parameters| {
                parameters.check_parameters(&["Preconditioner", "RelativeTolerance", "MaximumNumberOfIterations"])?;
                let mut solver = ConjugateGradientSolver::default();
                if parameters.contains("RelativeTolerance") {
                    solver = solver.with_relative_tolerance(parameters.get_real("RelativeTolerance")?);
                }
                if parameters.contains("MaximumNumberOfIterations") {
                    solver = solver.with_max_iterations(parameters.get_usize("MaximumNumberOfIterations")?);
                }
                if parameters.contains("Preconditioner") {
                    let kind = parse_preconditioner(parameters.get_parameters("Preconditioner")?)?;
                    solver = solver.with_preconditioner(kind);
                }
                let preconditioner = Some(solver.preconditioner());
                Ok(LinearSolverHandler {
                    linear_solver: Box::new(solver),
                    preconditioner,
                })
            });
            factory.register("CholeskySolver", |_, parameters| {
                parameters.check_parameters(&[])?;
                Ok(LinearSolverHandler::new(Box::new(CholeskySolver::default())))
            });
            factory.register("LUSolver", |_, parameters| {
                parameters.check_parameters(&[])?;
                Ok(LinearSolverHandler::new(Box::new(LuSolver::default())))
            });
            factory
        })
    }

    pub fn register<F>(&self, name: &str, generator: F)
    where
        F: Fn(&FiniteElementDiscretization, &Parameters) -> eyre::Result<LinearSolverHandler> + Send + Sync + 'static,
    {
        self.generators
            .write()
            .insert(name.to_string(), Box::new(generator));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.generators.read().contains_key(name)
    }

    pub fn generate(
        &self,
        name: &str,
        fed: &FiniteElementDiscretization,
        parameters: &Parameters,
    ) -> eyre::Result<LinearSolverHandler> {
        let generators = self.generators.read();
        let generator = generators
            .get(name)
            .ok_or_else(|| eyre!("no linear solver named '{}'", name))?;
        generator(fed, parameters)
    }
}
