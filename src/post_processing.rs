//! Post-processings executed at the end of time steps.
use crate::discretization::hypothesis_measure;
use crate::element::evaluate_basis_at;
use crate::parameters::Parameters;
use crate::problem::NonLinearEvolutionProblem;
use eyre::eyre;
use log::info;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

pub trait PostProcessing: Debug + Send {
    /// Executes the post-processing at the end of the time step `[t, t + dt]`.
    ///
    /// On partitioned problems every partition executes its post-processings in the same order.
    fn execute(&mut self, problem: &NonLinearEvolutionProblem, t: f64, dt: f64) -> eyre::Result<()>;
}

/// A post-processing given by a closure.
pub struct ClosurePostProcessing<F> {
    f: F,
}

impl<F> ClosurePostProcessing<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Debug for ClosurePostProcessing<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosurePostProcessing").finish_non_exhaustive()
    }
}

impl<F> PostProcessing for ClosurePostProcessing<F>
where
    F: FnMut(&NonLinearEvolutionProblem, f64, f64) -> eyre::Result<()> + Send,
{
    fn execute(&mut self, problem: &NonLinearEvolutionProblem, t: f64, dt: f64) -> eyre::Result<()> {
        (self.f)(problem, t, dt)
    }
}

/// A value computed by a post-processing at the end of a time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcessingRecord {
    pub time: f64,
    pub values: Vec<f64>,
}

/// Records shared between a post-processing and its caller.
pub type PostProcessingHistory = Arc<Mutex<Vec<PostProcessingRecord>>>;

/// Volume average of the thermodynamic forces of a material at the end of the time step.
#[derive(Debug)]
pub struct MeanThermodynamicForces {
    material_id: usize,
    history: PostProcessingHistory,
}

impl MeanThermodynamicForces {
    pub fn new(material_id: usize) -> Self {
        Self {
            material_id,
            history: PostProcessingHistory::default(),
        }
    }

    pub fn history(&self) -> PostProcessingHistory {
        Arc::clone(&self.history)
    }
}

impl PostProcessing for MeanThermodynamicForces {
    fn execute(&mut self, problem: &NonLinearEvolutionProblem, t: f64, dt: f64) -> eyre::Result<()> {
        let fed = problem.finite_element_discretization();
        let hypothesis = problem.hypothesis();
        let material = problem.material(self.material_id)?;
        let space = material.quadrature_space();
        let n = material.s1.thermodynamic_forces_stride();

        // Integrals of the forces, followed by the volume
        let mut integrals = vec![0.0; n + 1];
        for &element in space.elements() {
            let element_type = fed.element_type(element);
            let rule = space
                .integration_rule(element_type)
                .expect("Quadrature space has a rule for all of its element types");
            let coordinates = fed.element_coordinates(element);
            for (q, ip) in space.integration_points(element).enumerate() {
                let basis = evaluate_basis_at(element_type, &coordinates, rule.point(q))
                    .ok_or_else(|| eyre!("element {} is degenerate or inverted", element))?;
                let w = rule.weight(q) * basis.jacobian_determinant * hypothesis_measure(hypothesis, &basis.position);
                for (integral, force) in integrals.iter_mut().zip(material.s1.thermodynamic_forces_at(ip)) {
                    *integral += w * force;
                }
                integrals[n] += w;
            }
        }
        problem.context().all_reduce_sum(&mut integrals);

        let volume = integrals[n];
        let values: Vec<f64> = if volume > 0.0 {
            integrals[..n].iter().map(|integral| integral / volume).collect()
        } else {
            vec![0.0; n]
        };
        info!(
            "Mean thermodynamic forces of material {} at t = {}: {:?}",
            self.material_id,
            t + dt,
            values
        );
        self.history.lock().push(PostProcessingRecord {
            time: t + dt,
            values,
        });
        Ok(())
    }
}

/// Resultant of the inner forces on the nodes of a boundary, that is the reaction force when all
/// the nodes of the boundary are constrained.
#[derive(Debug)]
pub struct ResultantForceOnBoundary {
    boundary: usize,
    history: PostProcessingHistory,
}

impl ResultantForceOnBoundary {
    pub fn new(problem: &NonLinearEvolutionProblem, boundary: usize) -> eyre::Result<Self> {
        if problem
            .finite_element_discretization()
            .mesh()
            .boundary_nodes(boundary)
            .is_none()
        {
            return Err(eyre!("boundary {} does not exist", boundary));
        }
        Ok(Self {
            boundary,
            history: PostProcessingHistory::default(),
        })
    }

    pub fn history(&self) -> PostProcessingHistory {
        Arc::clone(&self.history)
    }
}

impl PostProcessing for ResultantForceOnBoundary {
    fn execute(&mut self, problem: &NonLinearEvolutionProblem, t: f64, dt: f64) -> eyre::Result<()> {
        let fed = problem.finite_element_discretization();
        let forces = problem.inner_forces();
        // The inner forces are already summed over the partitions
        let values: Vec<f64> = (0..fed.number_of_components())
            .map(|component| {
                let dofs = fed.boundary_dofs(self.boundary, component)?;
                Ok(dofs.iter().map(|&dof| forces[dof]).sum())
            })
            .collect::<eyre::Result<_>>()?;
        info!(
            "Resultant force on boundary {} at t = {}: {:?}",
            self.boundary,
            t + dt,
            values
        );
        self.history.lock().push(PostProcessingRecord {
            time: t + dt,
            values,
        });
        Ok(())
    }
}

type PostProcessingGenerator =
    Box<dyn Fn(&NonLinearEvolutionProblem, &Parameters) -> eyre::Result<Box<dyn PostProcessing>> + Send + Sync>;

/// Process-wide registry of post-processings.
///
/// Built-in post-processings are `MeanThermodynamicForces` (parameter `Material`) and
/// `ResultantForceOnBoundary` (parameter `Boundary`).
pub struct PostProcessingFactory {
    generators: RwLock<FxHashMap<String, PostProcessingGenerator>>,
}

impl PostProcessingFactory {
    pub fn global() -> &'static Self {
        static FACTORY: OnceLock<PostProcessingFactory> = OnceLock::new();
        FACTORY.get_or_init(|| {
            let factory = PostProcessingFactory {
                generators: RwLock::new(FxHashMap::default()),
            };
            factory.register("MeanThermodynamicForces", |problem, parameters| {
                parameters.check_parameters(&["Material"])?;
                let material_id = parameters.get_usize("Material")?;
                problem.material(material_id)?;
                Ok(Box::new(MeanThermodynamicForces::new(material_id)) as Box<dyn PostProcessing>)
            });
            factory.register("ResultantForceOnBoundary", |problem, parameters| {
                parameters.check_parameters(&["Boundary"])?;
                let boundary = parameters.get_usize("Boundary")?;
                Ok(Box::new(ResultantForceOnBoundary::new(problem, boundary)?) as Box<dyn PostProcessing>)
            });
            factory
        })
    }

    pub fn register<F>(&self, name: &str, generator: F)
    where
        F: Fn(&NonLinearEvolutionProblem, &Parameters) -> eyre::Result<Box<dyn PostProcessing>> + Send + Sync + 'static,
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
        problem: &NonLinearEvolutionProblem,
        parameters: &Parameters,
    ) -> eyre::Result<Box<dyn PostProcessing>> {
        let generators = self.generators.read();
        let generator = generators
            .get(name)
            .ok_or_else(|| eyre!("no post-processing named '{}'", name))?;
        generator(problem, parameters)
    }
}
