//! Integration of behaviours over the elements of a material region.
use crate::discretization::{hypothesis_measure, strain_displacement_matrix, FiniteElementDiscretization};
use crate::element::evaluate_basis_at;
use crate::material::Material;
use crate::quadrature_space::PartialQuadratureSpace;
use eyre::eyre;
use nalgebra::{DMatrix, DVector, DVectorView};
use nlfem_behaviour::{Hypothesis, IntegrationFailure, IntegrationType};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

/// State and operations shared by all behaviour integrators: a material and the time increment.
#[derive(Debug)]
pub struct BehaviourIntegratorBase {
    material: Material,
    time_increment: f64,
}

impl BehaviourIntegratorBase {
    pub fn new(material: Material) -> Self {
        Self {
            material,
            time_increment: 0.0,
        }
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn material_mut(&mut self) -> &mut Material {
        &mut self.material
    }

    pub fn set_time_increment(&mut self, dt: f64) {
        self.time_increment = dt;
    }

    pub fn time_increment(&self) -> f64 {
        self.time_increment
    }

    /// Fails if the behaviour was not written for the hypothesis `h`.
    pub fn check_hypotheses(&self, h: Hypothesis) -> eyre::Result<()> {
        let bh = self.material.hypothesis();
        if bh != h {
            return Err(eyre!(
                "behaviour '{}' is defined for the hypothesis '{}', but the hypothesis '{}' is required",
                self.material.behaviour().name(),
                bh,
                h
            ));
        }
        Ok(())
    }

    /// Integrates the behaviour on the single point `ip`, requesting the consistent tangent
    /// operator.
    pub fn integrate(&mut self, ip: usize) -> Result<(), IntegrationFailure> {
        self.integrate_with(ip, IntegrationType::IntegrationWithConsistentTangentOperator)
    }

    pub fn integrate_with(&mut self, ip: usize, integration_type: IntegrationType) -> Result<(), IntegrationFailure> {
        self.material
            .integrate_point(ip, self.time_increment, integration_type)
    }
}

/// Integrates a behaviour on the elements of its material region.
pub trait BehaviourIntegrator: Debug + Send {
    fn name(&self) -> &str;

    fn base(&self) -> &BehaviourIntegratorBase;

    fn base_mut(&mut self) -> &mut BehaviourIntegratorBase;

    fn material(&self) -> &Material {
        self.base().material()
    }

    fn material_mut(&mut self) -> &mut Material {
        self.base_mut().material_mut()
    }

    fn set_time_increment(&mut self, dt: f64) {
        self.base_mut().set_time_increment(dt)
    }

    fn check_hypotheses(&self, h: Hypothesis) -> eyre::Result<()> {
        self.base().check_hypotheses(h)
    }

    /// Integrates the behaviour on every point of `element`, given the element-local unknowns
    /// `ue` at the end of the time step.
    fn integrate(
        &mut self,
        element: usize,
        ue: &DVector<f64>,
        integration_type: IntegrationType,
    ) -> Result<(), IntegrationFailure>;

    /// Element inner forces from the thermodynamic forces at the end of the step.
    fn compute_inner_forces(&self, element: usize, fe: &mut DVector<f64>) -> Result<(), IntegrationFailure>;

    /// Element stiffness from the last computed tangent operators.
    fn compute_stiffness_matrix(&self, element: usize, ke: &mut DMatrix<f64>) -> Result<(), IntegrationFailure>;

    /// Commits the end of step state of the material.
    fn update(&mut self) {
        self.material_mut().update()
    }

    /// Discards the end of step state of the material.
    fn revert(&mut self) {
        self.material_mut().revert()
    }
}

#[derive(Debug, Clone)]
struct PointKinematics {
    b: DMatrix<f64>,
    /// Quadrature weight times the Jacobian determinant and the hypothesis measure.
    weight: f64,
}

#[derive(Debug, Clone)]
struct ElementKinematics {
    element: usize,
    points: Vec<PointKinematics>,
}

/// Small strain mechanics: the gradient is the linearized strain `ε = B u_e` and the
/// thermodynamic force is the Cauchy stress.
///
/// The kinematics of the last integrated element are kept for the computation of its inner
/// forces and stiffness.
#[derive(Debug)]
pub struct SmallStrainMechanicalBehaviourIntegrator {
    base: BehaviourIntegratorBase,
    fed: Arc<FiniteElementDiscretization>,
    hypothesis: Hypothesis,
    last_kinematics: Option<ElementKinematics>,
}

impl SmallStrainMechanicalBehaviourIntegrator {
    pub fn new(fed: Arc<FiniteElementDiscretization>, hypothesis: Hypothesis, material: Material) -> eyre::Result<Self> {
        let base = BehaviourIntegratorBase::new(material);
        base.check_hypotheses(hypothesis)?;
        let n = hypothesis.stensor_size();
        let behaviour = base.material().behaviour();
        if behaviour.gradients_size() != n || behaviour.thermodynamic_forces_size() != n {
            return Err(eyre!(
                "behaviour '{}' is not a small strain mechanical behaviour",
                behaviour.name()
            ));
        }
        Ok(Self {
            base,
            fed,
            hypothesis,
            last_kinematics: None,
        })
    }

    fn quadrature_space(&self) -> &PartialQuadratureSpace {
        self.base.material().quadrature_space()
    }

    fn kinematics(&self, element: usize) -> Result<Vec<PointKinematics>, IntegrationFailure> {
        let element_type = self.fed.element_type(element);
        let rule = self
            .quadrature_space()
            .integration_rule(element_type)
            .expect("Quadrature space has a rule for all of its element types");
        let coordinates = self.fed.element_coordinates(element);
        (0..rule.number_of_points())
            .map(|q| {
                let basis = evaluate_basis_at(element_type, &coordinates, rule.point(q)).ok_or_else(|| {
                    IntegrationFailure::new(
                        self.base.material().behaviour().name(),
                        format!("element {} is degenerate or inverted", element),
                    )
                })?;
                let b = strain_displacement_matrix(self.hypothesis, &basis.values, &basis.gradients, &basis.position);
                let weight = rule.weight(q) * basis.jacobian_determinant * hypothesis_measure(self.hypothesis, &basis.position);
                Ok(PointKinematics { b, weight })
            })
            .collect()
    }

    fn element_kinematics(&self, element: usize) -> Result<Cow<'_, [PointKinematics]>, IntegrationFailure> {
        match &self.last_kinematics {
            Some(cached) if cached.element == element => Ok(Cow::Borrowed(cached.points.as_slice())),
            _ => self.kinematics(element).map(Cow::Owned),
        }
    }
}

impl BehaviourIntegrator for SmallStrainMechanicalBehaviourIntegrator {
    fn name(&self) -> &str {
        "Mechanics"
    }

    fn base(&self) -> &BehaviourIntegratorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BehaviourIntegratorBase {
        &mut self.base
    }

    fn integrate(
        &mut self,
        element: usize,
        ue: &DVector<f64>,
        integration_type: IntegrationType,
    ) -> Result<(), IntegrationFailure> {
        let kinematics = match self.last_kinematics.take() {
            Some(cached) if cached.element == element => cached,
            _ => ElementKinematics {
                element,
                points: self.kinematics(element)?,
            },
        };
        let points = self.quadrature_space().integration_points(element);
        for (ip, point) in points.zip(&kinematics.points) {
            let strain = &point.b * ue;
            self.base
                .material_mut()
                .s1
                .gradients_at_mut(ip)
                .copy_from_slice(strain.as_slice());
            self.base.integrate_with(ip, integration_type)?;
        }
        self.last_kinematics = Some(kinematics);
        Ok(())
    }

    fn compute_inner_forces(&self, element: usize, fe: &mut DVector<f64>) -> Result<(), IntegrationFailure> {
        let points = self.quadrature_space().integration_points(element);
        let kinematics = self.element_kinematics(element)?;
        let ndofs = self.fed.number_of_components() * self.fed.element_type(element).number_of_nodes();
        *fe = DVector::zeros(ndofs);
        let s1 = &self.base.material().s1;
        for (ip, point) in points.zip(kinematics.iter()) {
            let n = s1.thermodynamic_forces_stride();
            let stress = DVectorView::from_slice(s1.thermodynamic_forces_at(ip), n);
            fe.gemv_tr(point.weight, &point.b, &stress, 1.0);
        }
        Ok(())
    }

    fn compute_stiffness_matrix(&self, element: usize, ke: &mut DMatrix<f64>) -> Result<(), IntegrationFailure> {
        let points = self.quadrature_space().integration_points(element);
        let kinematics = self.element_kinematics(element)?;
        let ndofs = self.fed.number_of_components() * self.fed.element_type(element).number_of_nodes();
        *ke = DMatrix::zeros(ndofs, ndofs);
        let material = self.base.material();
        let n = self.hypothesis.stensor_size();
        for (ip, point) in points.zip(kinematics.iter()) {
            let k = DMatrix::from_column_slice(n, n, material.tangent_operator_at(ip));
            let kb = k * &point.b;
            ke.gemm_tr(point.weight, &point.b, &kb, 1.0);
        }
        Ok(())
    }
}

type BehaviourIntegratorGenerator = Box<
    dyn Fn(Arc<FiniteElementDiscretization>, Hypothesis, Material) -> eyre::Result<Box<dyn BehaviourIntegrator>>
        + Send
        + Sync,
>;

/// Process-wide registry of behaviour integrators, keyed by name.
pub struct BehaviourIntegratorFactory {
    generators: RwLock<FxHashMap<String, BehaviourIntegratorGenerator>>,
}

impl BehaviourIntegratorFactory {
    pub fn global() -> &'static Self {
        static FACTORY: OnceLock<BehaviourIntegratorFactory> = OnceLock::new();
        FACTORY.get_or_init(|| {
            let factory = BehaviourIntegratorFactory {
                generators: RwLock::new(FxHashMap::default()),
            };
            factory.register("Mechanics", |fed, hypothesis, material| {
                let integrator = SmallStrainMechanicalBehaviourIntegrator::new(fed, hypothesis, material)?;
                Ok(Box::new(integrator) as Box<dyn BehaviourIntegrator>)
            });
            factory
        })
    }

    /// Registers a generator, replacing any generator previously registered under `name`.
    pub fn register<F>(&self, name: &str, generator: F)
    where
        F: Fn(Arc<FiniteElementDiscretization>, Hypothesis, Material) -> eyre::Result<Box<dyn BehaviourIntegrator>>
            + Send
            + Sync
            + 'static,
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
        fed: Arc<FiniteElementDiscretization>,
        hypothesis: Hypothesis,
        material: Material,
    ) -> eyre::Result<Box<dyn BehaviourIntegrator>> {
        let generators = self.generators.read();
        let generator = generators
            .get(name)
            .ok_or_else(|| eyre!("no behaviour integrator named '{}'", name))?;
        generator(fed, hypothesis, material)
    }
}
