use crate::quadrature_space::PartialQuadratureSpace;
use nlfem_behaviour::{Behaviour, BehaviourData, Hypothesis, IntegrationFailure, IntegrationType, MaterialStateManager};
use std::sync::Arc;

/// A behaviour together with its state on the integration points of a material region.
///
/// `s0` holds the state at the beginning of the time step, `s1` the state at the end of the
/// step. Only integration mutates `s1` and the tangent operators.
#[derive(Debug)]
pub struct Material {
    quadrature_space: Arc<PartialQuadratureSpace>,
    behaviour: Box<dyn Behaviour>,
    pub s0: MaterialStateManager,
    pub s1: MaterialStateManager,
    /// Tangent operators of all integration points, each stored column by column.
    pub tangent_operators: Vec<f64>,
}

impl Material {
    pub fn new(quadrature_space: Arc<PartialQuadratureSpace>, behaviour: Box<dyn Behaviour>) -> Self {
        let ng = quadrature_space.number_of_integration_points();
        let s0 = MaterialStateManager::new(
            ng,
            behaviour.gradients_size(),
            behaviour.thermodynamic_forces_size(),
            behaviour.internal_state_variables_size(),
        );
        let tangent_size = behaviour.thermodynamic_forces_size() * behaviour.gradients_size();
        Self {
            quadrature_space,
            behaviour,
            s1: s0.clone(),
            s0,
            tangent_operators: vec![0.0; ng * tangent_size],
        }
    }

    pub fn id(&self) -> usize {
        self.quadrature_space.id()
    }

    pub fn quadrature_space(&self) -> &Arc<PartialQuadratureSpace> {
        &self.quadrature_space
    }

    pub fn behaviour(&self) -> &dyn Behaviour {
        self.behaviour.as_ref()
    }

    pub fn hypothesis(&self) -> Hypothesis {
        self.behaviour.hypothesis()
    }

    pub fn number_of_integration_points(&self) -> usize {
        self.quadrature_space.number_of_integration_points()
    }

    pub fn tangent_operator_size(&self) -> usize {
        self.behaviour.thermodynamic_forces_size() * self.behaviour.gradients_size()
    }

    pub fn tangent_operator_at(&self, ip: usize) -> &[f64] {
        let s = self.tangent_operator_size();
        &self.tangent_operators[ip * s..(ip + 1) * s]
    }

    /// Integrates the behaviour on the point `ip`, whose gradients at the end of the step must
    /// already be stored in `s1`.
    pub fn integrate_point(
        &mut self,
        ip: usize,
        time_increment: f64,
        integration_type: IntegrationType,
    ) -> Result<(), IntegrationFailure> {
        let ts = self.tangent_operator_size();
        let mut data = BehaviourData {
            time_increment,
            integration_type,
            s0: self.s0.point(ip),
            s1: self.s1.point_mut(ip),
            tangent_operator: &mut self.tangent_operators[ip * ts..(ip + 1) * ts],
        };
        self.behaviour.integrate(&mut data)
    }

    /// Commits the end of step state: `s0 <- s1`.
    pub fn update(&mut self) {
        self.s0.copy_from(&self.s1);
    }

    /// Discards the end of step state: `s1 <- s0`.
    pub fn revert(&mut self) {
        self.s1.copy_from(&self.s0);
    }
}
