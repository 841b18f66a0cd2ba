//! Constitutive laws ("behaviours") for `nlfem`.
//!
//! A behaviour maps the state of an integration point at the beginning of a time step and the
//! gradients at the end of the step to the thermodynamic forces at the end of the step, and
//! optionally a tangent operator. Mechanical behaviours use symmetric tensors stored with the
//! off-diagonal components scaled by $\sqrt 2$, so that the Euclidean product of two stored
//! tensors equals their double contraction.
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display};

pub mod elasticity;
pub mod hypothesis;
pub mod plasticity;
pub mod state;
pub mod stensor;

pub use hypothesis::Hypothesis;
pub use state::{MaterialStateManager, PointState, PointStateMut};

pub extern crate nalgebra;

/// What an integration must compute.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntegrationType {
    /// Only compute the elastic operator, the state is left untouched.
    PredictionWithElasticOperator,
    IntegrationWithoutTangentOperator,
    IntegrationWithElasticOperator,
    IntegrationWithConsistentTangentOperator,
}

impl IntegrationType {
    pub fn is_prediction(&self) -> bool {
        matches!(self, Self::PredictionWithElasticOperator)
    }

    pub fn requires_tangent_operator(&self) -> bool {
        !matches!(self, Self::IntegrationWithoutTangentOperator)
    }
}

/// Error reported by a behaviour that could not integrate a point.
///
/// This is a recoverable condition: the caller decides whether the Newton iteration or the whole
/// time step is abandoned.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationFailure {
    pub behaviour: String,
    pub reason: String,
}

impl IntegrationFailure {
    pub fn new(behaviour: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            behaviour: behaviour.into(),
            reason: reason.into(),
        }
    }
}

impl Display for IntegrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "integration of behaviour '{}' failed: {}", self.behaviour, self.reason)
    }
}

impl Error for IntegrationFailure {}

/// Data exchanged with a behaviour for the integration of one point.
#[derive(Debug)]
pub struct BehaviourData<'a> {
    pub time_increment: f64,
    pub integration_type: IntegrationType,
    /// State at the beginning of the time step.
    pub s0: PointState<'a>,
    /// State at the end of the time step. Gradients are inputs, everything else is output.
    pub s1: PointStateMut<'a>,
    /// Tangent operator, stored column by column.
    pub tangent_operator: &'a mut [f64],
}

pub trait Behaviour: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn hypothesis(&self) -> Hypothesis;

    fn gradients_size(&self) -> usize {
        self.hypothesis().stensor_size()
    }

    fn thermodynamic_forces_size(&self) -> usize {
        self.hypothesis().stensor_size()
    }

    fn internal_state_variables_size(&self) -> usize;

    /// Integrates the behaviour over the time step.
    ///
    /// Must be a pure function of `data.s0`, `data.s1.gradients` and the time increment.
    fn integrate(&self, data: &mut BehaviourData<'_>) -> Result<(), IntegrationFailure>;
}

impl<B: Behaviour + ?Sized> Behaviour for Box<B> {
    fn name(&self) -> &str {
        B::name(self)
    }

    fn hypothesis(&self) -> Hypothesis {
        B::hypothesis(self)
    }

    fn gradients_size(&self) -> usize {
        B::gradients_size(self)
    }

    fn thermodynamic_forces_size(&self) -> usize {
        B::thermodynamic_forces_size(self)
    }

    fn internal_state_variables_size(&self) -> usize {
        B::internal_state_variables_size(self)
    }

    fn integrate(&self, data: &mut BehaviourData<'_>) -> Result<(), IntegrationFailure> {
        B::integrate(self, data)
    }
}
