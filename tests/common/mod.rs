//! Helpers shared by the unit and integration test harnesses.
use nlfem::behaviour::{Behaviour, BehaviourData, Hypothesis, IntegrationFailure};

/// Behaviour whose integration always fails.
#[derive(Debug, Copy, Clone)]
pub struct FailingBehaviour(pub Hypothesis);

impl Behaviour for FailingBehaviour {
    fn name(&self) -> &str {
        "Failing"
    }

    fn hypothesis(&self) -> Hypothesis {
        self.0
    }

    fn internal_state_variables_size(&self) -> usize {
        0
    }

    fn integrate(&self, _data: &mut BehaviourData<'_>) -> Result<(), IntegrationFailure> {
        Err(IntegrationFailure::new("Failing", "always fails"))
    }
}
