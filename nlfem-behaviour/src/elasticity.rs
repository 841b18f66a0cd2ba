use crate::stensor::{deviatoric_projector, identity_outer_identity};
use crate::{Behaviour, BehaviourData, Hypothesis, IntegrationFailure};
use nalgebra::{DMatrix, DVectorView};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LameParameters {
    pub mu: f64,
    pub lambda: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YoungPoisson {
    pub young: f64,
    pub poisson: f64,
}

impl From<YoungPoisson> for LameParameters {
    fn from(params: YoungPoisson) -> Self {
        let YoungPoisson { young, poisson } = params;
        let mu = 0.5 * young / (1.0 + poisson);
        let lambda = 2.0 * mu * poisson / (1.0 - 2.0 * poisson);
        Self { mu, lambda }
    }
}

impl LameParameters {
    pub fn bulk_modulus(&self) -> f64 {
        self.lambda + 2.0 * self.mu / 3.0
    }

    /// The isotropic elastic operator $\lambda \vec I \otimes \vec I + 2 \mu \mathbb I$.
    pub fn elastic_operator(&self, size: usize) -> DMatrix<f64> {
        let &LameParameters { mu, lambda } = self;
        identity_outer_identity(size) * lambda + DMatrix::identity(size, size) * (2.0 * mu)
    }

    /// Same operator, split as $3 K \mathbb J + 2 \mu \mathbb K$.
    pub fn elastic_operator_from_projectors(&self, size: usize) -> DMatrix<f64> {
        let k = self.bulk_modulus();
        identity_outer_identity(size) * k + deviatoric_projector(size) * (2.0 * self.mu)
    }
}

/// Isotropic linear elasticity under the small strain assumption.
///
/// The stress at the end of the step is
/// $$
/// \vec \sigma = \lambda \operatorname{tr}(\vec \epsilon) \vec I + 2 \mu \vec \epsilon,
/// $$
/// which depends neither on the state at the beginning of the step nor on the time increment.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Elasticity {
    hypothesis: Hypothesis,
    lame: LameParameters,
}

impl Elasticity {
    pub fn new(hypothesis: Hypothesis, lame: impl Into<LameParameters>) -> Self {
        Self {
            hypothesis,
            lame: lame.into(),
        }
    }

    pub fn lame_parameters(&self) -> &LameParameters {
        &self.lame
    }
}

impl Behaviour for Elasticity {
    fn name(&self) -> &str {
        "Elasticity"
    }

    fn hypothesis(&self) -> Hypothesis {
        self.hypothesis
    }

    fn internal_state_variables_size(&self) -> usize {
        0
    }

    fn integrate(&self, data: &mut BehaviourData<'_>) -> Result<(), IntegrationFailure> {
        let n = self.hypothesis.stensor_size();
        let d = self.lame.elastic_operator(n);
        if !data.integration_type.is_prediction() {
            let eps = DVectorView::from_slice(data.s1.gradients, n);
            let sig = &d * eps;
            data.s1.thermodynamic_forces.copy_from_slice(sig.as_slice());
        }
        if data.integration_type.requires_tangent_operator() {
            data.tangent_operator.copy_from_slice(d.as_slice());
        }
        Ok(())
    }
}
