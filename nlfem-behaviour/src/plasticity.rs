use crate::elasticity::LameParameters;
use crate::stensor::{deviator, deviatoric_projector, identity_outer_identity, von_mises_equivalent};
use crate::{Behaviour, BehaviourData, Hypothesis, IntegrationFailure};
use log::trace;
use nalgebra::{DMatrix, DVector, DVectorView};
use serde::{Deserialize, Serialize};

/// Von Mises plasticity with linear isotropic hardening, integrated by a radial return.
///
/// The yield function is
/// $$
/// f(\vec \sigma, p) = \sigma_{eq} - (\sigma_y + H p).
/// $$
/// Internal state variables are the elastic strain followed by the equivalent plastic strain $p$.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IsotropicLinearHardeningPlasticity {
    hypothesis: Hypothesis,
    lame: LameParameters,
    yield_strength: f64,
    hardening_slope: f64,
}

impl IsotropicLinearHardeningPlasticity {
    pub fn new(
        hypothesis: Hypothesis,
        lame: impl Into<LameParameters>,
        yield_strength: f64,
        hardening_slope: f64,
    ) -> Self {
        Self {
            hypothesis,
            lame: lame.into(),
            yield_strength,
            hardening_slope,
        }
    }

    pub fn yield_strength(&self) -> f64 {
        self.yield_strength
    }

    pub fn hardening_slope(&self) -> f64 {
        self.hardening_slope
    }

    /// Index of the equivalent plastic strain in the internal state variables.
    pub fn equivalent_plastic_strain_index(&self) -> usize {
        self.hypothesis.stensor_size()
    }

    #[allow(non_snake_case)]
    fn consistent_tangent_operator(&self, stress: &DVector<f64>, dp: f64, seq_trial: f64) -> DMatrix<f64> {
        let n = stress.len();
        let (mu, K, H) = (self.lame.mu, self.lame.bulk_modulus(), self.hardening_slope);
        let s = deviator(&DVectorView::from(stress));
        let s_norm2 = s.norm_squared();
        let a = 2.0 * mu * (1.0 - dp * 3.0 * mu / seq_trial);
        let b = 6.0 * mu * mu * (dp / seq_trial - 1.0 / (3.0 * mu + H)) / s_norm2;
        deviatoric_projector(n) * a + &s * s.transpose() * b + identity_outer_identity(n) * K
    }
}

impl Behaviour for IsotropicLinearHardeningPlasticity {
    fn name(&self) -> &str {
        "Plasticity"
    }

    fn hypothesis(&self) -> Hypothesis {
        self.hypothesis
    }

    fn internal_state_variables_size(&self) -> usize {
        self.hypothesis.stensor_size() + 1
    }

    fn integrate(&self, data: &mut BehaviourData<'_>) -> Result<(), IntegrationFailure> {
        let n = self.hypothesis.stensor_size();
        let d = self.lame.elastic_operator(n);
        if data.integration_type.is_prediction() {
            data.tangent_operator.copy_from_slice(d.as_slice());
            return Ok(());
        }

        let eps0 = DVectorView::from_slice(data.s0.gradients, n);
        let eps1 = DVectorView::from_slice(data.s1.gradients, n);
        let ee0 = DVectorView::from_slice(&data.s0.internal_state_variables[..n], n);
        let p0 = data.s0.internal_state_variables[n];

        let ee_trial = ee0 + (eps1 - eps0);
        let sig_trial = &d * &ee_trial;
        let s_trial = deviator(&DVectorView::from(&sig_trial));
        let seq_trial = von_mises_equivalent(&s_trial);
        if !seq_trial.is_finite() {
            return Err(IntegrationFailure::new(self.name(), "non-finite trial stress"));
        }

        let mu = self.lame.mu;
        let f = seq_trial - (self.yield_strength + self.hardening_slope * p0);
        let (stress, elastic_strain, dp) = if f <= 0.0 {
            (sig_trial, ee_trial, 0.0)
        } else {
            let dp = f / (3.0 * mu + self.hardening_slope);
            trace!("Plastic correction: seq_trial = {}, dp = {}", seq_trial, dp);
            let flow = &s_trial * (1.5 / seq_trial);
            let stress = sig_trial - &flow * (2.0 * mu * dp);
            let elastic_strain = ee_trial - &flow * dp;
            (stress, elastic_strain, dp)
        };

        data.s1
            .thermodynamic_forces
            .copy_from_slice(stress.as_slice());
        data.s1.internal_state_variables[..n].copy_from_slice(elastic_strain.as_slice());
        data.s1.internal_state_variables[n] = p0 + dp;

        match data.integration_type {
            crate::IntegrationType::IntegrationWithConsistentTangentOperator if dp > 0.0 => {
                let k = self.consistent_tangent_operator(&stress, dp, seq_trial);
                data.tangent_operator.copy_from_slice(k.as_slice());
            }
            it if it.requires_tangent_operator() => {
                data.tangent_operator.copy_from_slice(d.as_slice());
            }
            _ => {}
        }
        Ok(())
    }
}
