//! Name-keyed construction of behaviours from parameters.
use crate::parameters::Parameters;
use eyre::eyre;
use nlfem_behaviour::elasticity::{Elasticity, YoungPoisson};
use nlfem_behaviour::plasticity::IsotropicLinearHardeningPlasticity;
use nlfem_behaviour::{Behaviour, Hypothesis};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

type BehaviourGenerator = Box<dyn Fn(Hypothesis, &Parameters) -> eyre::Result<Box<dyn Behaviour>> + Send + Sync>;

/// Process-wide registry of behaviours.
///
/// Built-in behaviours are `Elasticity` and `Plasticity`.
pub struct BehaviourFactory {
    generators: RwLock<FxHashMap<String, BehaviourGenerator>>,
}

fn young_poisson(parameters: &Parameters) -> eyre::Result<YoungPoisson> {
    let young = parameters.get_real("YoungModulus")?;
    let poisson = parameters.get_real("PoissonRatio")?;
    if young <= 0.0 {
        return Err(eyre!("YoungModulus must be positive, got {}", young));
    }
    if !(-1.0 < poisson && poisson < 0.5) {
        return Err(eyre!("PoissonRatio must lie in (-1, 0.5), got {}", poisson));
    }
    Ok(YoungPoisson { young, poisson })
}

impl BehaviourFactory {
    pub fn global() -> &'static Self {
        static FACTORY: OnceLock<BehaviourFactory> = OnceLock::new();
        FACTORY.get_or_init(|| {
            let factory = BehaviourFactory {
                generators: RwLock::new(FxHashMap::default()),
            };
            factory.register("Elasticity", |hypothesis, parameters| {
                parameters.check_parameters(&["YoungModulus", "PoissonRatio"])?;
                let behaviour = Elasticity::new(hypothesis, young_poisson(parameters)?);
                Ok(Box::new(behaviour) as Box<dyn Behaviour>)
            });
            factory.register("Plasticity", |hypothesis, parameters| {
                parameters.check_parameters(&["YoungModulus", "PoissonRatio", "YieldStrength", "HardeningSlope"])?;
                let yield_strength = parameters.get_real("YieldStrength")?;
                let hardening_slope = parameters.get_real("HardeningSlope")?;
                if yield_strength <= 0.0 {
                    return Err(eyre!("YieldStrength must be positive, got {}", yield_strength));
                }
                let behaviour = IsotropicLinearHardeningPlasticity::new(
                    hypothesis,
                    young_poisson(parameters)?,
                    yield_strength,
                    hardening_slope,
                );
                Ok(Box::new(behaviour) as Box<dyn Behaviour>)
            });
            factory
        })
    }

    pub fn register<F>(&self, name: &str, generator: F)
    where
        F: Fn(Hypothesis, &Parameters) -> eyre::Result<Box<dyn Behaviour>> + Send + Sync + 'static,
    {
        self.generators
            .write()
            .insert(name.to_string(), Box::new(generator));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.generators.read().contains_key(name)
    }

    pub fn generate(&self, name: &str, hypothesis: Hypothesis, parameters: &Parameters) -> eyre::Result<Box<dyn Behaviour>> {
        let generators = self.generators.read();
        let generator = generators
            .get(name)
            .ok_or_else(|| eyre!("no behaviour named '{}'", name))?;
        generator(hypothesis, parameters)
    }
}
