//! Simulation of a strategy against sampled environment inputs.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::domain::Valuation;
use crate::error::Result;
use crate::machine::Controller;
use crate::strategy::Strategy;

/// Source of environment inputs.
pub trait InputSampler {
    /// Pick one of the currently allowed inputs; `choices` is never empty.
    fn sample<'a>(&mut self, choices: &[&'a Valuation]) -> &'a Valuation;
}

/// Uniform choice among the allowed inputs, reproducible from a seed.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: ChaCha8Rng,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl InputSampler for RandomSampler {
    fn sample<'a>(&mut self, choices: &[&'a Valuation]) -> &'a Valuation {
        choices[self.rng.random_range(0..choices.len())]
    }
}

/// Run the strategy for up to `steps` steps, returning the `(input, output)` trace.
///
/// The run stops early if a node accepts no input at all.
pub fn random_run(strategy: &Strategy, steps: usize, sampler: &mut impl InputSampler) -> Result<Vec<(Valuation, Valuation)>> {
    let mut controller = Controller::new(strategy);
    let mut trace = Vec::with_capacity(steps);
    for _ in 0..steps {
        let choices: Vec<&Valuation> = controller.allowed_inputs().collect();
        if choices.is_empty() {
            log::debug!("no allowed input after {} steps", trace.len());
            break;
        }
        let input = sampler.sample(&choices).clone();
        let output = controller.step(&input)?;
        trace.push((input, output));
    }
    Ok(trace)
}
