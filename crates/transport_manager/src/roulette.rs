//! Weight-cutoff Russian roulette.

use thiserror::Error;
use transport_core::{HistoryRng, ParticleState, ParticleType, PARTICLE_TYPE_COUNT};

/// Roulette configuration failure.
#[derive(Debug, Error, PartialEq)]
pub enum RouletteError {
    #[error("{particle_type} roulette threshold must be positive (got {threshold})")]
    NonPositiveThreshold {
        particle_type: ParticleType,
        threshold: f64,
    },

    #[error(
        "{particle_type} roulette survival weight ({survival}) must exceed the threshold ({threshold})"
    )]
    SurvivalNotAboveThreshold {
        particle_type: ParticleType,
        threshold: f64,
        survival: f64,
    },
}

/// Russian roulette on particles whose weight falls below a per-type
/// threshold.
///
/// A rouletted particle survives with probability `weight / survival`, and
/// a survivor's weight is set to the survival weight, so the expected
/// weight is preserved exactly: the game is unbiased. The cutoff table is
/// read-only after construction; the only mutation is the single uniform
/// draw from the calling thread's history stream.
#[derive(Clone, Debug, Default)]
pub struct WeightCutoffRoulette {
    /// Per-type (threshold, survival) pairs; `None` leaves a type unplayed.
    cutoffs: [Option<(f64, f64)>; PARTICLE_TYPE_COUNT],
}

impl WeightCutoffRoulette {
    /// A roulette that plays no particle type.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the roulette game for one particle type.
    ///
    /// Requires `survival > threshold > 0`.
    pub fn set_cutoff(
        &mut self,
        particle_type: ParticleType,
        threshold: f64,
        survival: f64,
    ) -> Result<(), RouletteError> {
        if threshold <= 0.0 {
            return Err(RouletteError::NonPositiveThreshold {
                particle_type,
                threshold,
            });
        }
        if survival <= threshold {
            return Err(RouletteError::SurvivalNotAboveThreshold {
                particle_type,
                threshold,
                survival,
            });
        }
        self.cutoffs[particle_type.index()] = Some((threshold, survival));
        Ok(())
    }

    /// Threshold weight below which a type is rouletted.
    pub fn threshold_weight(&self, particle_type: ParticleType) -> Option<f64> {
        self.cutoffs[particle_type.index()].map(|(threshold, _)| threshold)
    }

    /// Weight granted to a roulette survivor.
    pub fn survival_weight(&self, particle_type: ParticleType) -> Option<f64> {
        self.cutoffs[particle_type.index()].map(|(_, survival)| survival)
    }

    /// Plays the roulette game on one particle.
    ///
    /// No-op when the type is unconfigured or the weight is at or above
    /// the threshold. Otherwise one uniform draw decides: the particle
    /// survives iff `u < weight / survival` (a draw exactly on the boundary
    /// kills) and a survivor's weight becomes the survival weight.
    pub fn roulette_particle_weight(&self, particle: &mut ParticleState, rng: &mut HistoryRng) {
        let (threshold, survival) = match self.cutoffs[particle.particle_type().index()] {
            Some(cutoff) => cutoff,
            None => return,
        };
        if particle.weight() >= threshold {
            return;
        }

        Self::play(particle, survival, rng.sample_uniform());
    }

    /// Settles a game already below threshold with the given uniform draw.
    fn play(particle: &mut ParticleState, survival: f64, draw: f64) {
        let survival_probability = particle.weight() / survival;
        if draw < survival_probability {
            particle.set_weight(survival);
        } else {
            particle.set_as_gone();
        }
    }
}
