//! Validated simulation run properties.
//!
//! Properties are assembled through [`SimulationPropertiesBuilder`], which
//! also derives `Deserialize` so a TOML properties file maps straight onto
//! it; [`SimulationPropertiesBuilder::build`] validates and produces the
//! immutable [`SimulationProperties`] consumed by the manager.

use serde::Deserialize;
use thiserror::Error;
use transport_core::{ParticleType, PARTICLE_TYPE_COUNT};

use crate::roulette::{RouletteError, WeightCutoffRoulette};

/// Properties validation failure.
#[derive(Debug, Error, PartialEq)]
pub enum PropertiesError {
    #[error("number of histories must be positive")]
    ZeroHistories,

    #[error("number of threads must be at least 1")]
    ZeroThreads,

    #[error("{particle_type} minimum energy must be positive (got {energy})")]
    NonPositiveMinEnergy {
        particle_type: ParticleType,
        energy: f64,
    },

    #[error("at least one particle type must be active")]
    NoActiveParticleTypes,

    #[error("snapshot period must be positive")]
    ZeroSnapshotPeriod,

    #[error(transparent)]
    Roulette(#[from] RouletteError),
}

/// Default minimum tracking energy (MeV) per particle type.
fn default_min_energy(particle_type: ParticleType) -> f64 {
    match particle_type {
        ParticleType::Neutron => 1e-11,
        ParticleType::Photon => 1e-3,
        ParticleType::Electron | ParticleType::Positron => 1.5e-5,
    }
}

/// A per-type minimum energy override.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct MinEnergyOverride {
    pub particle_type: ParticleType,
    pub energy: f64,
}

/// A per-type roulette cutoff.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct RouletteCutoff {
    pub particle_type: ParticleType,
    pub threshold: f64,
    pub survival: f64,
}

/// Builder (and TOML schema) for [`SimulationProperties`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationPropertiesBuilder {
    number_of_histories: Option<u64>,
    number_of_threads: Option<usize>,
    base_seed: Option<u64>,
    active_particle_types: Option<Vec<ParticleType>>,
    min_energies: Vec<MinEnergyOverride>,
    roulette: Vec<RouletteCutoff>,
    snapshot_period: Option<u64>,
}

impl SimulationPropertiesBuilder {
    pub fn number_of_histories(mut self, histories: u64) -> Self {
        self.number_of_histories = Some(histories);
        self
    }

    pub fn number_of_threads(mut self, threads: usize) -> Self {
        self.number_of_threads = Some(threads);
        self
    }

    pub fn base_seed(mut self, seed: u64) -> Self {
        self.base_seed = Some(seed);
        self
    }

    /// Sets the transported particle types (default: neutrons only).
    pub fn active_particle_types(mut self, types: &[ParticleType]) -> Self {
        self.active_particle_types = Some(types.to_vec());
        self
    }

    /// Overrides the minimum tracking energy of one type.
    pub fn min_energy(mut self, particle_type: ParticleType, energy: f64) -> Self {
        self.min_energies.push(MinEnergyOverride {
            particle_type,
            energy,
        });
        self
    }

    /// Adds a roulette cutoff for one type.
    pub fn roulette_cutoff(
        mut self,
        particle_type: ParticleType,
        threshold: f64,
        survival: f64,
    ) -> Self {
        self.roulette.push(RouletteCutoff {
            particle_type,
            threshold,
            survival,
        });
        self
    }

    /// Takes estimator snapshots every `period` committed histories.
    pub fn snapshot_period(mut self, period: u64) -> Self {
        self.snapshot_period = Some(period);
        self
    }

    /// Validates and builds the properties.
    pub fn build(self) -> Result<SimulationProperties, PropertiesError> {
        let number_of_histories = self.number_of_histories.unwrap_or(0);
        if number_of_histories == 0 {
            return Err(PropertiesError::ZeroHistories);
        }

        let number_of_threads = self.number_of_threads.unwrap_or_else(num_cpus::get);
        if number_of_threads == 0 {
            return Err(PropertiesError::ZeroThreads);
        }

        let active_types = self
            .active_particle_types
            .unwrap_or_else(|| vec![ParticleType::Neutron]);
        if active_types.is_empty() {
            return Err(PropertiesError::NoActiveParticleTypes);
        }
        let mut active = [false; PARTICLE_TYPE_COUNT];
        for t in &active_types {
            active[t.index()] = true;
        }

        let mut min_energies = [0.0; PARTICLE_TYPE_COUNT];
        for t in ParticleType::ALL {
            min_energies[t.index()] = default_min_energy(t);
        }
        for entry in &self.min_energies {
            if entry.energy <= 0.0 {
                return Err(PropertiesError::NonPositiveMinEnergy {
                    particle_type: entry.particle_type,
                    energy: entry.energy,
                });
            }
            min_energies[entry.particle_type.index()] = entry.energy;
        }

        let mut roulette = WeightCutoffRoulette::new();
        for cutoff in &self.roulette {
            roulette.set_cutoff(cutoff.particle_type, cutoff.threshold, cutoff.survival)?;
        }

        if let Some(period) = self.snapshot_period {
            if period == 0 {
                return Err(PropertiesError::ZeroSnapshotPeriod);
            }
        }

        Ok(SimulationProperties {
            number_of_histories,
            number_of_threads,
            base_seed: self.base_seed.unwrap_or(1_029_384_756),
            active,
            min_energies,
            roulette,
            snapshot_period: self.snapshot_period,
        })
    }
}

/// Immutable, validated properties of one simulation run.
#[derive(Clone, Debug)]
pub struct SimulationProperties {
    number_of_histories: u64,
    number_of_threads: usize,
    base_seed: u64,
    active: [bool; PARTICLE_TYPE_COUNT],
    min_energies: [f64; PARTICLE_TYPE_COUNT],
    roulette: WeightCutoffRoulette,
    snapshot_period: Option<u64>,
}

impl SimulationProperties {
    /// Starts building a set of properties.
    pub fn builder() -> SimulationPropertiesBuilder {
        SimulationPropertiesBuilder::default()
    }

    #[inline]
    pub fn number_of_histories(&self) -> u64 {
        self.number_of_histories
    }

    #[inline]
    pub fn number_of_threads(&self) -> usize {
        self.number_of_threads
    }

    #[inline]
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Whether a particle type is transported.
    #[inline]
    pub fn is_particle_type_active(&self, particle_type: ParticleType) -> bool {
        self.active[particle_type.index()]
    }

    /// Minimum tracking energy (MeV) of a type.
    #[inline]
    pub fn min_energy(&self, particle_type: ParticleType) -> f64 {
        self.min_energies[particle_type.index()]
    }

    /// The configured roulette game.
    #[inline]
    pub fn roulette(&self) -> &WeightCutoffRoulette {
        &self.roulette
    }

    /// Histories between estimator snapshots, when enabled.
    #[inline]
    pub fn snapshot_period(&self) -> Option<u64> {
        self.snapshot_period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let properties = SimulationProperties::builder()
            .number_of_histories(100)
            .build()
            .unwrap();

        assert_eq!(properties.number_of_histories(), 100);
        assert!(properties.number_of_threads() >= 1);
        assert!(properties.is_particle_type_active(ParticleType::Neutron));
        assert!(!properties.is_particle_type_active(ParticleType::Photon));
        assert_eq!(properties.min_energy(ParticleType::Neutron), 1e-11);
        assert_eq!(properties.snapshot_period(), None);
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            SimulationProperties::builder().build().unwrap_err(),
            PropertiesError::ZeroHistories
        );
        assert_eq!(
            SimulationProperties::builder()
                .number_of_histories(1)
                .number_of_threads(0)
                .build()
                .unwrap_err(),
            PropertiesError::ZeroThreads
        );
        assert_eq!(
            SimulationProperties::builder()
                .number_of_histories(1)
                .active_particle_types(&[])
                .build()
                .unwrap_err(),
            PropertiesError::NoActiveParticleTypes
        );
        assert_eq!(
            SimulationProperties::builder()
                .number_of_histories(1)
                .min_energy(ParticleType::Photon, -1.0)
                .build()
                .unwrap_err(),
            PropertiesError::NonPositiveMinEnergy {
                particle_type: ParticleType::Photon,
                energy: -1.0
            }
        );
        assert_eq!(
            SimulationProperties::builder()
                .number_of_histories(1)
                .snapshot_period(0)
                .build()
                .unwrap_err(),
            PropertiesError::ZeroSnapshotPeriod
        );
    }

    #[test]
    fn test_invalid_roulette_is_rejected() {
        let err = SimulationProperties::builder()
            .number_of_histories(1)
            .roulette_cutoff(ParticleType::Neutron, 0.5, 0.1)
            .build()
            .unwrap_err();
        assert!(matches!(err, PropertiesError::Roulette(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let text = r#"
            number_of_histories = 1000
            number_of_threads = 2
            base_seed = 42
            active_particle_types = ["Neutron", "Photon"]
            snapshot_period = 100

            [[min_energies]]
            particle_type = "Neutron"
            energy = 1e-9

            [[roulette]]
            particle_type = "Neutron"
            threshold = 0.1
            survival = 0.5
        "#;

        let builder: SimulationPropertiesBuilder = toml::from_str(text).unwrap();
        let properties = builder.build().unwrap();

        assert_eq!(properties.number_of_histories(), 1000);
        assert_eq!(properties.number_of_threads(), 2);
        assert_eq!(properties.base_seed(), 42);
        assert!(properties.is_particle_type_active(ParticleType::Photon));
        assert_eq!(properties.min_energy(ParticleType::Neutron), 1e-9);
        assert_eq!(
            properties.roulette().threshold_weight(ParticleType::Neutron),
            Some(0.1)
        );
        assert_eq!(properties.snapshot_period(), Some(100));
    }
}
