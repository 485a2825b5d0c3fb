//! Phase-space binning of observed particle states.
//!
//! An estimator partitions its tallies over an immutable discretization of
//! the particle phase space. Each dimension is optional; configured
//! dimensions carry strictly-increasing bin boundaries, and the flat bin
//! index is mixed-radix over the configured dimensions in a fixed order:
//! energy varies fastest, then time, collision number, and cosine.

use thiserror::Error;
use transport_core::ParticleState;

/// Configuration failure for a phase-space discretization.
#[derive(Debug, Error, PartialEq)]
pub enum DiscretizationError {
    #[error("{dimension} boundaries need at least two edges (got {count})")]
    TooFewBoundaries { dimension: &'static str, count: usize },

    #[error("{dimension} boundaries must be strictly increasing at edge {index}")]
    NonIncreasingBoundaries { dimension: &'static str, index: usize },
}

/// A particle state as observed at a scoring point.
///
/// Carries the optional surface-crossing angle cosine that only exists for
/// surface events; cell events leave it `None`.
#[derive(Clone, Copy, Debug)]
pub struct ObservedState<'a> {
    pub particle: &'a ParticleState,
    pub angle_cosine: Option<f64>,
}

impl<'a> ObservedState<'a> {
    /// Observation at a cell event (no crossing cosine).
    #[inline]
    pub fn in_cell(particle: &'a ParticleState) -> Self {
        Self {
            particle,
            angle_cosine: None,
        }
    }

    /// Observation at a surface crossing with the given angle cosine.
    #[inline]
    pub fn crossing_surface(particle: &'a ParticleState, angle_cosine: f64) -> Self {
        Self {
            particle,
            angle_cosine: Some(angle_cosine),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Dimension {
    boundaries: Vec<f64>,
}

impl Dimension {
    fn bin_count(&self) -> usize {
        if self.boundaries.is_empty() {
            1
        } else {
            self.boundaries.len() - 1
        }
    }

    /// Bin of `value`, or `None` when the value falls outside the grid.
    /// An unconfigured dimension maps everything to bin 0.
    fn bin_of(&self, value: f64) -> Option<usize> {
        if self.boundaries.is_empty() {
            return Some(0);
        }
        if value < self.boundaries[0] || value > *self.boundaries.last().unwrap_or(&f64::MIN) {
            return None;
        }
        let p = self.boundaries.partition_point(|&edge| edge <= value);
        Some((p - 1).min(self.bin_count() - 1))
    }
}

fn validate_boundaries(
    dimension: &'static str,
    boundaries: &[f64],
) -> Result<(), DiscretizationError> {
    if boundaries.len() < 2 {
        return Err(DiscretizationError::TooFewBoundaries {
            dimension,
            count: boundaries.len(),
        });
    }
    for (index, pair) in boundaries.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(DiscretizationError::NonIncreasingBoundaries {
                dimension,
                index: index + 1,
            });
        }
    }
    Ok(())
}

/// An immutable binning of the observable particle phase space.
#[derive(Clone, Debug, Default)]
pub struct PhaseSpaceDiscretization {
    energy: Dimension,
    time: Dimension,
    collision_number: Dimension,
    cosine: Dimension,
}

impl PhaseSpaceDiscretization {
    /// A single all-encompassing bin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets strictly-increasing energy bin boundaries (MeV).
    pub fn with_energy_boundaries(
        mut self,
        boundaries: Vec<f64>,
    ) -> Result<Self, DiscretizationError> {
        validate_boundaries("energy", &boundaries)?;
        self.energy.boundaries = boundaries;
        Ok(self)
    }

    /// Sets strictly-increasing time bin boundaries (s).
    pub fn with_time_boundaries(
        mut self,
        boundaries: Vec<f64>,
    ) -> Result<Self, DiscretizationError> {
        validate_boundaries("time", &boundaries)?;
        self.time.boundaries = boundaries;
        Ok(self)
    }

    /// Sets strictly-increasing collision-number bin boundaries.
    pub fn with_collision_number_boundaries(
        mut self,
        boundaries: Vec<f64>,
    ) -> Result<Self, DiscretizationError> {
        validate_boundaries("collision number", &boundaries)?;
        self.collision_number.boundaries = boundaries;
        Ok(self)
    }

    /// Sets strictly-increasing angle-cosine bin boundaries.
    pub fn with_cosine_boundaries(
        mut self,
        boundaries: Vec<f64>,
    ) -> Result<Self, DiscretizationError> {
        validate_boundaries("cosine", &boundaries)?;
        self.cosine.boundaries = boundaries;
        Ok(self)
    }

    /// Total number of flat phase-space bins.
    pub fn bin_count(&self) -> usize {
        self.energy.bin_count()
            * self.time.bin_count()
            * self.collision_number.bin_count()
            * self.cosine.bin_count()
    }

    /// Flat bin of an observed state, or `None` when the state falls
    /// outside the discretized phase space.
    ///
    /// A cosine-binned discretization only accepts observations that carry
    /// an angle cosine.
    pub fn bin_index_of(&self, observed: &ObservedState<'_>) -> Option<usize> {
        let particle = observed.particle;

        let energy_bin = self.energy.bin_of(particle.energy())?;
        let time_bin = self.time.bin_of(particle.time())?;
        let collision_bin = self
            .collision_number
            .bin_of(particle.collision_count() as f64)?;
        let cosine_bin = if self.cosine.boundaries.is_empty() {
            0
        } else {
            self.cosine.bin_of(observed.angle_cosine?)?
        };

        // Mixed radix, energy fastest.
        let mut index = energy_bin;
        let mut stride = self.energy.bin_count();
        index += time_bin * stride;
        stride *= self.time.bin_count();
        index += collision_bin * stride;
        stride *= self.collision_number.bin_count();
        index += cosine_bin * stride;

        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport_core::{ParticleState, ParticleType};

    fn particle(energy: f64, time: f64, collisions: u32) -> ParticleState {
        let mut p = ParticleState::new(ParticleType::Neutron, 0);
        p.set_energy(energy);
        p.set_time(time);
        for _ in 0..collisions {
            p.increment_collision_count();
        }
        p
    }

    #[test]
    fn test_unbinned_discretization_has_one_bin() {
        let d = PhaseSpaceDiscretization::new();
        let p = particle(1.0, 0.0, 0);

        assert_eq!(d.bin_count(), 1);
        assert_eq!(d.bin_index_of(&ObservedState::in_cell(&p)), Some(0));
    }

    #[test]
    fn test_energy_binning() {
        let d = PhaseSpaceDiscretization::new()
            .with_energy_boundaries(vec![0.0, 1.0, 10.0])
            .unwrap();

        assert_eq!(d.bin_count(), 2);
        let low = particle(0.5, 0.0, 0);
        let high = particle(5.0, 0.0, 0);
        let outside = particle(20.0, 0.0, 0);

        assert_eq!(d.bin_index_of(&ObservedState::in_cell(&low)), Some(0));
        assert_eq!(d.bin_index_of(&ObservedState::in_cell(&high)), Some(1));
        assert_eq!(d.bin_index_of(&ObservedState::in_cell(&outside)), None);
    }

    #[test]
    fn test_mixed_radix_index_energy_fastest() {
        let d = PhaseSpaceDiscretization::new()
            .with_energy_boundaries(vec![0.0, 1.0, 10.0])
            .unwrap()
            .with_time_boundaries(vec![0.0, 1.0, 2.0])
            .unwrap();

        assert_eq!(d.bin_count(), 4);

        // energy bin 1, time bin 1 -> 1 + 1*2 = 3.
        let p = particle(5.0, 1.5, 0);
        assert_eq!(d.bin_index_of(&ObservedState::in_cell(&p)), Some(3));
    }

    #[test]
    fn test_cosine_binning_requires_a_crossing_observation() {
        let d = PhaseSpaceDiscretization::new()
            .with_cosine_boundaries(vec![-1.0, 0.0, 1.0])
            .unwrap();
        let p = particle(1.0, 0.0, 0);

        assert_eq!(d.bin_index_of(&ObservedState::in_cell(&p)), None);
        assert_eq!(
            d.bin_index_of(&ObservedState::crossing_surface(&p, 0.5)),
            Some(1)
        );
    }

    #[test]
    fn test_boundary_validation() {
        let too_few = PhaseSpaceDiscretization::new().with_energy_boundaries(vec![1.0]);
        assert_eq!(
            too_few.unwrap_err(),
            DiscretizationError::TooFewBoundaries {
                dimension: "energy",
                count: 1
            }
        );

        let not_increasing =
            PhaseSpaceDiscretization::new().with_time_boundaries(vec![0.0, 1.0, 1.0]);
        assert_eq!(
            not_increasing.unwrap_err(),
            DiscretizationError::NonIncreasingBoundaries {
                dimension: "time",
                index: 2
            }
        );
    }

    #[test]
    fn test_top_edge_is_inclusive() {
        let d = PhaseSpaceDiscretization::new()
            .with_energy_boundaries(vec![0.0, 1.0, 2.0])
            .unwrap();
        let p = particle(2.0, 0.0, 0);

        assert_eq!(d.bin_index_of(&ObservedState::in_cell(&p)), Some(1));
    }
}
