//! Simple reference collaborators.
//!
//! Minimal sources, geometries and collision models used by the
//! integration tests and the CLI demo. They are deliberately tiny: a
//! monoenergetic isotropic point source, an infinite homogeneous medium, a
//! one-dimensional multi-cell slab with vacuum termination on both sides,
//! and a constant-cross-section absorb/scatter material with survival
//! biasing.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;
use transport_core::{
    CellId, HistoryRng, LostParticleError, ParticleBank, ParticleState, ParticleType,
    SourceSamplingError, SurfaceId,
};

use crate::collision::CollisionHandler;
use crate::geometry::{BoundaryCrossing, GeometryNavigator, RayHit};
use crate::source::ParticleSource;

// ============================================================================
// Sources
// ============================================================================

/// A point source emitting one monoenergetic, isotropic particle per
/// history.
pub struct MonoenergeticIsotropicSource {
    particle_type: ParticleType,
    energy: f64,
    position: [f64; 3],
    cell: CellId,
    sampled: AtomicU64,
}

impl MonoenergeticIsotropicSource {
    pub fn new(particle_type: ParticleType, energy: f64, position: [f64; 3], cell: CellId) -> Self {
        Self {
            particle_type,
            energy,
            position,
            cell,
            sampled: AtomicU64::new(0),
        }
    }

    /// Particles sampled so far.
    pub fn sampled(&self) -> u64 {
        self.sampled.load(Ordering::Relaxed)
    }
}

impl ParticleSource for MonoenergeticIsotropicSource {
    fn sample_particle_state(
        &self,
        bank: &mut ParticleBank,
        history: u64,
        rng: &mut HistoryRng,
    ) -> Result<(), SourceSamplingError> {
        let mut particle = ParticleState::new(self.particle_type, history);
        particle.set_energy(self.energy);
        particle.set_position(self.position);
        particle.set_direction(rng.sample_isotropic_direction());
        particle.set_cell(self.cell);

        bank.push(particle);
        self.sampled.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn log_summary(&self) {
        info!(sampled = self.sampled(), "source summary");
    }
}

/// A source that never samples successfully; exercises the lost-source
/// recovery path.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingSource;

impl ParticleSource for FailingSource {
    fn sample_particle_state(
        &self,
        _bank: &mut ParticleBank,
        history: u64,
        _rng: &mut HistoryRng,
    ) -> Result<(), SourceSamplingError> {
        Err(SourceSamplingError {
            history,
            reason: "no phase-space point could be sampled".to_owned(),
        })
    }
}

// ============================================================================
// Geometries
// ============================================================================

/// A single infinite cell; rays never reach a boundary.
#[derive(Clone, Copy, Debug)]
pub struct InfiniteMediumNavigator {
    cell: CellId,
}

impl InfiniteMediumNavigator {
    pub fn new(cell: CellId) -> Self {
        Self { cell }
    }
}

impl GeometryNavigator for InfiniteMediumNavigator {
    fn fire_ray(&self, _particle: &ParticleState) -> Result<RayHit, LostParticleError> {
        Ok(RayHit {
            distance: 1e30,
            surface: 0,
        })
    }

    fn advance_to_boundary(
        &self,
        particle: &mut ParticleState,
    ) -> Result<BoundaryCrossing, LostParticleError> {
        Err(LostParticleError {
            history: particle.history_id(),
            reason: "infinite medium has no boundaries".to_owned(),
        })
    }

    fn is_termination_cell(&self, cell: CellId) -> bool {
        cell != self.cell
    }
}

/// A 1-D slab of `n` material cells along z, bounded by vacuum on both
/// sides.
///
/// Cells are numbered 1..=n between the plane boundaries; cell 0 (left of
/// the slab) and cell n+1 (right of it) terminate tracking. Surface ids
/// equal the index of the crossed plane.
#[derive(Clone, Debug)]
pub struct SlabNavigator {
    /// Plane positions along z, strictly increasing; n+1 edges for n cells.
    planes: Vec<f64>,
}

impl SlabNavigator {
    /// A slab spanning [0, width] split into `n_cells` equal cells.
    pub fn uniform(width: f64, n_cells: usize) -> Self {
        debug_assert!(width > 0.0 && n_cells > 0);
        let planes = (0..=n_cells)
            .map(|i| width * i as f64 / n_cells as f64)
            .collect();
        Self { planes }
    }

    /// Number of material cells.
    pub fn n_cells(&self) -> usize {
        self.planes.len() - 1
    }

    /// The termination cell right of the slab.
    pub fn right_termination_cell(&self) -> CellId {
        self.n_cells() as CellId + 1
    }

    /// The material cell containing a z position, assigned by the caller
    /// when placing source particles.
    pub fn cell_at(&self, z: f64) -> Option<CellId> {
        if z < self.planes[0] || z > *self.planes.last()? {
            return None;
        }
        let p = self.planes.partition_point(|&edge| edge <= z);
        Some((p.max(1).min(self.n_cells()) ) as CellId)
    }

    fn next_plane(&self, particle: &ParticleState) -> Result<(usize, f64), LostParticleError> {
        let cell = particle.cell() as usize;
        if cell == 0 || cell > self.n_cells() {
            return Err(LostParticleError {
                history: particle.history_id(),
                reason: format!("particle in termination cell {}", cell),
            });
        }
        let w = particle.direction()[2];
        if w.abs() < 1e-12 {
            return Err(LostParticleError {
                history: particle.history_id(),
                reason: "flight parallel to the slab planes".to_owned(),
            });
        }

        let z = particle.position()[2];
        let plane_index = if w > 0.0 { cell } else { cell - 1 };
        let distance = (self.planes[plane_index] - z) / w;
        Ok((plane_index, distance.max(0.0)))
    }
}

impl GeometryNavigator for SlabNavigator {
    fn fire_ray(&self, particle: &ParticleState) -> Result<RayHit, LostParticleError> {
        let (plane_index, distance) = self.next_plane(particle)?;
        Ok(RayHit {
            distance,
            surface: plane_index as SurfaceId,
        })
    }

    fn advance_to_boundary(
        &self,
        particle: &mut ParticleState,
    ) -> Result<BoundaryCrossing, LostParticleError> {
        let (plane_index, distance) = self.next_plane(particle)?;
        particle.advance(distance);

        let w = particle.direction()[2];
        let next_cell = if w > 0.0 {
            particle.cell() + 1
        } else {
            particle.cell() - 1
        };
        particle.set_cell(next_cell);

        Ok(BoundaryCrossing {
            surface: plane_index as SurfaceId,
            angle_cosine: w,
            reflected: false,
        })
    }

    fn is_termination_cell(&self, cell: CellId) -> bool {
        cell == 0 || cell > self.n_cells() as CellId
    }
}

// ============================================================================
// Collision handlers
// ============================================================================

/// Constant-cross-section material with a survival-biased absorb/scatter
/// split.
///
/// Every collision multiplies the weight by the scattering ratio (implicit
/// capture) and redirects the particle isotropically, so tracks end only
/// through roulette, cutoffs, or leakage.
#[derive(Clone, Copy, Debug)]
pub struct AbsorbScatterCollisionHandler {
    total_cross_section: f64,
    scatter_ratio: f64,
}

impl AbsorbScatterCollisionHandler {
    /// Requires a positive total cross section and a scattering ratio in
    /// [0, 1].
    pub fn new(total_cross_section: f64, scatter_ratio: f64) -> Self {
        debug_assert!(total_cross_section > 0.0);
        debug_assert!((0.0..=1.0).contains(&scatter_ratio));
        Self {
            total_cross_section,
            scatter_ratio,
        }
    }
}

impl CollisionHandler for AbsorbScatterCollisionHandler {
    fn is_cell_void(&self, _cell: CellId, _particle_type: ParticleType) -> bool {
        false
    }

    fn macroscopic_total_cross_section(&self, _particle: &ParticleState) -> f64 {
        self.total_cross_section
    }

    fn macroscopic_reaction_cross_section(
        &self,
        _particle: &ParticleState,
        reaction: crate::collision::ReactionTag,
    ) -> f64 {
        // Reaction 0 is scattering, everything else absorption.
        if reaction == 0 {
            self.total_cross_section * self.scatter_ratio
        } else {
            self.total_cross_section * (1.0 - self.scatter_ratio)
        }
    }

    fn collide_with_cell_material(
        &self,
        particle: &mut ParticleState,
        _bank: &mut ParticleBank,
        rng: &mut HistoryRng,
    ) {
        particle.multiply_weight(self.scatter_ratio);
        if particle.weight() == 0.0 {
            particle.set_as_gone();
            return;
        }
        particle.set_direction(rng.sample_isotropic_direction());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_banks_one_particle_per_history() {
        let source =
            MonoenergeticIsotropicSource::new(ParticleType::Neutron, 2.0, [0.0; 3], 1);
        let mut bank = ParticleBank::new();
        let mut rng = HistoryRng::for_history(1, 0);

        source
            .sample_particle_state(&mut bank, 0, &mut rng)
            .unwrap();

        assert_eq!(bank.len(), 1);
        assert_eq!(source.sampled(), 1);
        let p = bank.pop().unwrap();
        assert_eq!(p.energy(), 2.0);
        assert_eq!(p.cell(), 1);
    }

    #[test]
    fn test_slab_cell_lookup() {
        let slab = SlabNavigator::uniform(4.0, 4);

        assert_eq!(slab.cell_at(0.5), Some(1));
        assert_eq!(slab.cell_at(3.5), Some(4));
        assert_eq!(slab.cell_at(-0.1), None);
        assert_eq!(slab.cell_at(4.1), None);
        assert!(slab.is_termination_cell(0));
        assert!(slab.is_termination_cell(5));
        assert!(!slab.is_termination_cell(2));
    }

    #[test]
    fn test_slab_ray_and_boundary_advance() {
        let slab = SlabNavigator::uniform(4.0, 4);
        let mut p = ParticleState::new(ParticleType::Neutron, 0);
        p.set_position([0.0, 0.0, 0.5]);
        p.set_direction([0.0, 0.0, 1.0]);
        p.set_cell(1);

        let hit = slab.fire_ray(&p).unwrap();
        assert_eq!(hit.surface, 1);
        assert!((hit.distance - 0.5).abs() < 1e-12);

        let crossing = slab.advance_to_boundary(&mut p).unwrap();
        assert_eq!(crossing.surface, 1);
        assert_eq!(crossing.angle_cosine, 1.0);
        assert_eq!(p.cell(), 2);
        assert!((p.position()[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_slab_leaks_into_termination_cell() {
        let slab = SlabNavigator::uniform(1.0, 1);
        let mut p = ParticleState::new(ParticleType::Neutron, 0);
        p.set_position([0.0, 0.0, 0.5]);
        p.set_direction([0.0, 0.0, -1.0]);
        p.set_cell(1);

        let crossing = slab.advance_to_boundary(&mut p).unwrap();
        assert_eq!(crossing.surface, 0);
        assert_eq!(p.cell(), 0);
        assert!(slab.is_termination_cell(p.cell()));
    }

    #[test]
    fn test_collision_applies_survival_biasing() {
        let handler = AbsorbScatterCollisionHandler::new(2.0, 0.75);
        let mut p = ParticleState::new(ParticleType::Neutron, 0);
        let mut bank = ParticleBank::new();
        let mut rng = HistoryRng::from_seed(3);

        handler.collide_with_cell_material(&mut p, &mut bank, &mut rng);

        assert!((p.weight() - 0.75).abs() < 1e-12);
        assert!(!p.is_gone());
        assert!(bank.is_empty());
    }
}
