//! Particle type tags and the particle phase-space state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of particle types tracked by the engine.
///
/// Used to size per-type dispatch and parameter tables indexed by
/// [`ParticleType::index`].
pub const PARTICLE_TYPE_COUNT: usize = 4;

/// The particle kinds that can be transported.
///
/// The enum discriminant is stable and doubles as the index into the
/// per-type dispatch tables built by the simulation manager, avoiding
/// run-time type inspection on the hot tracking path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticleType {
    /// Neutron.
    Neutron,
    /// Photon (gamma).
    Photon,
    /// Electron.
    Electron,
    /// Positron.
    Positron,
}

impl ParticleType {
    /// All particle types, in discriminant order.
    pub const ALL: [ParticleType; PARTICLE_TYPE_COUNT] = [
        ParticleType::Neutron,
        ParticleType::Photon,
        ParticleType::Electron,
        ParticleType::Positron,
    ];

    /// Returns the stable dispatch-table index for this type.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ParticleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParticleType::Neutron => "neutron",
            ParticleType::Photon => "photon",
            ParticleType::Electron => "electron",
            ParticleType::Positron => "positron",
        };
        write!(f, "{}", name)
    }
}

/// A single particle's phase-space state.
///
/// Carries the identity (history id, collision count), kinematics (energy,
/// position, direction, time, statistical weight) and the current geometric
/// cell. A state is owned exclusively by whichever [`ParticleBank`] or track
/// loop currently holds it; ownership moves on push/pop, never shared.
///
/// A particle is created by the source or by a collision (secondary
/// emission) and is destroyed — marked gone — on absorption, leakage,
/// energy cutoff, or roulette kill.
///
/// [`ParticleBank`]: crate::bank::ParticleBank
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleState {
    history_id: u64,
    particle_type: ParticleType,
    position: [f64; 3],
    direction: [f64; 3],
    energy: f64,
    time: f64,
    weight: f64,
    cell: super::CellId,
    collision_count: u32,
    gone: bool,
}

impl ParticleState {
    /// Creates a new alive particle of the given type for a history.
    ///
    /// The state starts at the origin travelling along +z with unit energy,
    /// unit weight, zero time and an unset (zero) cell; the source is
    /// expected to overwrite every kinematic attribute it samples.
    pub fn new(particle_type: ParticleType, history_id: u64) -> Self {
        Self {
            history_id,
            particle_type,
            position: [0.0; 3],
            direction: [0.0, 0.0, 1.0],
            energy: 1.0,
            time: 0.0,
            weight: 1.0,
            cell: 0,
            collision_count: 0,
            gone: false,
        }
    }

    /// Returns the history this particle belongs to.
    #[inline]
    pub fn history_id(&self) -> u64 {
        self.history_id
    }

    /// Returns the particle type tag.
    #[inline]
    pub fn particle_type(&self) -> ParticleType {
        self.particle_type
    }

    /// Returns the position (cm).
    #[inline]
    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    /// Sets the position (cm).
    #[inline]
    pub fn set_position(&mut self, position: [f64; 3]) {
        self.position = position;
    }

    /// Returns the direction of travel (unit vector).
    #[inline]
    pub fn direction(&self) -> [f64; 3] {
        self.direction
    }

    /// Sets the direction of travel.
    ///
    /// The direction must be a unit vector; this is checked in debug builds
    /// only since the source and collision kernels are trusted to normalise.
    pub fn set_direction(&mut self, direction: [f64; 3]) {
        debug_assert!(
            {
                let norm_sq: f64 = direction.iter().map(|c| c * c).sum();
                (norm_sq - 1.0).abs() < 1e-9
            },
            "particle direction must be a unit vector"
        );
        self.direction = direction;
    }

    /// Returns the kinetic energy (MeV).
    #[inline]
    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Sets the kinetic energy (MeV). Must be positive.
    pub fn set_energy(&mut self, energy: f64) {
        debug_assert!(energy > 0.0, "particle energy must be positive");
        self.energy = energy;
    }

    /// Returns the particle time (s).
    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Sets the particle time (s).
    #[inline]
    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    /// Returns the statistical weight.
    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Sets the statistical weight. Must be non-negative.
    pub fn set_weight(&mut self, weight: f64) {
        debug_assert!(weight >= 0.0, "particle weight must be non-negative");
        self.weight = weight;
    }

    /// Multiplies the statistical weight (survival biasing, splitting).
    #[inline]
    pub fn multiply_weight(&mut self, factor: f64) {
        debug_assert!(factor >= 0.0);
        self.weight *= factor;
    }

    /// Returns the geometric cell currently containing the particle.
    #[inline]
    pub fn cell(&self) -> super::CellId {
        self.cell
    }

    /// Sets the geometric cell containing the particle.
    #[inline]
    pub fn set_cell(&mut self, cell: super::CellId) {
        self.cell = cell;
    }

    /// Returns the number of collisions this particle has undergone.
    #[inline]
    pub fn collision_count(&self) -> u32 {
        self.collision_count
    }

    /// Increments the collision count.
    #[inline]
    pub fn increment_collision_count(&mut self) {
        self.collision_count += 1;
    }

    /// Advances the particle along its direction of travel.
    pub fn advance(&mut self, distance: f64) {
        debug_assert!(distance >= 0.0);
        for (p, d) in self.position.iter_mut().zip(self.direction.iter()) {
            *p += d * distance;
        }
    }

    /// Returns true if the particle has been terminated.
    #[inline]
    pub fn is_gone(&self) -> bool {
        self.gone
    }

    /// Terminates the particle (absorption, leakage, cutoff, roulette kill).
    #[inline]
    pub fn set_as_gone(&mut self) {
        self.gone = true;
    }

    /// Spawns a secondary particle of a (possibly different) type.
    ///
    /// The secondary inherits the parent's phase-space coordinates, weight
    /// and history id; its collision count restarts at zero and it is alive
    /// regardless of the parent's state.
    pub fn spawn_secondary(&self, particle_type: ParticleType) -> Self {
        Self {
            history_id: self.history_id,
            particle_type,
            position: self.position,
            direction: self.direction,
            energy: self.energy,
            time: self.time,
            weight: self.weight,
            cell: self.cell,
            collision_count: 0,
            gone: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_particle_type_indices_are_stable() {
        assert_eq!(ParticleType::Neutron.index(), 0);
        assert_eq!(ParticleType::Photon.index(), 1);
        assert_eq!(ParticleType::Electron.index(), 2);
        assert_eq!(ParticleType::Positron.index(), 3);

        for (i, t) in ParticleType::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
    }

    #[test]
    fn test_new_particle_defaults() {
        let p = ParticleState::new(ParticleType::Neutron, 7);

        assert_eq!(p.history_id(), 7);
        assert_eq!(p.particle_type(), ParticleType::Neutron);
        assert_eq!(p.weight(), 1.0);
        assert_eq!(p.collision_count(), 0);
        assert!(!p.is_gone());
    }

    #[test]
    fn test_advance_moves_along_direction() {
        let mut p = ParticleState::new(ParticleType::Photon, 0);
        p.set_position([1.0, 2.0, 3.0]);
        p.set_direction([1.0, 0.0, 0.0]);

        p.advance(2.5);

        let pos = p.position();
        assert_relative_eq!(pos[0], 3.5, epsilon = 1e-12);
        assert_relative_eq!(pos[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(pos[2], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_spawn_secondary_inherits_phase_space() {
        let mut p = ParticleState::new(ParticleType::Neutron, 3);
        p.set_position([1.0, 1.0, 1.0]);
        p.set_weight(0.5);
        p.increment_collision_count();
        p.set_as_gone();

        let s = p.spawn_secondary(ParticleType::Photon);

        assert_eq!(s.history_id(), 3);
        assert_eq!(s.particle_type(), ParticleType::Photon);
        assert_eq!(s.position(), [1.0, 1.0, 1.0]);
        assert_eq!(s.weight(), 0.5);
        assert_eq!(s.collision_count(), 0);
        assert!(!s.is_gone());
    }

    #[test]
    fn test_set_as_gone() {
        let mut p = ParticleState::new(ParticleType::Electron, 0);
        p.set_as_gone();
        assert!(p.is_gone());
    }

    #[test]
    fn test_multiply_weight() {
        let mut p = ParticleState::new(ParticleType::Positron, 0);
        p.set_weight(0.8);
        p.multiply_weight(0.5);
        assert_relative_eq!(p.weight(), 0.4, epsilon = 1e-12);
    }
}
