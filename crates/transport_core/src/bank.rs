//! The particle bank.

use crate::types::ParticleState;

/// An unordered multiset of owned particle states.
///
/// Banks hold the particles waiting to be tracked within a single history:
/// the source bank holds freshly sampled source particles and the working
/// bank accumulates collision secondaries. No ordering is guaranteed — the
/// only contract is that every pushed particle is eventually popped by the
/// drain loops in the simulation manager.
///
/// A bank lives on one worker thread for the duration of one history and
/// requires no synchronisation.
#[derive(Clone, Debug, Default)]
pub struct ParticleBank {
    particles: Vec<ParticleState>,
}

impl ParticleBank {
    /// Creates an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a particle into the bank, taking ownership.
    #[inline]
    pub fn push(&mut self, particle: ParticleState) {
        self.particles.push(particle);
    }

    /// Removes and returns one particle, or `None` if the bank is empty.
    ///
    /// The removal order is unspecified.
    #[inline]
    pub fn pop(&mut self) -> Option<ParticleState> {
        self.particles.pop()
    }

    /// Returns a reference to the particle that the next `pop` would return.
    #[inline]
    pub fn top(&self) -> Option<&ParticleState> {
        self.particles.last()
    }

    /// Moves every particle from `other` into this bank, leaving it empty.
    pub fn splice(&mut self, other: &mut ParticleBank) {
        self.particles.append(&mut other.particles);
    }

    /// Returns the number of banked particles.
    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Returns true if the bank holds no particles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParticleType;

    #[test]
    fn test_push_pop_round_trip() {
        let mut bank = ParticleBank::new();
        assert!(bank.is_empty());

        bank.push(ParticleState::new(ParticleType::Neutron, 1));
        bank.push(ParticleState::new(ParticleType::Photon, 1));
        assert_eq!(bank.len(), 2);

        let mut seen = Vec::new();
        while let Some(p) = bank.pop() {
            seen.push(p.particle_type());
        }

        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&ParticleType::Neutron));
        assert!(seen.contains(&ParticleType::Photon));
        assert!(bank.is_empty());
    }

    #[test]
    fn test_top_matches_next_pop() {
        let mut bank = ParticleBank::new();
        bank.push(ParticleState::new(ParticleType::Electron, 4));

        let top_type = bank.top().map(|p| p.particle_type());
        let popped = bank.pop().unwrap();

        assert_eq!(top_type, Some(popped.particle_type()));
    }

    #[test]
    fn test_splice_drains_other_bank() {
        let mut bank = ParticleBank::new();
        let mut other = ParticleBank::new();

        bank.push(ParticleState::new(ParticleType::Neutron, 0));
        other.push(ParticleState::new(ParticleType::Photon, 0));
        other.push(ParticleState::new(ParticleType::Positron, 0));

        bank.splice(&mut other);

        assert_eq!(bank.len(), 3);
        assert!(other.is_empty());
    }
}
