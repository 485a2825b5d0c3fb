//! Particle source interface.

use transport_core::{HistoryRng, ParticleBank, SourceSamplingError};

/// Samples the starting particle(s) of each history.
///
/// A source is shared read-only across worker threads; per-thread sampling
/// statistics go behind the implementation's own interior mutability.
pub trait ParticleSource: Send + Sync {
    /// Samples the source particles of `history` into the bank.
    ///
    /// A failed sample is recoverable: the manager logs it, counts the
    /// history as completed with no contributions, and moves on.
    fn sample_particle_state(
        &self,
        bank: &mut ParticleBank,
        history: u64,
        rng: &mut HistoryRng,
    ) -> Result<(), SourceSamplingError>;

    /// Allocates per-thread sampling statistics slots.
    fn enable_thread_support(&self, n_threads: usize) {
        let _ = n_threads;
    }

    /// Logs sampling statistics.
    fn log_summary(&self) {}
}
