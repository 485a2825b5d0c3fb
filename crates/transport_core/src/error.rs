//! Shared error taxonomy for the transport engine.
//!
//! Per-particle failures ([`LostParticleError`], [`SourceSamplingError`])
//! are recoverable: they are absorbed at the track level, the affected
//! particle is marked gone, and the simulation continues. Reduction
//! failures ([`CommunicatorError`]) are propagated to the caller of
//! `reduce_data`.

use thiserror::Error;

/// A particle could not be tracked further by the geometry navigator.
///
/// Raised at the points where tracking can fail (ray firing, boundary
/// advance). The scheduler catches this, marks the particle gone, logs the
/// event and continues with the history — it is never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("lost particle in history {history}: {reason}")]
pub struct LostParticleError {
    /// History the lost particle belonged to.
    pub history: u64,
    /// Navigator-supplied description of the failure.
    pub reason: String,
}

/// The source failed to sample a particle state for a history.
///
/// Caught and logged by the scheduler without aborting the run; the history
/// continues with whatever particles were banked before the failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("lost source particle in history {history}: {reason}")]
pub struct SourceSamplingError {
    /// History for which sampling failed.
    pub history: u64,
    /// Source-supplied description of the failure.
    pub reason: String,
}

/// Errors raised by collective reduction operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommunicatorError {
    /// The requested root rank does not exist in the communicator.
    #[error("invalid root rank {root}: communicator size is {size}")]
    InvalidRoot {
        /// Requested root rank.
        root: usize,
        /// Communicator size.
        size: usize,
    },

    /// Ranks presented buffers of different lengths to the same collective.
    #[error("reduction buffer length mismatch: this rank has {local}, collective started with {expected}")]
    LengthMismatch {
        /// Length of this rank's buffer.
        local: usize,
        /// Length established by the first rank to enter the collective.
        expected: usize,
    },

    /// Snapshot series lengths differ across ranks.
    ///
    /// Both sides of a snapshot reduction must have taken the same number
    /// of snapshots at the same cadence.
    #[error("snapshot series length mismatch across ranks: local {local}, remote {remote}")]
    SnapshotMismatch {
        /// Number of snapshots on this rank.
        local: usize,
        /// Number of snapshots on the conflicting rank.
        remote: usize,
    },
}
