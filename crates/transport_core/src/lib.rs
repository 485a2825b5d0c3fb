//! # transport_core
//!
//! Foundation layer of the Monte Carlo particle-transport engine.
//!
//! This crate provides the particle phase-space state, the particle bank,
//! the reproducible per-history random number stream, the communicator
//! abstraction used for cross-process reduction, and the shared error
//! taxonomy. Higher layers (`transport_event`, `transport_manager`) build
//! the estimator engine and the parallel history scheduler on top of these
//! types.

pub mod bank;
pub mod comm;
pub mod error;
pub mod rng;
pub mod types;

pub use bank::ParticleBank;
pub use comm::{Communicator, SerialCommunicator, SharedMemoryCommunicator};
pub use error::{CommunicatorError, LostParticleError, SourceSamplingError};
pub use rng::HistoryRng;
pub use types::{CellId, EntityId, ParticleState, ParticleType, SurfaceId, PARTICLE_TYPE_COUNT};
