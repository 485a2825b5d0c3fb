//! Core identifier and particle state types.

mod particle;

pub use particle::{ParticleState, ParticleType, PARTICLE_TYPE_COUNT};

/// Geometric cell identifier.
pub type CellId = u64;

/// Geometric surface identifier.
pub type SurfaceId = u64;

/// Estimator entity identifier (cell, surface or mesh element).
pub type EntityId = u64;
