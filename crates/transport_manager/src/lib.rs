//! # transport_manager
//!
//! The orchestration layer of the Monte Carlo particle-transport engine:
//! the parallel simulation manager that drives histories through the
//! source/geometry/collision collaborators, the weight-cutoff roulette
//! variance-reduction step, validated simulation properties, and simple
//! reference collaborators for tests and demos.
//!
//! The manager consumes the collaborator traits ([`ParticleSource`],
//! [`GeometryNavigator`], [`CollisionHandler`]) rather than concrete
//! physics; any model implementing them can be transported.

pub mod collision;
pub mod controller;
pub mod geometry;
pub mod manager;
pub mod properties;
pub mod roulette;
pub mod source;
pub mod testing;

pub use collision::{CollisionHandler, ReactionTag};
pub use controller::SimulationController;
pub use geometry::{BoundaryCrossing, GeometryNavigator, RayHit};
pub use manager::{ManagerError, ParticleSimulationManager, RunReport};
pub use properties::{PropertiesError, SimulationProperties, SimulationPropertiesBuilder};
pub use roulette::{RouletteError, WeightCutoffRoulette};
pub use source::ParticleSource;
