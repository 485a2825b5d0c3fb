//! # transport_event
//!
//! Event layer of the Monte Carlo particle-transport engine: the
//! thread-safe, distributable statistical estimator, the event handler
//! that routes tracking events into estimators, and the composable
//! completion-criterion state machine that decides when a simulation
//! stops.
//!
//! # Accumulation model
//!
//! Each worker thread scores *uncommitted* per-history contributions into
//! its own private slot; [`Estimator::commit_history_contribution`] folds
//! the finished history's per-bin scores into the shared moment store as
//! one sample (score, score², score³, score⁴). Committed moments are
//! additive, so combining accumulators from disjoint history sets — across
//! threads or across processes via [`Estimator::reduce_data`] — is
//! element-wise summation.

pub mod criterion;
pub mod discretization;
pub mod estimator;
pub mod event_handler;
pub mod histogram;
pub mod moments;
pub mod response;
pub mod snapshots;

pub use criterion::{CompletionCriterion, CriterionError};
pub use discretization::{DiscretizationError, ObservedState, PhaseSpaceDiscretization};
pub use estimator::{Estimator, EstimatorBuilder, EstimatorConfigError, EstimatorKind};
pub use event_handler::EventHandler;
pub use histogram::SampleMomentHistogram;
pub use moments::{process_moments, FourMoments, MomentCollection, ProcessedMoments};
pub use response::{ConstantResponse, ParticleResponse, UnitResponse};
pub use snapshots::MomentSnapshots;
