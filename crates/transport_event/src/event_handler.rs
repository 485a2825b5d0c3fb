//! Routing of particle tracking events into estimators.

use std::sync::Arc;

use tracing::trace;
use transport_core::{CellId, Communicator, CommunicatorError, ParticleState, SurfaceId};

use crate::discretization::ObservedState;
use crate::estimator::{Estimator, EstimatorKind};

/// Dispatches tracking events from the transport loop to every registered
/// estimator that consumes them.
///
/// The handler itself holds no tally state; estimators are shared and
/// internally synchronized, so one handler serves all worker threads.
#[derive(Clone, Default)]
pub struct EventHandler {
    estimators: Vec<Arc<Estimator>>,
}

impl EventHandler {
    /// Creates a handler with no estimators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an estimator.
    pub fn add_estimator(&mut self, estimator: Arc<Estimator>) {
        self.estimators.push(estimator);
    }

    /// The registered estimators.
    #[inline]
    pub fn estimators(&self) -> &[Arc<Estimator>] {
        &self.estimators
    }

    /// Number of registered estimators.
    #[inline]
    pub fn n_estimators(&self) -> usize {
        self.estimators.len()
    }

    // ========================================================================
    // Tracking events
    // ========================================================================

    /// A particle entered a cell (diagnostic hook, nothing scores here).
    pub fn particle_entering_cell(&self, particle: &ParticleState, cell: CellId) {
        trace!(
            history = particle.history_id(),
            particle = %particle.particle_type(),
            cell,
            "entering cell"
        );
    }

    /// A subtrack of length `distance` ended in `cell`.
    ///
    /// Track-length flux estimators score weight · distance.
    pub fn particle_subtrack_ending_in_cell(
        &self,
        particle: &ParticleState,
        cell: CellId,
        distance: f64,
    ) {
        let observed = ObservedState::in_cell(particle);
        let score = particle.weight() * distance;
        for estimator in &self.estimators {
            if estimator.kind() == EstimatorKind::CellTrackLengthFlux {
                estimator.add_partial_history_contribution(cell, &observed, score);
            }
        }
    }

    /// A particle collided in its current cell where the macroscopic total
    /// cross section is `total_cross_section`.
    ///
    /// Collision flux estimators score weight / σ_t.
    pub fn particle_colliding_in_cell(&self, particle: &ParticleState, total_cross_section: f64) {
        if total_cross_section <= 0.0 {
            return;
        }
        let observed = ObservedState::in_cell(particle);
        let score = particle.weight() / total_cross_section;
        for estimator in &self.estimators {
            if estimator.kind() == EstimatorKind::CellCollisionFlux {
                estimator.add_partial_history_contribution(particle.cell(), &observed, score);
            }
        }
    }

    /// A particle crossed `surface` with the given angle cosine against the
    /// surface normal.
    ///
    /// Surface current estimators score the particle weight.
    pub fn particle_crossing_surface(
        &self,
        particle: &ParticleState,
        surface: SurfaceId,
        angle_cosine: f64,
    ) {
        let observed = ObservedState::crossing_surface(particle, angle_cosine);
        let score = particle.weight();
        for estimator in &self.estimators {
            if estimator.kind() == EstimatorKind::SurfaceCurrent {
                estimator.add_partial_history_contribution(surface, &observed, score);
            }
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Commits the calling thread's uncommitted contributions in every
    /// estimator. Called once per finished history.
    pub fn commit_history_contributions(&self) {
        for estimator in &self.estimators {
            estimator.commit_history_contribution();
        }
    }

    /// Allocates per-thread tracker slots in every estimator.
    pub fn enable_thread_support(&self, n_threads: usize) {
        for estimator in &self.estimators {
            estimator.enable_thread_support(n_threads);
        }
    }

    /// Snapshots every estimator's committed moments.
    pub fn take_snapshots(&self, n_histories: u64, elapsed_time: f64) {
        for estimator in &self.estimators {
            estimator.take_snapshot(n_histories, elapsed_time);
        }
    }

    /// Reduces every estimator's data onto the root rank.
    pub fn reduce_data(
        &self,
        comm: &dyn Communicator,
        root: usize,
    ) -> Result<(), CommunicatorError> {
        for estimator in &self.estimators {
            estimator.reduce_data(comm, root)?;
        }
        Ok(())
    }

    /// Resets every estimator.
    pub fn reset_data(&self) {
        for estimator in &self.estimators {
            estimator.reset_data();
        }
    }

    /// Logs every estimator's summary.
    pub fn log_summaries(&self, n_histories: u64, elapsed_time: f64) {
        for estimator in &self.estimators {
            estimator.log_summary(n_histories, elapsed_time);
        }
    }
}
