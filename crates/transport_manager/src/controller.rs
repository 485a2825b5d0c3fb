//! Interactive control handle for a running simulation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;
use transport_event::CompletionCriterion;

/// A cloneable handle onto a running simulation.
///
/// The handle is safe to use from any thread, typically the one reading
/// interactive commands while the worker pool runs histories. Status
/// reports are serialized through one mutex so concurrent requests never
/// interleave their output.
#[derive(Clone)]
pub struct SimulationController {
    end_requested: Arc<AtomicBool>,
    completed: Arc<AtomicU64>,
    criterion: Arc<CompletionCriterion>,
    status_mutex: Arc<Mutex<()>>,
}

impl SimulationController {
    pub(crate) fn new(
        end_requested: Arc<AtomicBool>,
        completed: Arc<AtomicU64>,
        criterion: Arc<CompletionCriterion>,
        status_mutex: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            end_requested,
            completed,
            criterion,
            status_mutex,
        }
    }

    /// Logs a progress report.
    pub fn request_status(&self) {
        let _guard = match self.status_mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        info!(
            completed = self.completed.load(Ordering::SeqCst),
            "simulation status"
        );
        self.criterion.log_summary();
    }

    /// Requests a cooperative end: in-flight histories finish, queued ones
    /// are skipped.
    pub fn request_end(&self) {
        self.end_requested.store(true, Ordering::SeqCst);
        info!("simulation end requested; finishing in-flight histories");
    }

    /// Returns true once an end has been requested (by a controller or by
    /// the completion criterion).
    pub fn is_end_requested(&self) -> bool {
        self.end_requested.load(Ordering::SeqCst)
    }

    /// Histories committed so far.
    pub fn completed_histories(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}
