//! The parallel particle simulation manager.
//!
//! The manager drives histories through the collaborators: for each
//! history it seeds a deterministic random stream, samples the source,
//! drains the banks through the track loop, commits the estimator
//! contributions, and counts the history against the completion criterion.
//! Histories are distributed over a fixed rayon pool; because every random
//! draw of a history comes from its own stream, results are identical for
//! any thread count.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

use transport_core::{Communicator, CommunicatorError, HistoryRng, ParticleBank, ParticleState};
use transport_event::{CompletionCriterion, EventHandler};

use crate::collision::CollisionHandler;
use crate::controller::SimulationController;
use crate::geometry::GeometryNavigator;
use crate::properties::SimulationProperties;
use crate::source::ParticleSource;

/// Manager construction or reduction failure.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("failed to build the worker thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Communicator(#[from] CommunicatorError),
}

/// Outcome of a completed (or cooperatively ended) run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunReport {
    /// Histories committed by this run.
    pub histories_completed: u64,
    /// Wall time of this run.
    pub wall_time: Duration,
}

/// Orchestrates parallel particle history simulation.
pub struct ParticleSimulationManager {
    properties: SimulationProperties,
    source: Arc<dyn ParticleSource>,
    collision: Arc<dyn CollisionHandler>,
    geometry: Arc<dyn GeometryNavigator>,
    event_handler: EventHandler,
    criterion: Arc<CompletionCriterion>,
    pool: rayon::ThreadPool,
    end_requested: Arc<AtomicBool>,
    completed: Arc<AtomicU64>,
    lost_particles: AtomicU64,
    status_mutex: Arc<Mutex<()>>,
    next_snapshot: Mutex<u64>,
    sampling_time: Mutex<Duration>,
}

impl ParticleSimulationManager {
    /// Assembles a manager and its worker pool.
    ///
    /// Thread support is enabled on the event handler and the source for
    /// the configured thread count.
    pub fn new(
        properties: SimulationProperties,
        source: Arc<dyn ParticleSource>,
        collision: Arc<dyn CollisionHandler>,
        geometry: Arc<dyn GeometryNavigator>,
        event_handler: EventHandler,
        criterion: CompletionCriterion,
    ) -> Result<Self, ManagerError> {
        let n_threads = properties.number_of_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()?;

        event_handler.enable_thread_support(n_threads);
        source.enable_thread_support(n_threads);

        Ok(Self {
            properties,
            source,
            collision,
            geometry,
            event_handler,
            criterion: Arc::new(criterion),
            pool,
            end_requested: Arc::new(AtomicBool::new(false)),
            completed: Arc::new(AtomicU64::new(0)),
            lost_particles: AtomicU64::new(0),
            status_mutex: Arc::new(Mutex::new(())),
            next_snapshot: Mutex::new(0),
            sampling_time: Mutex::new(Duration::ZERO),
        })
    }

    /// The run properties.
    #[inline]
    pub fn properties(&self) -> &SimulationProperties {
        &self.properties
    }

    /// The event handler and its estimators.
    #[inline]
    pub fn event_handler(&self) -> &EventHandler {
        &self.event_handler
    }

    /// Histories committed so far.
    pub fn completed_histories(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Particles lost to geometry or source failures so far.
    pub fn lost_particles(&self) -> u64 {
        self.lost_particles.load(Ordering::SeqCst)
    }

    /// Accumulated sampling wall time across runs.
    pub fn sampling_time(&self) -> Duration {
        match self.sampling_time.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Returns a cloneable control handle for status/end requests.
    pub fn controller(&self) -> SimulationController {
        SimulationController::new(
            Arc::clone(&self.end_requested),
            Arc::clone(&self.completed),
            Arc::clone(&self.criterion),
            Arc::clone(&self.status_mutex),
        )
    }

    /// Runs the configured number of histories.
    ///
    /// Ends early when the completion criterion is satisfied or an end is
    /// requested through a controller. Per-history failures (lost source or
    /// geometry particles) are logged and never abort the run.
    pub fn run(&self) -> Result<RunReport, ManagerError> {
        let start = Instant::now();
        let already_completed = self.completed_histories();

        info!(
            histories = self.properties.number_of_histories(),
            threads = self.properties.number_of_threads(),
            seed = self.properties.base_seed(),
            "starting simulation"
        );

        if let Some(period) = self.properties.snapshot_period() {
            let mut next = match self.next_snapshot.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *next = already_completed + period;
        }

        self.criterion.start();
        self.run_batch(0, self.properties.number_of_histories(), start);
        self.criterion.stop();

        let wall_time = start.elapsed();
        {
            let mut sampling_time = match self.sampling_time.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *sampling_time += wall_time;
        }

        let report = RunReport {
            histories_completed: self.completed_histories() - already_completed,
            wall_time,
        };
        info!(
            completed = report.histories_completed,
            lost = self.lost_particles(),
            wall_seconds = report.wall_time.as_secs_f64(),
            "simulation finished"
        );
        Ok(report)
    }

    /// Simulates histories `[start_history, end_history)` on the pool.
    fn run_batch(&self, start_history: u64, end_history: u64, run_start: Instant) {
        self.pool.install(|| {
            (start_history..end_history)
                .into_par_iter()
                .for_each(|history| {
                    if self.end_requested.load(Ordering::Relaxed) {
                        return;
                    }
                    self.simulate_history(history, run_start);
                });
        });
    }

    /// Runs one complete history on the calling worker thread.
    fn simulate_history(&self, history: u64, run_start: Instant) {
        let mut rng = HistoryRng::for_history(self.properties.base_seed(), history);

        let mut source_bank = ParticleBank::new();
        if let Err(err) = self
            .source
            .sample_particle_state(&mut source_bank, history, &mut rng)
        {
            self.lost_particles.fetch_add(1, Ordering::Relaxed);
            warn!(history, error = %err, "lost source particle");
        }

        let mut bank = ParticleBank::new();
        while let Some(mut particle) = source_bank.pop() {
            self.track_particle(&mut particle, &mut bank, &mut rng, true);
        }
        // Secondaries may bank further secondaries; drain until empty.
        while let Some(mut particle) = bank.pop() {
            self.track_particle(&mut particle, &mut bank, &mut rng, false);
        }

        self.event_handler.commit_history_contributions();
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.criterion.commit_history_contribution();

        if let Some(period) = self.properties.snapshot_period() {
            self.maybe_take_snapshots(completed, period, run_start);
        }

        if self.criterion.has_uncommitted_history_contribution()
            && self.criterion.is_simulation_complete()
        {
            self.end_requested.store(true, Ordering::SeqCst);
        }
    }

    /// Takes estimator snapshots once `period` further histories have
    /// committed. Serialized so snapshot counts are strictly increasing.
    fn maybe_take_snapshots(&self, completed: u64, period: u64, run_start: Instant) {
        let mut next = match self.next_snapshot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if completed >= *next {
            self.event_handler
                .take_snapshots(completed, run_start.elapsed().as_secs_f64());
            while *next <= completed {
                *next += period;
            }
        }
    }

    /// Tracks one particle to termination, banking its secondaries.
    fn track_particle(
        &self,
        particle: &mut ParticleState,
        bank: &mut ParticleBank,
        rng: &mut HistoryRng,
        from_source: bool,
    ) {
        if !self
            .properties
            .is_particle_type_active(particle.particle_type())
        {
            particle.set_as_gone();
            return;
        }
        let min_energy = self.properties.min_energy(particle.particle_type());

        // True while the current flight started at a source point or a
        // boundary crossing rather than a collision point.
        let mut from_source_or_boundary = from_source;

        while !particle.is_gone() {
            if particle.energy() < min_energy {
                particle.set_as_gone();
                break;
            }

            let mut optical_path = rng.sample_optical_path_length();

            // Ray trace across cells until the sampled optical path is
            // consumed by a collision or the track leaves the problem.
            loop {
                let hit = match self.geometry.fire_ray(particle) {
                    Ok(hit) => hit,
                    Err(err) => {
                        self.lost_particles.fetch_add(1, Ordering::Relaxed);
                        warn!(history = particle.history_id(), error = %err, "lost particle");
                        particle.set_as_gone();
                        break;
                    }
                };

                let total_cross_section = if self
                    .collision
                    .is_cell_void(particle.cell(), particle.particle_type())
                {
                    0.0
                } else {
                    self.collision.macroscopic_total_cross_section(particle)
                };
                let optical_path_to_boundary = hit.distance * total_cross_section;

                if total_cross_section <= 0.0 || optical_path > optical_path_to_boundary {
                    // The flight reaches the cell boundary.
                    if from_source_or_boundary {
                        self.collision
                            .force_collision(particle, hit.distance, bank, rng);
                        if particle.is_gone() {
                            break;
                        }
                    }
                    self.event_handler.particle_subtrack_ending_in_cell(
                        particle,
                        particle.cell(),
                        hit.distance,
                    );

                    let crossing = match self.geometry.advance_to_boundary(particle) {
                        Ok(crossing) => crossing,
                        Err(err) => {
                            self.lost_particles.fetch_add(1, Ordering::Relaxed);
                            warn!(history = particle.history_id(), error = %err, "lost particle");
                            particle.set_as_gone();
                            break;
                        }
                    };
                    self.event_handler.particle_crossing_surface(
                        particle,
                        crossing.surface,
                        crossing.angle_cosine,
                    );
                    if !crossing.reflected {
                        self.event_handler
                            .particle_entering_cell(particle, particle.cell());
                    }

                    if self.geometry.is_termination_cell(particle.cell()) {
                        particle.set_as_gone();
                        break;
                    }

                    optical_path -= optical_path_to_boundary;
                    from_source_or_boundary = true;
                    continue;
                }

                // The flight ends in a collision inside this cell.
                let distance = optical_path / total_cross_section;
                self.geometry.advance_by_substep(particle, distance);
                self.event_handler.particle_subtrack_ending_in_cell(
                    particle,
                    particle.cell(),
                    distance,
                );
                self.event_handler
                    .particle_colliding_in_cell(particle, total_cross_section);

                particle.increment_collision_count();
                self.collision
                    .collide_with_cell_material(particle, bank, rng);
                from_source_or_boundary = false;
                break;
            }

            if particle.is_gone() {
                break;
            }
            // Variance reduction at the post-collision point, before the
            // next flight.
            self.properties
                .roulette()
                .roulette_particle_weight(particle, rng);
        }
    }

    /// Reduces estimator and criterion data onto the root rank.
    ///
    /// Collective and blocking; every cooperating process must call.
    pub fn reduce_data(
        &self,
        comm: &dyn Communicator,
        root: usize,
    ) -> Result<(), ManagerError> {
        comm.barrier();
        self.event_handler.reduce_data(comm, root)?;
        self.criterion.reduce_data(comm, root)?;

        let mut counts = [
            self.completed.load(Ordering::SeqCst),
            self.lost_particles.load(Ordering::SeqCst),
        ];
        comm.reduce_sum_u64(&mut counts, root)?;
        self.completed.store(counts[0], Ordering::SeqCst);
        self.lost_particles.store(counts[1], Ordering::SeqCst);
        Ok(())
    }

    /// Writes a run summary. No side effects.
    pub fn print_simulation_summary(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "histories completed: {}", self.completed_histories())?;
        writeln!(w, "lost particles: {}", self.lost_particles())?;
        writeln!(
            w,
            "sampling time: {:.3}s",
            self.sampling_time().as_secs_f64()
        )?;
        self.criterion.print_summary(w)
    }

    /// Logs the run summary, the criterion progress, and every estimator's
    /// grand totals.
    pub fn log_simulation_summary(&self) {
        info!(
            completed = self.completed_histories(),
            lost = self.lost_particles(),
            sampling_seconds = self.sampling_time().as_secs_f64(),
            "simulation summary"
        );
        self.criterion.log_summary();
        self.source.log_summary();
        self.event_handler.log_summaries(
            self.completed_histories(),
            self.sampling_time().as_secs_f64(),
        );
    }
}
