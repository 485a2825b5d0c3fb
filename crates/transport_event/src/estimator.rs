//! The thread-safe, distributable statistical estimator.
//!
//! An estimator tallies one physical quantity (a flux or a current) over a
//! set of geometric entities, a phase-space discretization, and one or more
//! response functions. Scoring is two-phase: worker threads accumulate
//! *uncommitted* per-history contributions in private trackers, and
//! [`Estimator::commit_history_contribution`] folds the finished history
//! into the shared committed store as a single sample per touched bin.
//! Only committed data is ever read, reduced, or reported.
//!
//! Flat bin layout is response-major:
//! `flat = response_index * n_phase_bins + phase_bin`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;
use tracing::info;
use transport_core::{Communicator, CommunicatorError, EntityId, ParticleType};

use crate::discretization::{ObservedState, PhaseSpaceDiscretization};
use crate::histogram::SampleMomentHistogram;
use crate::moments::{process_moments, MomentCollection, ProcessedMoments};
use crate::response::{ParticleResponse, UnitResponse};
use crate::snapshots::MomentSnapshots;

/// What an estimator measures and therefore which events feed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EstimatorKind {
    /// Cell flux estimated from collisions: score = weight / σ_t.
    CellCollisionFlux,
    /// Cell flux estimated from track lengths: score = weight · distance.
    CellTrackLengthFlux,
    /// Surface current: score = weight at each crossing.
    SurfaceCurrent,
}

/// Estimator construction failure.
#[derive(Debug, Error, PartialEq)]
pub enum EstimatorConfigError {
    #[error("estimator {id} has no assigned entities")]
    NoEntities { id: u32 },

    #[error("estimator {id}: entity {entity} assigned twice")]
    DuplicateEntity { id: u32, entity: EntityId },

    #[error(
        "estimator {id}: entity {entity} normalization constant must be positive (got {norm})"
    )]
    InvalidNormalization { id: u32, entity: EntityId, norm: f64 },

    #[error("estimator {id}: multiplier must be positive (got {multiplier})")]
    InvalidMultiplier { id: u32, multiplier: f64 },
}

/// Per-history scores pending commit: entity -> flat bin -> summed score.
type UpdateTracker = BTreeMap<EntityId, BTreeMap<usize, f64>>;

/// The shared committed tally store. One mutex guards the whole fold so a
/// history commit is atomic with respect to snapshots and reductions.
#[derive(Debug)]
struct CommittedData {
    /// Per-entity flat-bin moments.
    entity_bins: BTreeMap<EntityId, MomentCollection>,
    /// Per-entity per-response totals (summed over phase bins).
    entity_totals: BTreeMap<EntityId, MomentCollection>,
    /// Entity-summed flat-bin moments.
    total_bins: MomentCollection,
    /// Entity-summed per-response grand totals.
    grand_totals: MomentCollection,
    /// Histograms of committed contributions, one per total flat bin.
    total_bin_histograms: Vec<SampleMomentHistogram>,
    /// Opt-in histograms on entity flat bins.
    entity_bin_histograms: Option<BTreeMap<EntityId, Vec<SampleMomentHistogram>>>,
    /// Snapshot series, one per total flat bin.
    total_bin_snapshots: Vec<MomentSnapshots>,
    /// Opt-in snapshot series on entity flat bins.
    entity_bin_snapshots: Option<BTreeMap<EntityId, Vec<MomentSnapshots>>>,
}

/// Builder for [`Estimator`], validated by [`build`](EstimatorBuilder::build).
pub struct EstimatorBuilder {
    id: u32,
    kind: EstimatorKind,
    multiplier: f64,
    entities: Vec<(EntityId, f64)>,
    discretization: PhaseSpaceDiscretization,
    responses: Vec<Arc<dyn ParticleResponse>>,
    particle_types: Option<Vec<ParticleType>>,
}

impl EstimatorBuilder {
    /// Sets the constant multiplier applied to processed means.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Assigns an entity with its normalization constant (volume or area).
    pub fn add_entity(mut self, entity: EntityId, norm_constant: f64) -> Self {
        self.entities.push((entity, norm_constant));
        self
    }

    /// Sets the phase-space discretization.
    pub fn discretization(mut self, discretization: PhaseSpaceDiscretization) -> Self {
        self.discretization = discretization;
        self
    }

    /// Adds a response function. Without any, a unit response is used.
    pub fn add_response(mut self, response: Arc<dyn ParticleResponse>) -> Self {
        self.responses.push(response);
        self
    }

    /// Restricts the contributing particle types (default: all types).
    pub fn particle_types(mut self, types: &[ParticleType]) -> Self {
        self.particle_types = Some(types.to_vec());
        self
    }

    /// Validates the configuration and constructs the estimator.
    pub fn build(self) -> Result<Estimator, EstimatorConfigError> {
        if self.entities.is_empty() {
            return Err(EstimatorConfigError::NoEntities { id: self.id });
        }
        if self.multiplier <= 0.0 {
            return Err(EstimatorConfigError::InvalidMultiplier {
                id: self.id,
                multiplier: self.multiplier,
            });
        }

        let mut entity_norms = BTreeMap::new();
        for (entity, norm) in &self.entities {
            if *norm <= 0.0 {
                return Err(EstimatorConfigError::InvalidNormalization {
                    id: self.id,
                    entity: *entity,
                    norm: *norm,
                });
            }
            if entity_norms.insert(*entity, *norm).is_some() {
                return Err(EstimatorConfigError::DuplicateEntity {
                    id: self.id,
                    entity: *entity,
                });
            }
        }
        let total_norm: f64 = entity_norms.values().sum();

        let responses = if self.responses.is_empty() {
            vec![Arc::new(UnitResponse) as Arc<dyn ParticleResponse>]
        } else {
            self.responses
        };

        let mut type_mask = [false; transport_core::PARTICLE_TYPE_COUNT];
        match &self.particle_types {
            Some(types) => {
                for t in types {
                    type_mask[t.index()] = true;
                }
            }
            None => type_mask = [true; transport_core::PARTICLE_TYPE_COUNT],
        }

        let n_phase_bins = self.discretization.bin_count();
        let n_flat_bins = responses.len() * n_phase_bins;
        let n_responses = responses.len();

        let committed = CommittedData {
            entity_bins: entity_norms
                .keys()
                .map(|&e| (e, MomentCollection::new(n_flat_bins)))
                .collect(),
            entity_totals: entity_norms
                .keys()
                .map(|&e| (e, MomentCollection::new(n_responses)))
                .collect(),
            total_bins: MomentCollection::new(n_flat_bins),
            grand_totals: MomentCollection::new(n_responses),
            total_bin_histograms: vec![SampleMomentHistogram::new(); n_flat_bins],
            entity_bin_histograms: None,
            total_bin_snapshots: vec![MomentSnapshots::new(); n_flat_bins],
            entity_bin_snapshots: None,
        };

        Ok(Estimator {
            id: self.id,
            kind: self.kind,
            multiplier: self.multiplier,
            discretization: self.discretization,
            responses,
            type_mask,
            entity_norms,
            total_norm,
            committed: Mutex::new(committed),
            trackers: RwLock::new(vec![Mutex::new(UpdateTracker::new())]),
        })
    }
}

/// A thread-safe, distributable tally over entities, phase-space bins and
/// response functions.
pub struct Estimator {
    id: u32,
    kind: EstimatorKind,
    multiplier: f64,
    discretization: PhaseSpaceDiscretization,
    responses: Vec<Arc<dyn ParticleResponse>>,
    type_mask: [bool; transport_core::PARTICLE_TYPE_COUNT],
    entity_norms: BTreeMap<EntityId, f64>,
    total_norm: f64,
    committed: Mutex<CommittedData>,
    trackers: RwLock<Vec<Mutex<UpdateTracker>>>,
}

impl Estimator {
    /// Starts building an estimator of the given kind.
    pub fn builder(id: u32, kind: EstimatorKind) -> EstimatorBuilder {
        EstimatorBuilder {
            id,
            kind,
            multiplier: 1.0,
            entities: Vec::new(),
            discretization: PhaseSpaceDiscretization::new(),
            responses: Vec::new(),
            particle_types: None,
        }
    }

    /// The estimator id.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// What this estimator measures.
    #[inline]
    pub fn kind(&self) -> EstimatorKind {
        self.kind
    }

    /// The constant multiplier applied to processed means.
    #[inline]
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Number of phase-space bins (excluding the response dimension).
    #[inline]
    pub fn n_phase_bins(&self) -> usize {
        self.discretization.bin_count()
    }

    /// Number of response functions.
    #[inline]
    pub fn n_responses(&self) -> usize {
        self.responses.len()
    }

    /// Number of flat bins (responses × phase bins).
    #[inline]
    pub fn n_flat_bins(&self) -> usize {
        self.n_responses() * self.n_phase_bins()
    }

    /// Assigned entity ids, in ascending order.
    pub fn entities(&self) -> Vec<EntityId> {
        self.entity_norms.keys().copied().collect()
    }

    /// Returns true if the entity is assigned to this estimator.
    #[inline]
    pub fn is_entity_assigned(&self, entity: EntityId) -> bool {
        self.entity_norms.contains_key(&entity)
    }

    /// Returns true if the particle type contributes to this estimator.
    #[inline]
    pub fn is_particle_type_assigned(&self, particle_type: ParticleType) -> bool {
        self.type_mask[particle_type.index()]
    }

    /// Normalization constant of an entity.
    pub fn entity_norm_constant(&self, entity: EntityId) -> Option<f64> {
        self.entity_norms.get(&entity).copied()
    }

    /// Sum of all entity normalization constants.
    #[inline]
    pub fn total_norm_constant(&self) -> f64 {
        self.total_norm
    }

    // ========================================================================
    // Threading
    // ========================================================================

    /// Allocates one uncommitted tracker per worker thread.
    ///
    /// Must be called before concurrent scoring begins; existing uncommitted
    /// contributions are discarded.
    pub fn enable_thread_support(&self, n_threads: usize) {
        let mut trackers = match self.trackers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *trackers = (0..n_threads.max(1))
            .map(|_| Mutex::new(UpdateTracker::new()))
            .collect();
    }

    fn thread_index(slots: usize) -> usize {
        let index = rayon::current_thread_index().unwrap_or(0);
        debug_assert!(index < slots, "thread support not enabled for this pool");
        index.min(slots - 1)
    }

    // ========================================================================
    // Scoring
    // ========================================================================

    /// Records an uncommitted per-history contribution from the calling
    /// thread.
    ///
    /// Silently ignores contributions for unassigned entities, non-contributing
    /// particle types, and states outside the phase-space discretization.
    /// Response functions are folded in here: one tracker entry per response,
    /// each holding `raw_score · response(particle)`.
    pub fn add_partial_history_contribution(
        &self,
        entity: EntityId,
        observed: &ObservedState<'_>,
        raw_score: f64,
    ) {
        if !self.is_entity_assigned(entity)
            || !self.is_particle_type_assigned(observed.particle.particle_type())
        {
            return;
        }
        let phase_bin = match self.discretization.bin_index_of(observed) {
            Some(bin) => bin,
            None => return,
        };

        let trackers = match self.trackers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let slot = Self::thread_index(trackers.len());
        let mut tracker = match trackers[slot].lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let bins = tracker.entry(entity).or_default();
        let n_phase_bins = self.n_phase_bins();
        for (response_index, response) in self.responses.iter().enumerate() {
            let flat = response_index * n_phase_bins + phase_bin;
            let score = raw_score * response.evaluate(observed.particle);
            *bins.entry(flat).or_insert(0.0) += score;
        }
    }

    /// Returns true if the calling thread holds uncommitted contributions.
    pub fn has_uncommitted_history_contribution(&self) -> bool {
        let trackers = match self.trackers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let slot = Self::thread_index(trackers.len());
        Self::slot_has_uncommitted(&trackers, slot)
    }

    /// Returns true if the given thread slot holds uncommitted
    /// contributions. Out-of-range slots hold nothing.
    pub fn has_uncommitted_history_contribution_for_thread(&self, thread: usize) -> bool {
        let trackers = match self.trackers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        thread < trackers.len() && Self::slot_has_uncommitted(&trackers, thread)
    }

    fn slot_has_uncommitted(trackers: &[Mutex<UpdateTracker>], slot: usize) -> bool {
        let tracker = match trackers[slot].lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        !tracker.is_empty()
    }

    /// Commits the calling thread's per-history contribution.
    ///
    /// Folds the tracker's per-bin summed scores into the committed store as
    /// one sample each, records histogram samples, and clears the tracker.
    /// No-op when the thread has nothing uncommitted.
    pub fn commit_history_contribution(&self) {
        let tracker = {
            let trackers = match self.trackers.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let slot = Self::thread_index(trackers.len());
            let mut tracker = match trackers[slot].lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *tracker)
        };
        if tracker.is_empty() {
            return;
        }

        let n_phase_bins = self.n_phase_bins();
        let n_responses = self.n_responses();

        let mut committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Entity-summed per-flat-bin scores for the total fold.
        let mut total_by_flat: BTreeMap<usize, f64> = BTreeMap::new();

        for (entity, bins) in &tracker {
            let mut entity_response_totals = vec![0.0_f64; n_responses];
            let mut touched = vec![false; n_responses];

            if let Some(collection) = committed.entity_bins.get_mut(entity) {
                for (&flat, &score) in bins {
                    collection.add_sample(flat, score);
                    *total_by_flat.entry(flat).or_insert(0.0) += score;

                    let response_index = flat / n_phase_bins;
                    entity_response_totals[response_index] += score;
                    touched[response_index] = true;
                }
            }
            if let Some(histograms) = committed.entity_bin_histograms.as_mut() {
                if let Some(entity_histograms) = histograms.get_mut(entity) {
                    for (&flat, &score) in bins {
                        entity_histograms[flat].add_sample(score);
                    }
                }
            }
            if let Some(totals) = committed.entity_totals.get_mut(entity) {
                for response_index in 0..n_responses {
                    if touched[response_index] {
                        totals.add_sample(response_index, entity_response_totals[response_index]);
                    }
                }
            }
        }

        let mut grand_response_totals = vec![0.0_f64; n_responses];
        let mut touched = vec![false; n_responses];
        for (&flat, &score) in &total_by_flat {
            committed.total_bins.add_sample(flat, score);
            committed.total_bin_histograms[flat].add_sample(score);

            let response_index = flat / n_phase_bins;
            grand_response_totals[response_index] += score;
            touched[response_index] = true;
        }
        for response_index in 0..n_responses {
            if touched[response_index] {
                committed
                    .grand_totals
                    .add_sample(response_index, grand_response_totals[response_index]);
            }
        }
    }

    // ========================================================================
    // Histograms and snapshots
    // ========================================================================

    /// Opts the entity flat bins into contribution histograms.
    ///
    /// Total bins always carry histograms; call before scoring begins.
    pub fn enable_sample_moment_histograms_on_entity_bins(&self) {
        let n_flat_bins = self.n_flat_bins();
        let mut committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if committed.entity_bin_histograms.is_none() {
            committed.entity_bin_histograms = Some(
                self.entity_norms
                    .keys()
                    .map(|&e| (e, vec![SampleMomentHistogram::new(); n_flat_bins]))
                    .collect(),
            );
        }
    }

    /// Opts the entity flat bins into moment snapshots.
    ///
    /// Total bins always carry snapshot series; call before scoring begins.
    pub fn enable_snapshots_on_entity_bins(&self) {
        let n_flat_bins = self.n_flat_bins();
        let mut committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if committed.entity_bin_snapshots.is_none() {
            committed.entity_bin_snapshots = Some(
                self.entity_norms
                    .keys()
                    .map(|&e| (e, vec![MomentSnapshots::new(); n_flat_bins]))
                    .collect(),
            );
        }
    }

    /// Appends the current committed moments of every tracked bin to its
    /// snapshot series.
    pub fn take_snapshot(&self, n_histories: u64, elapsed_time: f64) {
        let mut committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let committed = &mut *committed;

        for (flat, series) in committed.total_bin_snapshots.iter_mut().enumerate() {
            series.take_snapshot(n_histories, elapsed_time, committed.total_bins.get(flat));
        }
        if let Some(entity_snapshots) = committed.entity_bin_snapshots.as_mut() {
            for (entity, series_list) in entity_snapshots.iter_mut() {
                if let Some(collection) = committed.entity_bins.get(entity) {
                    for (flat, series) in series_list.iter_mut().enumerate() {
                        series.take_snapshot(n_histories, elapsed_time, collection.get(flat));
                    }
                }
            }
        }
    }

    // ========================================================================
    // Reduction and reset
    // ========================================================================

    /// Element-wise sums this estimator's committed data across all ranks
    /// onto the root. Non-root ranks are reset.
    ///
    /// Collective and blocking; every rank must call. Ranks whose snapshot
    /// series lengths differ fail with a snapshot mismatch.
    pub fn reduce_data(
        &self,
        comm: &dyn Communicator,
        root: usize,
    ) -> Result<(), CommunicatorError> {
        if comm.size() == 1 {
            return if root == 0 {
                Ok(())
            } else {
                Err(CommunicatorError::InvalidRoot { root, size: 1 })
            };
        }

        let mut committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let committed = &mut *committed;

        let mut f64_buffer: Vec<f64> = Vec::new();
        let mut u64_buffer: Vec<u64> = Vec::new();

        for collection in committed.entity_bins.values() {
            collection.extend_flat(&mut f64_buffer);
        }
        for collection in committed.entity_totals.values() {
            collection.extend_flat(&mut f64_buffer);
        }
        committed.total_bins.extend_flat(&mut f64_buffer);
        committed.grand_totals.extend_flat(&mut f64_buffer);

        for histogram in &committed.total_bin_histograms {
            histogram.extend_flat(&mut u64_buffer);
        }
        if let Some(histograms) = committed.entity_bin_histograms.as_ref() {
            for entity_histograms in histograms.values() {
                for histogram in entity_histograms {
                    histogram.extend_flat(&mut u64_buffer);
                }
            }
        }

        for series in &committed.total_bin_snapshots {
            series.extend_flat(&mut f64_buffer, &mut u64_buffer);
        }
        if let Some(entity_snapshots) = committed.entity_bin_snapshots.as_ref() {
            for series_list in entity_snapshots.values() {
                for series in series_list {
                    series.extend_flat(&mut f64_buffer, &mut u64_buffer);
                }
            }
        }

        let local_snapshots = committed.total_bin_snapshots.first().map_or(0, |s| s.len());
        let map_mismatch = |err| match err {
            CommunicatorError::LengthMismatch { local, expected } => {
                CommunicatorError::SnapshotMismatch {
                    local: local_snapshots,
                    remote: local_snapshots + expected.abs_diff(local),
                }
            }
            other => other,
        };

        comm.reduce_sum_f64(&mut f64_buffer, root)
            .map_err(map_mismatch)?;
        comm.reduce_sum_u64(&mut u64_buffer, root)
            .map_err(map_mismatch)?;

        // Root absorbs the aggregate; every other rank got zeroed buffers
        // and keeps the reset implied by absorbing them.
        let mut f64_offset = 0;
        let mut u64_offset = 0;

        for collection in committed.entity_bins.values_mut() {
            f64_offset += collection.absorb_flat(&f64_buffer[f64_offset..]);
        }
        for collection in committed.entity_totals.values_mut() {
            f64_offset += collection.absorb_flat(&f64_buffer[f64_offset..]);
        }
        f64_offset += committed.total_bins.absorb_flat(&f64_buffer[f64_offset..]);
        f64_offset += committed.grand_totals.absorb_flat(&f64_buffer[f64_offset..]);

        for histogram in committed.total_bin_histograms.iter_mut() {
            u64_offset += histogram.absorb_flat(&u64_buffer[u64_offset..]);
        }
        if let Some(histograms) = committed.entity_bin_histograms.as_mut() {
            for entity_histograms in histograms.values_mut() {
                for histogram in entity_histograms.iter_mut() {
                    u64_offset += histogram.absorb_flat(&u64_buffer[u64_offset..]);
                }
            }
        }

        for series in committed.total_bin_snapshots.iter_mut() {
            let (nf, nu) = series.absorb_flat(&f64_buffer[f64_offset..], &u64_buffer[u64_offset..]);
            f64_offset += nf;
            u64_offset += nu;
        }
        if let Some(entity_snapshots) = committed.entity_bin_snapshots.as_mut() {
            for series_list in entity_snapshots.values_mut() {
                for series in series_list.iter_mut() {
                    let (nf, nu) =
                        series.absorb_flat(&f64_buffer[f64_offset..], &u64_buffer[u64_offset..]);
                    f64_offset += nf;
                    u64_offset += nu;
                }
            }
        }

        // A non-root rank's snapshot series is now all-zero; discard it so a
        // later snapshot does not extend a zeroed history.
        if comm.rank() != root {
            for series in committed.total_bin_snapshots.iter_mut() {
                series.reset();
            }
            if let Some(entity_snapshots) = committed.entity_bin_snapshots.as_mut() {
                for series_list in entity_snapshots.values_mut() {
                    for series in series_list.iter_mut() {
                        series.reset();
                    }
                }
            }
        }

        Ok(())
    }

    /// Zeroes all committed and uncommitted data.
    pub fn reset_data(&self) {
        {
            let trackers = match self.trackers.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            for slot in trackers.iter() {
                let mut tracker = match slot.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                tracker.clear();
            }
        }

        let mut committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for collection in committed.entity_bins.values_mut() {
            collection.reset();
        }
        for collection in committed.entity_totals.values_mut() {
            collection.reset();
        }
        committed.total_bins.reset();
        committed.grand_totals.reset();
        for histogram in committed.total_bin_histograms.iter_mut() {
            histogram.reset();
        }
        if let Some(histograms) = committed.entity_bin_histograms.as_mut() {
            for entity_histograms in histograms.values_mut() {
                for histogram in entity_histograms.iter_mut() {
                    histogram.reset();
                }
            }
        }
        for series in committed.total_bin_snapshots.iter_mut() {
            series.reset();
        }
        if let Some(entity_snapshots) = committed.entity_bin_snapshots.as_mut() {
            for series_list in entity_snapshots.values_mut() {
                for series in series_list.iter_mut() {
                    series.reset();
                }
            }
        }
    }

    // ========================================================================
    // Raw accessors
    // ========================================================================

    /// Committed moments of the entity-summed flat bins.
    pub fn total_bin_moments(&self) -> MomentCollection {
        let committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        committed.total_bins.clone()
    }

    /// Committed per-response grand totals.
    pub fn grand_total_moments(&self) -> MomentCollection {
        let committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        committed.grand_totals.clone()
    }

    /// Committed flat-bin moments of one entity.
    pub fn entity_bin_moments(&self, entity: EntityId) -> Option<MomentCollection> {
        let committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        committed.entity_bins.get(&entity).cloned()
    }

    /// Committed per-response totals of one entity.
    pub fn entity_total_moments(&self, entity: EntityId) -> Option<MomentCollection> {
        let committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        committed.entity_totals.get(&entity).cloned()
    }

    /// Contribution histogram of one total flat bin.
    pub fn total_bin_histogram(&self, flat_bin: usize) -> SampleMomentHistogram {
        let committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        committed.total_bin_histograms[flat_bin].clone()
    }

    /// Contribution histogram of one entity flat bin, when enabled.
    pub fn entity_bin_histogram(
        &self,
        entity: EntityId,
        flat_bin: usize,
    ) -> Option<SampleMomentHistogram> {
        let committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        committed
            .entity_bin_histograms
            .as_ref()
            .and_then(|h| h.get(&entity))
            .map(|bins| bins[flat_bin].clone())
    }

    /// Snapshot series of one total flat bin.
    pub fn total_bin_snapshots(&self, flat_bin: usize) -> MomentSnapshots {
        let committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        committed.total_bin_snapshots[flat_bin].clone()
    }

    /// Snapshot series of one entity flat bin, when enabled.
    pub fn entity_bin_snapshots(
        &self,
        entity: EntityId,
        flat_bin: usize,
    ) -> Option<MomentSnapshots> {
        let committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        committed
            .entity_bin_snapshots
            .as_ref()
            .and_then(|s| s.get(&entity))
            .map(|bins| bins[flat_bin].clone())
    }

    // ========================================================================
    // Processed accessors
    // ========================================================================

    /// Processed statistics of the entity-summed flat bins.
    pub fn total_bin_processed_data(
        &self,
        n_histories: u64,
        elapsed_time: f64,
    ) -> Vec<ProcessedMoments> {
        self.process_collection(&self.total_bin_moments(), self.total_norm, n_histories, elapsed_time)
    }

    /// Processed per-response grand totals.
    pub fn total_processed_data(
        &self,
        n_histories: u64,
        elapsed_time: f64,
    ) -> Vec<ProcessedMoments> {
        self.process_collection(&self.grand_total_moments(), self.total_norm, n_histories, elapsed_time)
    }

    /// Processed flat-bin statistics of one entity.
    pub fn entity_bin_processed_data(
        &self,
        entity: EntityId,
        n_histories: u64,
        elapsed_time: f64,
    ) -> Option<Vec<ProcessedMoments>> {
        let norm = self.entity_norm_constant(entity)?;
        let moments = self.entity_bin_moments(entity)?;
        Some(self.process_collection(&moments, norm, n_histories, elapsed_time))
    }

    /// Processed per-response totals of one entity.
    pub fn entity_total_processed_data(
        &self,
        entity: EntityId,
        n_histories: u64,
        elapsed_time: f64,
    ) -> Option<Vec<ProcessedMoments>> {
        let norm = self.entity_norm_constant(entity)?;
        let moments = self.entity_total_moments(entity)?;
        Some(self.process_collection(&moments, norm, n_histories, elapsed_time))
    }

    fn process_collection(
        &self,
        moments: &MomentCollection,
        norm_constant: f64,
        n_histories: u64,
        elapsed_time: f64,
    ) -> Vec<ProcessedMoments> {
        (0..moments.len())
            .map(|i| {
                process_moments(
                    &moments.get(i),
                    n_histories,
                    norm_constant,
                    self.multiplier,
                    elapsed_time,
                )
            })
            .collect()
    }

    /// Logs the per-response grand totals.
    pub fn log_summary(&self, n_histories: u64, elapsed_time: f64) {
        let totals = self.total_processed_data(n_histories, elapsed_time);
        for (response_index, processed) in totals.iter().enumerate() {
            info!(
                estimator = self.id,
                response = %self.responses[response_index].name(),
                mean = processed.mean,
                relative_error = processed.relative_error,
                variance_of_variance = processed.variance_of_variance,
                figure_of_merit = processed.figure_of_merit,
                "estimator summary"
            );
        }
    }
}
