//! Per-bin histograms of committed per-history contributions.

/// A histogram over the per-history contributions committed to one bin.
///
/// Bucket boundaries are fixed at construction. Scores below the first
/// boundary land in the first bucket and scores at or above the last
/// boundary land in the last bucket, so every committed contribution is
/// counted exactly once: the sum of all bucket counts equals the number of
/// histories that committed a contribution to the bin.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleMomentHistogram {
    boundaries: Vec<f64>,
    counts: Vec<u64>,
}

/// Default bucket edges: log-spaced decades from 1e-30 to 1e30, two
/// buckets per decade.
fn default_boundaries() -> Vec<f64> {
    let mut edges = Vec::with_capacity(121);
    for i in 0..=120 {
        edges.push(10.0_f64.powf(-30.0 + 0.5 * i as f64));
    }
    edges
}

impl SampleMomentHistogram {
    /// Creates a histogram with the default log-spaced boundaries.
    pub fn new() -> Self {
        Self::with_boundaries(default_boundaries())
    }

    /// Creates a histogram with custom boundaries.
    ///
    /// Boundaries must be strictly increasing with at least two edges.
    pub fn with_boundaries(boundaries: Vec<f64>) -> Self {
        debug_assert!(boundaries.len() >= 2);
        debug_assert!(boundaries.windows(2).all(|w| w[0] < w[1]));

        let buckets = boundaries.len() - 1;
        Self {
            boundaries,
            counts: vec![0; buckets],
        }
    }

    /// Bucket boundaries.
    #[inline]
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Per-bucket counts.
    #[inline]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Total number of recorded samples.
    #[inline]
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Records one committed per-history contribution.
    ///
    /// Out-of-range scores saturate into the end buckets.
    pub fn add_sample(&mut self, score: f64) {
        let bucket = match self
            .boundaries
            .partition_point(|&edge| edge <= score)
        {
            0 => 0,
            p => (p - 1).min(self.counts.len() - 1),
        };
        self.counts[bucket] += 1;
    }

    /// Adds another histogram's counts bucket-wise.
    ///
    /// Both histograms must share the same boundaries.
    pub fn merge(&mut self, other: &SampleMomentHistogram) {
        debug_assert_eq!(self.boundaries, other.boundaries);
        for (a, b) in self.counts.iter_mut().zip(other.counts.iter()) {
            *a += *b;
        }
    }

    /// Overwrites the counts from a flat buffer, returning the consumed
    /// length. The inverse of [`extend_flat`](Self::extend_flat).
    pub fn absorb_flat(&mut self, buffer: &[u64]) -> usize {
        debug_assert!(buffer.len() >= self.counts.len());
        let len = self.counts.len();
        self.counts.copy_from_slice(&buffer[..len]);
        len
    }

    /// Appends the counts to a flat reduction buffer.
    pub fn extend_flat(&self, buffer: &mut Vec<u64>) {
        buffer.extend_from_slice(&self.counts);
    }

    /// Zeroes every bucket.
    pub fn reset(&mut self) {
        for c in self.counts.iter_mut() {
            *c = 0;
        }
    }
}

impl Default for SampleMomentHistogram {
    fn default() -> Self {
        Self::new()
    }
}
