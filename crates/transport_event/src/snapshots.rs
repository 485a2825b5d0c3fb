//! Time series of committed moments for convergence diagnostics.

use crate::moments::FourMoments;

/// An ordered series of moment snapshots for one tracked bin.
///
/// Each snapshot records the cumulative history count, cumulative sampling
/// time, and the four committed moment sums at that point. History counts
/// and times must be strictly increasing across successive snapshots.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MomentSnapshots {
    history_counts: Vec<u64>,
    sampling_times: Vec<f64>,
    moments: Vec<FourMoments>,
}

impl MomentSnapshots {
    /// Creates an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots taken so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.history_counts.len()
    }

    /// Returns true if no snapshot has been taken.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.history_counts.is_empty()
    }

    /// Cumulative history counts, one per snapshot.
    #[inline]
    pub fn history_counts(&self) -> &[u64] {
        &self.history_counts
    }

    /// Cumulative sampling times, one per snapshot.
    #[inline]
    pub fn sampling_times(&self) -> &[f64] {
        &self.sampling_times
    }

    /// Moment sums at each snapshot.
    #[inline]
    pub fn moments(&self) -> &[FourMoments] {
        &self.moments
    }

    /// Appends a snapshot of the bin's committed moments.
    pub fn take_snapshot(&mut self, n_histories: u64, sampling_time: f64, moments: FourMoments) {
        debug_assert!(
            self.history_counts
                .last()
                .map_or(true, |&last| n_histories > last),
            "snapshot history counts must be strictly increasing"
        );
        debug_assert!(
            self.sampling_times
                .last()
                .map_or(true, |&last| sampling_time > last),
            "snapshot times must be strictly increasing"
        );

        self.history_counts.push(n_histories);
        self.sampling_times.push(sampling_time);
        self.moments.push(moments);
    }

    /// Number of flat f64 values this series contributes to a buffer.
    #[inline]
    pub fn flat_f64_len(&self) -> usize {
        self.moments.len() * 4 + self.sampling_times.len()
    }

    /// Number of flat u64 values this series contributes to a buffer.
    #[inline]
    pub fn flat_u64_len(&self) -> usize {
        self.history_counts.len()
    }

    /// Appends the series to flat reduction buffers.
    pub fn extend_flat(&self, f64_buffer: &mut Vec<f64>, u64_buffer: &mut Vec<u64>) {
        for m in &self.moments {
            f64_buffer.extend_from_slice(&[m.first, m.second, m.third, m.fourth]);
        }
        f64_buffer.extend_from_slice(&self.sampling_times);
        u64_buffer.extend_from_slice(&self.history_counts);
    }

    /// Overwrites the series from flat buffers written by
    /// [`extend_flat`](Self::extend_flat); returns consumed lengths.
    pub fn absorb_flat(&mut self, f64_buffer: &[f64], u64_buffer: &[u64]) -> (usize, usize) {
        let n = self.len();
        debug_assert!(f64_buffer.len() >= self.flat_f64_len());
        debug_assert!(u64_buffer.len() >= n);

        for (i, m) in self.moments.iter_mut().enumerate() {
            m.first = f64_buffer[4 * i];
            m.second = f64_buffer[4 * i + 1];
            m.third = f64_buffer[4 * i + 2];
            m.fourth = f64_buffer[4 * i + 3];
        }
        self.sampling_times
            .copy_from_slice(&f64_buffer[4 * n..5 * n]);
        self.history_counts.copy_from_slice(&u64_buffer[..n]);

        (self.flat_f64_len(), n)
    }

    /// Discards all snapshots.
    pub fn reset(&mut self) {
        self.history_counts.clear();
        self.sampling_times.clear();
        self.moments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moments_of(x: f64) -> FourMoments {
        let mut m = FourMoments::default();
        m.add_sample(x);
        m
    }

    #[test]
    fn test_snapshots_record_in_order() {
        let mut s = MomentSnapshots::new();
        s.take_snapshot(10, 1.0, moments_of(2.0));
        s.take_snapshot(20, 2.5, moments_of(3.0));

        assert_eq!(s.len(), 2);
        assert_eq!(s.history_counts(), &[10, 20]);
        assert_eq!(s.sampling_times(), &[1.0, 2.5]);
        assert_eq!(s.moments()[1].first, 3.0);
    }

    #[test]
    fn test_flat_round_trip() {
        let mut a = MomentSnapshots::new();
        a.take_snapshot(5, 0.5, moments_of(1.0));
        a.take_snapshot(10, 1.0, moments_of(4.0));

        let mut f64s = Vec::new();
        let mut u64s = Vec::new();
        a.extend_flat(&mut f64s, &mut u64s);

        let mut b = MomentSnapshots::new();
        b.take_snapshot(1, 0.1, FourMoments::default());
        b.take_snapshot(2, 0.2, FourMoments::default());
        let (nf, nu) = b.absorb_flat(&f64s, &u64s);

        assert_eq!(nf, f64s.len());
        assert_eq!(nu, u64s.len());
        assert_eq!(a, b);
    }

    #[test]
    fn test_reset_discards_series() {
        let mut s = MomentSnapshots::new();
        s.take_snapshot(10, 1.0, moments_of(2.0));
        s.reset();
        assert!(s.is_empty());
    }
}
