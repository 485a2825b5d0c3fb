//! Raw sample moments and their processed statistics.
//!
//! Every estimator bin keeps the first four raw moments of the per-history
//! contribution: Σx, Σx², Σx³ and Σx⁴. From these plus the history count
//! the processed quantities are derived — mean, relative error, variance of
//! the variance, and figure of merit. Moments are additive: merging two
//! accumulators that tallied disjoint history sets is element-wise
//! summation of all four sums.

/// The first four raw moment sums of a scored quantity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FourMoments {
    /// Σ x.
    pub first: f64,
    /// Σ x².
    pub second: f64,
    /// Σ x³.
    pub third: f64,
    /// Σ x⁴.
    pub fourth: f64,
}

impl FourMoments {
    /// Adds one per-history sample to the running sums.
    #[inline]
    pub fn add_sample(&mut self, score: f64) {
        let square = score * score;
        self.first += score;
        self.second += square;
        self.third += square * score;
        self.fourth += square * square;
    }

    /// Element-wise sum with another accumulator (moment additivity).
    #[inline]
    pub fn merge(&mut self, other: &FourMoments) {
        self.first += other.first;
        self.second += other.second;
        self.third += other.third;
        self.fourth += other.fourth;
    }

    /// Zeroes all four sums.
    #[inline]
    pub fn zero(&mut self) {
        *self = FourMoments::default();
    }
}

/// A flat collection of per-bin moment accumulators.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MomentCollection {
    moments: Vec<FourMoments>,
}

impl MomentCollection {
    /// Creates a zeroed collection of `len` bins.
    pub fn new(len: usize) -> Self {
        Self {
            moments: vec![FourMoments::default(); len],
        }
    }

    /// Number of bins.
    #[inline]
    pub fn len(&self) -> usize {
        self.moments.len()
    }

    /// Returns true if the collection has no bins.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moments.is_empty()
    }

    /// Returns the moments of one bin.
    #[inline]
    pub fn get(&self, index: usize) -> FourMoments {
        self.moments[index]
    }

    /// Adds one per-history sample into a bin.
    #[inline]
    pub fn add_sample(&mut self, index: usize, score: f64) {
        self.moments[index].add_sample(score);
    }

    /// First-moment sums per bin.
    pub fn first_moments(&self) -> Vec<f64> {
        self.moments.iter().map(|m| m.first).collect()
    }

    /// Second-moment sums per bin.
    pub fn second_moments(&self) -> Vec<f64> {
        self.moments.iter().map(|m| m.second).collect()
    }

    /// Third-moment sums per bin.
    pub fn third_moments(&self) -> Vec<f64> {
        self.moments.iter().map(|m| m.third).collect()
    }

    /// Fourth-moment sums per bin.
    pub fn fourth_moments(&self) -> Vec<f64> {
        self.moments.iter().map(|m| m.fourth).collect()
    }

    /// Element-wise sum with another collection of the same length.
    pub fn merge(&mut self, other: &MomentCollection) {
        debug_assert_eq!(self.len(), other.len());
        for (a, b) in self.moments.iter_mut().zip(other.moments.iter()) {
            a.merge(b);
        }
    }

    /// Zeroes every bin.
    pub fn reset(&mut self) {
        for m in self.moments.iter_mut() {
            m.zero();
        }
    }

    /// Appends all sums to a flat buffer as [m1, m2, m3, m4] per bin.
    ///
    /// Used to assemble reduction buffers; the inverse is
    /// [`absorb_flat`](Self::absorb_flat).
    pub fn extend_flat(&self, buffer: &mut Vec<f64>) {
        for m in &self.moments {
            buffer.extend_from_slice(&[m.first, m.second, m.third, m.fourth]);
        }
    }

    /// Number of flat values this collection contributes to a buffer.
    #[inline]
    pub fn flat_len(&self) -> usize {
        self.moments.len() * 4
    }

    /// Overwrites the sums from a flat buffer written by
    /// [`extend_flat`](Self::extend_flat), returning the consumed length.
    pub fn absorb_flat(&mut self, buffer: &[f64]) -> usize {
        debug_assert!(buffer.len() >= self.flat_len());
        for (i, m) in self.moments.iter_mut().enumerate() {
            m.first = buffer[4 * i];
            m.second = buffer[4 * i + 1];
            m.third = buffer[4 * i + 2];
            m.fourth = buffer[4 * i + 3];
        }
        self.flat_len()
    }
}

/// Processed estimator statistics for one bin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProcessedMoments {
    /// Normalised mean of the per-history contribution.
    pub mean: f64,
    /// Relative error of the mean.
    pub relative_error: f64,
    /// Variance of the variance.
    pub variance_of_variance: f64,
    /// Figure of merit, 1/(RE² · T).
    pub figure_of_merit: f64,
}

/// Converts raw moments to mean, relative error, VOV and FOM.
///
/// Every division-by-zero case yields 0 rather than NaN: a bin with zero
/// scores reports a mean of 0 and a relative error of 0, matching the
/// variance-of-zero convention used throughout the engine.
pub fn process_moments(
    moments: &FourMoments,
    n_histories: u64,
    norm_constant: f64,
    multiplier: f64,
    elapsed_time: f64,
) -> ProcessedMoments {
    if n_histories == 0 || moments.first == 0.0 || norm_constant == 0.0 {
        return ProcessedMoments::default();
    }

    let n = n_histories as f64;
    let m1 = moments.first;
    let m2 = moments.second;
    let m3 = moments.third;
    let m4 = moments.fourth;

    let raw_mean = m1 / n;
    let mean = raw_mean * multiplier / norm_constant;

    let relative_error = (m2 / (m1 * m1) - 1.0 / n).max(0.0).sqrt();

    // Central sums expressed via the raw moments.
    let central_fourth =
        m4 - 4.0 * raw_mean * m3 + 6.0 * raw_mean * raw_mean * m2 - 3.0 * n * raw_mean.powi(4);
    let central_second = m2 - n * raw_mean * raw_mean;

    let variance_of_variance = if central_second > 0.0 {
        (central_fourth / (central_second * central_second) - 1.0 / n).max(0.0)
    } else {
        0.0
    };

    let figure_of_merit = if relative_error > 0.0 && elapsed_time > 0.0 {
        1.0 / (relative_error * relative_error * elapsed_time)
    } else {
        0.0
    };

    ProcessedMoments {
        mean,
        relative_error,
        variance_of_variance,
        figure_of_merit,
    }
}
