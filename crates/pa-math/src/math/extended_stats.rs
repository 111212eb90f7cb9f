//! Extended descriptive statistics (count, mean, σ, min, max).
//!
//! The accumulator is mergeable so that partial results computed per shard or
//! per page can be combined without revisiting samples. Variance is the
//! population variance, matching what document-store `extended_stats`
//! aggregations report.
//!
//! Mean and spread are tracked with Welford's update (and Chan's pairwise
//! combination in [`ExtendedStats::merge`]), so a small spread around a
//! large offset survives in full precision.

use serde::Serialize;

/// Running extended statistics over a sample set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExtendedStats {
    pub count: u64,
    mean: f64,
    /// Sum of squared deviations from the running mean.
    m2: f64,
    /// `+inf` while empty.
    pub min: f64,
    /// `-inf` while empty.
    pub max: f64,
}

impl Default for ExtendedStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl ExtendedStats {
    /// Statistics over a slice of samples. Non-finite samples are ignored.
    pub fn from_samples(samples: &[f64]) -> Self {
        let mut stats = Self::default();
        for &value in samples {
            stats.push(value);
        }
        stats
    }

    /// Add one sample. Non-finite values are ignored.
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Fold another accumulator into this one.
    pub fn merge(&mut self, other: &ExtendedStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let (na, nb) = (self.count as f64, other.count as f64);
        let n = na + nb;
        let delta = other.mean - self.mean;
        self.mean += delta * nb / n;
        self.m2 += other.m2 + delta * delta * na * nb / n;
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Sum of all samples.
    pub fn sum(&self) -> f64 {
        self.mean * self.count as f64
    }

    /// Arithmetic mean, 0.0 when empty.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance, 0.0 when empty.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.m2 / self.count as f64).max(0.0)
    }

    /// Population standard deviation, 0.0 when empty.
    pub fn std_deviation(&self) -> f64 {
        // Constant samples must read as exactly zero spread, not rounding noise.
        if self.count == 0 || self.min == self.max {
            return 0.0;
        }
        self.variance().sqrt()
    }

    /// `(mean - k·σ, mean + k·σ)`.
    pub fn std_deviation_bounds(&self, multiplier: f64) -> (f64, f64) {
        let mean = self.mean();
        let spread = multiplier * self.std_deviation();
        (mean - spread, mean + spread)
    }

    /// Minimum, or `None` when empty.
    pub fn min_value(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    /// Maximum, or `None` when empty.
    pub fn max_value(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }
}
