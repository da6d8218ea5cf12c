//! Per-group statistics
//!
//! Mean and sample variance are accumulated online with Welford's algorithm.
//! Order statistics (median, percentiles, top-fraction mean) need every value,
//! so the accumulator also keeps them.

use std::cmp::Ordering;

/// Running statistics over a stream of values
#[derive(Debug, Clone)]
pub struct ValueStats {
    count: usize,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    values: Vec<f64>,
}

impl ValueStats {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            values: Vec::new(),
        }
    }

    /// Add one value
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;

        self.values.push(value);
    }

    /// Number of values seen
    pub fn count(&self) -> usize {
        self.count
    }

    /// Compute the summary, `None` when no value was added
    pub fn summarize(&self) -> Option<Summary> {
        if self.count == 0 {
            return None;
        }

        let mut sorted = self.values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        Some(Summary {
            count: self.count,
            mean: self.mean,
            median: percentile_sorted(&sorted, 50.0),
            min: self.min,
            max: self.max,
            std: self.std_sample(),
            p75: percentile_sorted(&sorted, 75.0),
            p95: percentile_sorted(&sorted, 95.0),
            mean_top10: mean_top_fraction_sorted(&sorted, 0.10),
        })
    }

    /// Sample standard deviation (n - 1), NaN below two values
    fn std_sample(&self) -> f64 {
        if self.count < 2 {
            return f64::NAN;
        }
        (self.m2 / (self.count - 1) as f64).sqrt()
    }
}

impl Default for ValueStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Final statistics for one group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Number of values
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// 50th percentile
    pub median: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Sample standard deviation, NaN when `count < 2`
    pub std: f64,
    /// 75th percentile
    pub p75: f64,
    /// 95th percentile
    pub p95: f64,
    /// Mean of the top 10% of values (at least one)
    pub mean_top10: f64,
}

/// Linear-interpolated percentile of ascending values
///
/// The fractional index is `p / 100 * (n - 1)`; the result interpolates
/// between the order statistics at its floor and ceiling. NaN when empty.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Mean of the largest `max(1, ceil(fraction * n))` ascending values
pub fn mean_top_fraction_sorted(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }

    let take = ((fraction * sorted.len() as f64).ceil() as usize).clamp(1, sorted.len());
    let top = &sorted[sorted.len() - take..];
    top.iter().sum::<f64>() / take as f64
}
