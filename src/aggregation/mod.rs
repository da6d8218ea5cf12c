//! Aggregation of flattened measurements into per-series indicators
//!
//! ```text
//! [FlattenedRecord] ──► RowFilter ──► group by name ──► [IndicatorRow]
//!                                       (first seen)
//! ```
//!
//! Statistics per group: mean, median, min, max, sample standard deviation,
//! count, p75 and p95 (linear interpolation), and the mean of the top tenth
//! of values.
//!
//! # Example
//!
//! ```rust,ignore
//! use facility_insights::aggregation::{Aggregator, RowFilter};
//!
//! let aggregator = Aggregator::new(RowFilter::excluding_robot("NLSBot"));
//! let rows = aggregator.consolidate(&records);
//! ```

pub mod indicators;
pub mod stats;

pub use indicators::{Aggregator, IndicatorRow, RowFilter, PASSTHROUGH_FIELDS};
pub use stats::{mean_top_fraction_sorted, percentile_sorted, Summary, ValueStats};
