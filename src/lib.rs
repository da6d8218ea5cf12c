//! Facility Insights - batched multi-series queries and indicators over a
//! remote time-series store
//!
//! This library provides:
//! - Series registration and datapoint ingest against the remote store
//! - Capped, concurrent multi-series datapoint reads with ordered reassembly
//! - Flattening of nested query results into uniform records
//! - Per-series statistical indicators and single-reading disambiguation
//!
//! # Pipeline
//!
//! ```text
//! BatchedQueryPlanner ──► TimeSeriesStore ──► ResponseFlattener ──► Aggregator
//!                                                     │
//!                                                     └──► single_value
//! ```
//!
//! Every operation is stateless; the remote store owns all data.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Prometheus metrics and telemetry
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

/// Remote time-series store capability with HTTP and in-memory backends
pub mod store;

/// Series registration, datapoint ingest and cleanup
pub mod registry;

/// Series selection and capped multi-series reads
pub mod query;

/// Merge of descriptors and datapoints into flat records
pub mod flatten;

/// Per-series indicators
pub mod aggregation;

/// Exactly-one-reading reduction
pub mod disambiguate;

/// Pipeline operations composed for callers
pub mod insights;

/// HTTP routes, handlers and error mapping
pub mod api;

// Re-export main types
pub use error::{Error, Result, StoreError};
pub use insights::{InsightsService, RequestOptions};
pub use types::{SeriesId, TimeRange};
