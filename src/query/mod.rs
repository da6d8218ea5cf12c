//! Batched query planning
//!
//! ```text
//! SeriesFilter ──► catalog search ──► exact local filter
//!                                          │
//!                                          ▼
//!                       one QueryItem per series (status 192 only)
//!                                          │
//!                                          ▼
//!                  contiguous chunks of `cap` ──► query_multi × ceil(N/cap)
//!                                          │
//!                                          ▼
//!                          concatenated in chunk order
//! ```

pub mod batch;
pub mod filter;

pub use batch::{partition_items, BatchedQueryPlanner};
pub use filter::SeriesFilter;
