//! Remote time-series store capability
//!
//! The pipeline never talks HTTP directly; it goes through [`TimeSeriesStore`].
//! Two implementations ship with the crate:
//!
//! - [`HttpTimeSeriesStore`]: JSON over HTTP against the remote API
//! - [`InMemoryStore`]: process-local store for tests and local development
//!
//! Implementations must be safe to share across concurrent requests.
//! Batch size limits are the caller's responsibility.

mod http;
mod memory;

pub use http::HttpTimeSeriesStore;
pub use memory::InMemoryStore;

use crate::error::StoreError;
use crate::types::{
    Datapoint, QueryItem, SeriesDatapoints, SeriesDescriptor, SeriesId, SeriesRequest,
    StoreMessage,
};
use async_trait::async_trait;

/// Operations the pipeline consumes from the remote store
#[async_trait]
pub trait TimeSeriesStore: Send + Sync + 'static {
    /// Identifier of this backend, used in logs
    fn store_id(&self) -> &str;

    /// Resolve a series by name and facility, creating it if missing
    ///
    /// Returns the ids the remote reported; an empty list means the remote
    /// neither found nor created the series.
    async fn register_or_lookup(&self, request: &SeriesRequest)
        -> Result<Vec<SeriesId>, StoreError>;

    /// Append datapoints to a series
    async fn write_datapoints(
        &self,
        id: &str,
        datapoints: &[Datapoint],
    ) -> Result<StoreMessage, StoreError>;

    /// Read datapoints for several series in one request
    ///
    /// Results are returned in request order, one entry per item.
    async fn query_multi(&self, items: &[QueryItem]) -> Result<Vec<SeriesDatapoints>, StoreError>;

    /// Fetch a single series descriptor
    async fn lookup_by_id(&self, id: &str) -> Result<SeriesDescriptor, StoreError>;

    /// List series, optionally narrowed by description and facility
    async fn search(
        &self,
        description: Option<&str>,
        facility: Option<&str>,
    ) -> Result<Vec<SeriesDescriptor>, StoreError>;

    /// Delete a series
    async fn delete(&self, id: &str) -> Result<StoreMessage, StoreError>;
}
