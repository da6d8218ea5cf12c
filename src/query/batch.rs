//! Batched multi-series reads
//!
//! The remote store caps the number of items in one multi-datapoint request.
//! A read over many series is split into contiguous chunks of at most `cap`
//! items, the chunks are fetched with bounded concurrency, and the responses
//! are concatenated in chunk order. Any failed chunk fails the whole read.

use crate::config::QueryConfig;
use crate::error::{Error, Result};
use crate::metrics;
use crate::store::TimeSeriesStore;
use crate::types::{QueryItem, SeriesDatapoints, SeriesDescriptor, SeriesId, TimeRange};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

use super::filter::SeriesFilter;

/// Split items into contiguous chunks of `cap` items, the last possibly shorter
///
/// Order is preserved within and across chunks. A `cap` of zero is treated
/// as one; the planner rejects it before this is reached.
pub fn partition_items<T: Clone>(items: &[T], cap: usize) -> Vec<Vec<T>> {
    items.chunks(cap.max(1)).map(<[T]>::to_vec).collect()
}

/// Plans and executes capped multi-series datapoint reads
#[derive(Clone)]
pub struct BatchedQueryPlanner {
    store: Arc<dyn TimeSeriesStore>,
    cap: usize,
    max_concurrent: usize,
}

impl BatchedQueryPlanner {
    /// Create a planner
    ///
    /// # Errors
    ///
    /// `Error::Configuration` when `cap` or `max_concurrent` is zero.
    pub fn new(store: Arc<dyn TimeSeriesStore>, cap: usize, max_concurrent: usize) -> Result<Self> {
        if cap == 0 {
            return Err(Error::Configuration(
                "max items per request must be > 0".to_string(),
            ));
        }
        if max_concurrent == 0 {
            return Err(Error::Configuration(
                "max concurrent batches must be > 0".to_string(),
            ));
        }
        Ok(Self {
            store,
            cap,
            max_concurrent,
        })
    }

    /// Create a planner from the `[query]` configuration section
    pub fn from_config(store: Arc<dyn TimeSeriesStore>, config: &QueryConfig) -> Result<Self> {
        Self::new(
            store,
            config.max_items_per_request,
            config.max_concurrent_batches,
        )
    }

    /// Maximum items per remote request
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Search the catalog and keep the descriptors matching `filter` exactly
    pub async fn select_series(&self, filter: &SeriesFilter) -> Result<Vec<SeriesDescriptor>> {
        let candidates = self
            .store
            .search(Some(&filter.description), Some(&filter.facility))
            .await
            .map_err(|e| Error::query("search series", e))?;

        let found = candidates.len();
        let selected: Vec<SeriesDescriptor> =
            candidates.into_iter().filter(|d| filter.matches(d)).collect();

        debug!(
            description = %filter.description,
            facility = %filter.facility,
            name = ?filter.name,
            found,
            selected = selected.len(),
            "Selected series"
        );
        Ok(selected)
    }

    /// Read good-quality datapoints for every series over `range`
    ///
    /// Returns one entry per id, in input order.
    pub async fn fetch(&self, ids: &[SeriesId], range: &TimeRange) -> Result<Vec<SeriesDatapoints>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let items: Vec<QueryItem> = ids
            .iter()
            .map(|id| QueryItem::good_quality(id.clone(), range))
            .collect();
        let chunks = partition_items(&items, self.cap);
        let total = chunks.len();

        debug!(
            series = ids.len(),
            batches = total,
            cap = self.cap,
            range = %range,
            "Fetching datapoints"
        );

        // `buffered` yields in submission order; dropping the stream on the
        // first error cancels the chunks still in flight.
        let responses: Vec<Vec<SeriesDatapoints>> = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, chunk)| self.fetch_chunk(index, total, chunk))
            .buffered(self.max_concurrent)
            .try_collect()
            .await?;

        Ok(responses.into_iter().flatten().collect())
    }

    async fn fetch_chunk(
        &self,
        index: usize,
        total: usize,
        chunk: Vec<QueryItem>,
    ) -> Result<Vec<SeriesDatapoints>> {
        let result = self.store.query_multi(&chunk).await;
        metrics::record_batch_call(chunk.len(), result.is_ok());

        result.map_err(|e| {
            warn!(
                batch = index + 1,
                batches = total,
                items = chunk.len(),
                store = self.store.store_id(),
                error = %e,
                "Batch query failed"
            );
            Error::query(&format!("batch {} of {}", index + 1, total), e)
        })
    }
}
