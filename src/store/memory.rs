//! In-memory store for tests and local development
//!
//! Keeps series in insertion order so searches are deterministic, records the
//! size of every multi-datapoint request, and supports failure injection and
//! per-call latency so batching and ordering behaviour can be observed.
//!
//! **Not for production use:** all data is lost on drop.

use super::TimeSeriesStore;
use crate::error::StoreError;
use crate::types::{
    Datapoint, QueryItem, SeriesDatapoints, SeriesDescriptor, SeriesId, SeriesRequest,
    StoreMessage,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

struct SeriesEntry {
    descriptor: SeriesDescriptor,
    datapoints: Vec<Datapoint>,
}

#[derive(Default)]
struct Inner {
    order: Vec<SeriesId>,
    series: HashMap<SeriesId, SeriesEntry>,
}

/// Process-local [`TimeSeriesStore`]
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    query_batches: RwLock<Vec<usize>>,
    query_calls: AtomicUsize,
    lookups: AtomicU64,
    searches: AtomicU64,
    failing_query_call: RwLock<Option<usize>>,
    failing_lookups: RwLock<HashSet<SeriesId>>,
    query_delays: RwLock<Vec<Duration>>,
    lookup_delays: RwLock<HashMap<SeriesId, Duration>>,
    fail_registration: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a series descriptor, replacing any with the same id
    pub fn add_series(&self, descriptor: SeriesDescriptor) {
        let mut inner = self.inner.write();
        let id = descriptor.id.clone();
        if !inner.series.contains_key(&id) {
            inner.order.push(id.clone());
        }
        let datapoints = inner
            .series
            .remove(&id)
            .map(|e| e.datapoints)
            .unwrap_or_default();
        inner.series.insert(
            id,
            SeriesEntry {
                descriptor,
                datapoints,
            },
        );
    }

    /// Append datapoints to an existing series
    pub fn add_datapoints(&self, id: &str, points: impl IntoIterator<Item = Datapoint>) {
        if let Some(entry) = self.inner.write().series.get_mut(id) {
            entry.datapoints.extend(points);
        }
    }

    /// Number of stored series
    pub fn series_count(&self) -> usize {
        self.inner.read().order.len()
    }

    /// Datapoints currently stored for a series
    pub fn datapoints(&self, id: &str) -> Vec<Datapoint> {
        self.inner
            .read()
            .series
            .get(id)
            .map(|e| e.datapoints.clone())
            .unwrap_or_default()
    }

    /// Item count of every `query_multi` call, in call order
    pub fn query_batch_sizes(&self) -> Vec<usize> {
        self.query_batches.read().clone()
    }

    /// Number of `lookup_by_id` calls served
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Number of `search` calls served
    pub fn search_count(&self) -> u64 {
        self.searches.load(Ordering::Relaxed)
    }

    /// Make the `n`-th `query_multi` call (0-based) fail
    pub fn fail_query_call(&self, n: usize) {
        *self.failing_query_call.write() = Some(n);
    }

    /// Make descriptor lookups for `id` fail
    pub fn fail_lookup(&self, id: &str) {
        self.failing_lookups.write().insert(id.to_string());
    }

    /// Delay the `n`-th `query_multi` call by `delays[n]`
    pub fn set_query_delays(&self, delays: Vec<Duration>) {
        *self.query_delays.write() = delays;
    }

    /// Delay every descriptor lookup of `id` by `delay`
    pub fn set_lookup_delay(&self, id: &str, delay: Duration) {
        self.lookup_delays.write().insert(id.to_string(), delay);
    }

    /// Make `register_or_lookup` return an error
    pub fn fail_registration(&self, fail: bool) {
        self.fail_registration.store(fail, Ordering::Relaxed);
    }

    /// Make `write_datapoints` return an error
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    fn parse_bound(value: &str) -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StoreError::Status {
                status: 400,
                body: format!("invalid timestamp {value}: {e}"),
            })
    }

    fn unavailable(what: &str) -> StoreError {
        StoreError::Status {
            status: 503,
            body: format!("{what} unavailable"),
        }
    }
}

#[async_trait]
impl TimeSeriesStore for InMemoryStore {
    fn store_id(&self) -> &str {
        "in-memory"
    }

    async fn register_or_lookup(
        &self,
        request: &SeriesRequest,
    ) -> Result<Vec<SeriesId>, StoreError> {
        if self.fail_registration.load(Ordering::Relaxed) {
            return Err(Self::unavailable("registration"));
        }

        let existing = {
            let inner = self.inner.read();
            inner
                .order
                .iter()
                .filter_map(|id| inner.series.get(id))
                .find(|e| {
                    e.descriptor.name == request.name && e.descriptor.facility == request.facility
                })
                .map(|e| e.descriptor.id.clone())
        };
        if let Some(id) = existing {
            return Ok(vec![id]);
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.add_series(SeriesDescriptor {
            id: id.clone(),
            name: request.name.clone(),
            facility: request.facility.clone(),
            external_id: request.external_id.clone(),
            description: request.description.clone(),
            unit: request.unit.clone(),
            asset_id: request.asset_id.clone(),
            step: request.step,
            metadata: request.metadata.clone(),
            source: None,
            standard_unit: None,
            created_time: Some(Utc::now().to_rfc3339()),
            changed_time: None,
        });
        Ok(vec![id])
    }

    async fn write_datapoints(
        &self,
        id: &str,
        datapoints: &[Datapoint],
    ) -> Result<StoreMessage, StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(Self::unavailable("write"));
        }

        let mut inner = self.inner.write();
        let entry = inner
            .series
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.datapoints.extend_from_slice(datapoints);

        Ok(StoreMessage {
            status_code: 0,
            message: format!("{} datapoints written", datapoints.len()),
            trace_id: None,
        })
    }

    async fn query_multi(&self, items: &[QueryItem]) -> Result<Vec<SeriesDatapoints>, StoreError> {
        let call = self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.query_batches.write().push(items.len());

        let delay = self.query_delays.read().get(call).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.failing_query_call.read() == Some(call) {
            return Err(Self::unavailable("datapoint query"));
        }

        let inner = self.inner.read();
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let start = Self::parse_bound(&item.start_time)?;
            let end = Self::parse_bound(&item.end_time)?;
            let datapoints = inner
                .series
                .get(&item.id)
                .map(|e| {
                    e.datapoints
                        .iter()
                        .filter(|p| p.time >= start && p.time <= end)
                        .filter(|p| {
                            item.status_filter.is_empty() || item.status_filter.contains(&p.status)
                        })
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            results.push(SeriesDatapoints {
                id: item.id.clone(),
                datapoints,
            });
        }
        Ok(results)
    }

    async fn lookup_by_id(&self, id: &str) -> Result<SeriesDescriptor, StoreError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let delay = self.lookup_delays.read().get(id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_lookups.read().contains(id) {
            return Err(Self::unavailable("descriptor lookup"));
        }

        self.inner
            .read()
            .series
            .get(id)
            .map(|e| e.descriptor.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn search(
        &self,
        description: Option<&str>,
        facility: Option<&str>,
    ) -> Result<Vec<SeriesDescriptor>, StoreError> {
        self.searches.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.read();
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.series.get(id))
            .map(|e| &e.descriptor)
            .filter(|d| description.map_or(true, |v| d.description == v))
            .filter(|d| facility.map_or(true, |v| d.facility == v))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<StoreMessage, StoreError> {
        let mut inner = self.inner.write();
        if inner.series.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        inner.order.retain(|s| s != id);
        Ok(StoreMessage {
            status_code: 0,
            message: format!("deleted {id}"),
            trace_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metadata, TimeRange, GOOD_STATUS};
    use chrono::TimeZone;

    fn request(name: &str) -> SeriesRequest {
        SeriesRequest {
            name: name.to_string(),
            facility: "F".to_string(),
            external_id: "ext".to_string(),
            description: "CO2Measurement".to_string(),
            unit: "ppm".to_string(),
            asset_id: "F".to_string(),
            step: true,
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn test_register_is_idempotent_per_name_and_facility() {
        let store = InMemoryStore::new();
        let first = store.register_or_lookup(&request("A")).await.unwrap();
        let second = store.register_or_lookup(&request("A")).await.unwrap();
        let other = store.register_or_lookup(&request("B")).await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(store.series_count(), 2);
    }

    #[tokio::test]
    async fn test_query_filters_range_and_status() {
        let store = InMemoryStore::new();
        let id = store.register_or_lookup(&request("A")).await.unwrap()[0].clone();
        let t = |h| Utc.with_ymd_and_hms(2025, 1, 1, h, 0, 0).unwrap();
        store.add_datapoints(
            &id,
            vec![
                Datapoint::good(t(1), 1.0),
                Datapoint {
                    time: t(2),
                    value: 2.0,
                    status: 0,
                },
                Datapoint::good(t(3), 3.0),
                Datapoint::good(t(5), 5.0),
            ],
        );

        let range = TimeRange::new(t(1), t(3)).unwrap();
        let result = store
            .query_multi(&[QueryItem::good_quality(id.clone(), &range)])
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        let values: Vec<f64> = result[0].datapoints.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 3.0]);
        assert!(result[0].datapoints.iter().all(|p| p.status == GOOD_STATUS));
        assert_eq!(store.query_batch_sizes(), vec![1]);
    }

    #[tokio::test]
    async fn test_injected_query_failure() {
        let store = InMemoryStore::new();
        store.fail_query_call(1);
        assert!(store.query_multi(&[]).await.is_ok());
        assert!(store.query_multi(&[]).await.is_err());
        assert!(store.query_multi(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_removes_series() {
        let store = InMemoryStore::new();
        let id = store.register_or_lookup(&request("A")).await.unwrap()[0].clone();
        store.delete(&id).await.unwrap();
        assert!(matches!(
            store.lookup_by_id(&id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.delete(&id).await.is_err());
    }
}
