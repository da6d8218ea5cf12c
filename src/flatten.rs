//! Response flattener
//!
//! Turns nested `{id, datapoints: [...]}` query results into one record per
//! datapoint, each carrying the series attributes and metadata at top level.
//!
//! Merge precedence, lowest first:
//!
//! 1. descriptor scalar fields (`name`, `facility`, `unit`, ...)
//! 2. descriptor metadata (`inspection_description`, `robot_name`, ...)
//! 3. datapoint identity (`id`, `time`, `value`, `status`)
//!
//! Descriptors are looked up once per distinct series per call. Nothing is
//! cached across calls.

use crate::error::{Error, Result};
use crate::metrics;
use crate::store::TimeSeriesStore;
use crate::types::{Datapoint, FieldValue, Metadata, SeriesDatapoints, SeriesDescriptor, SeriesId};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Keys owned by the datapoint; never taken from descriptor or metadata
const RESERVED_KEYS: [&str; 4] = ["id", "time", "value", "status"];

/// One datapoint merged with its series attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenedRecord {
    /// Series the datapoint belongs to
    pub id: SeriesId,
    /// Observation time
    pub time: DateTime<Utc>,
    /// Observed value
    pub value: f64,
    /// Quality status
    pub status: i32,
    /// Descriptor fields with metadata hoisted on top
    #[serde(flatten)]
    pub fields: Metadata,
}

impl FlattenedRecord {
    /// Merge a datapoint with its series descriptor
    pub fn merge(id: &str, descriptor: &SeriesDescriptor, point: &Datapoint) -> Self {
        let mut fields = descriptor.scalar_fields();
        fields.extend(
            descriptor
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        for key in RESERVED_KEYS {
            fields.remove(key);
        }

        Self {
            id: id.to_string(),
            time: point.time,
            value: point.value,
            status: point.status,
            fields,
        }
    }

    /// Look up a merged field by name
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Text value of a merged field
    pub fn text(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(FieldValue::as_str)
    }

    /// Series name, empty when absent
    pub fn name(&self) -> String {
        self.field("name").map(ToString::to_string).unwrap_or_default()
    }
}

/// Flattens query results, resolving descriptors with bounded concurrency
#[derive(Clone)]
pub struct ResponseFlattener {
    store: Arc<dyn TimeSeriesStore>,
    concurrency: usize,
}

impl ResponseFlattener {
    /// Create a flattener allowing `concurrency` descriptor lookups in flight
    pub fn new(store: Arc<dyn TimeSeriesStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Flatten results into one record per datapoint, in input order
    ///
    /// Series without datapoints produce no records and are not looked up.
    /// A failed lookup fails the whole call with `Error::Query`.
    pub async fn flatten(&self, items: &[SeriesDatapoints]) -> Result<Vec<FlattenedRecord>> {
        let mut seen = HashSet::new();
        let ids: Vec<SeriesId> = items
            .iter()
            .filter(|item| !item.datapoints.is_empty())
            .filter(|item| seen.insert(item.id.as_str()))
            .map(|item| item.id.clone())
            .collect();

        let descriptors: HashMap<SeriesId, SeriesDescriptor> = stream::iter(ids)
            .map(|id| self.lookup(id))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let mut records = Vec::with_capacity(items.iter().map(|i| i.datapoints.len()).sum());
        for item in items {
            if item.datapoints.is_empty() {
                continue;
            }
            let descriptor = descriptors.get(&item.id).ok_or_else(|| {
                Error::Query(format!("descriptor for series {} was not resolved", item.id))
            })?;
            records.extend(
                item.datapoints
                    .iter()
                    .map(|point| FlattenedRecord::merge(&item.id, descriptor, point)),
            );
        }

        debug!(
            series = descriptors.len(),
            rows = records.len(),
            "Flattened datapoints"
        );
        Ok(records)
    }

    async fn lookup(&self, id: SeriesId) -> Result<(SeriesId, SeriesDescriptor)> {
        let result = self.store.lookup_by_id(&id).await;
        metrics::record_descriptor_lookup(result.is_ok());

        match result {
            Ok(descriptor) => Ok((id, descriptor)),
            Err(e) => {
                warn!(series_id = %id, error = %e, "Descriptor lookup failed");
                Err(Error::query(&format!("lookup series {id}"), e))
            }
        }
    }
}
