//! Series registry client
//!
//! Resolves a logical series to its remote id, creating it on first use, and
//! appends datapoints to it. Whether two requests name the same series is
//! decided by the remote store. There are no retries at this layer.

use crate::error::{Error, Result};
use crate::metrics;
use crate::store::TimeSeriesStore;
use crate::types::{Datapoint, SeriesId, SeriesRequest, StoreMessage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// A datapoint to ingest together with the series it belongs to
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    /// Series identity and attributes
    #[serde(flatten)]
    pub series: SeriesRequest,
    /// Observed value
    pub value: f64,
    /// Observation time
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a successful ingest
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    /// Id of the series the datapoint was written to
    pub timeseries_id: SeriesId,
    /// Status code reported by the store
    pub status_code: i32,
    /// Message reported by the store
    pub message: String,
}

/// Client for series registration and writes
#[derive(Clone)]
pub struct SeriesRegistry {
    store: Arc<dyn TimeSeriesStore>,
}

impl SeriesRegistry {
    /// Create a registry over a store
    pub fn new(store: Arc<dyn TimeSeriesStore>) -> Self {
        Self { store }
    }

    /// Resolve the series id for a logical name, creating the series if needed
    pub async fn resolve_or_create(&self, request: &SeriesRequest) -> Result<SeriesId> {
        request.validate()?;

        let ids = self
            .store
            .register_or_lookup(request)
            .await
            .map_err(|e| Error::registration("get-or-add series", e))?;

        ids.into_iter().next().ok_or_else(|| {
            Error::Registration(format!(
                "store returned no items for series '{}' in facility '{}'",
                request.name, request.facility
            ))
        })
    }

    /// Resolve the series and append one good-quality datapoint
    pub async fn ingest_datapoint(&self, request: &IngestRequest) -> Result<IngestResponse> {
        let result = self.ingest_inner(request).await;
        if let Err(e) = &result {
            metrics::record_failure("ingest", e);
            error!(
                name = %request.series.name,
                facility = %request.series.facility,
                kind = e.kind(),
                error = %e,
                "Failed to ingest datapoint"
            );
        }
        result
    }

    /// Like [`ingest_datapoint`](Self::ingest_datapoint), bounded by a deadline
    pub async fn ingest_datapoint_within(
        &self,
        request: &IngestRequest,
        deadline: Option<Duration>,
    ) -> Result<IngestResponse> {
        match deadline {
            Some(limit) => tokio::time::timeout(limit, self.ingest_datapoint(request))
                .await
                .unwrap_or_else(|_| {
                    let err = Error::Registration(format!("deadline of {limit:?} exceeded"));
                    metrics::record_failure("ingest", &err);
                    Err(err)
                }),
            None => self.ingest_datapoint(request).await,
        }
    }

    async fn ingest_inner(&self, request: &IngestRequest) -> Result<IngestResponse> {
        let id = self.resolve_or_create(&request.series).await?;

        let point = Datapoint::good(request.timestamp, request.value);
        let message: StoreMessage = self
            .store
            .write_datapoints(&id, std::slice::from_ref(&point))
            .await
            .map_err(|e| Error::registration(&format!("write datapoint to series {id}"), e))?;

        info!(
            series_id = %id,
            name = %request.series.name,
            facility = %request.series.facility,
            description = %request.series.description,
            value = request.value,
            timestamp = %request.timestamp,
            "Uploaded datapoint"
        );

        Ok(IngestResponse {
            timeseries_id: id,
            status_code: message.status_code,
            message: message.message,
        })
    }

    /// Remove a series from the store
    pub async fn delete_series(&self, id: &str) -> Result<()> {
        let response = self
            .store
            .delete(id)
            .await
            .map_err(|e| Error::registration(&format!("delete series {id}"), e))?;
        info!(series_id = %id, message = %response.message, "Deleted series");
        Ok(())
    }
}
