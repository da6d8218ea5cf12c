//! Insights service
//!
//! Composes the pipeline stages behind the three read operations:
//!
//! - `list_measurements`: select → batched fetch → flatten → row filter
//! - `consolidate`: select → batched fetch → flatten → aggregate per series
//!   name (the aggregator applies the row filter)
//! - `single_reading`: select by name → batched fetch → flatten → disambiguate
//!
//! Each operation is stateless and may run concurrently with any other.
//! An optional deadline bounds the whole call. When it expires every
//! in-flight remote request is dropped.

use crate::aggregation::{Aggregator, IndicatorRow, RowFilter};
use crate::config::Config;
use crate::disambiguate::single_value;
use crate::error::{Error, Result};
use crate::flatten::{FlattenedRecord, ResponseFlattener};
use crate::metrics;
use crate::query::{BatchedQueryPlanner, SeriesFilter};
use crate::registry::{IngestRequest, IngestResponse, SeriesRegistry};
use crate::store::TimeSeriesStore;
use crate::types::TimeRange;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-call options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Upper bound on the whole call, `None` for no limit
    pub deadline: Option<Duration>,
}

impl RequestOptions {
    /// Options with a deadline
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }
}

/// Read and ingest operations over a remote time-series store
#[derive(Clone)]
pub struct InsightsService {
    registry: SeriesRegistry,
    planner: BatchedQueryPlanner,
    flattener: ResponseFlattener,
    aggregator: Aggregator,
    measurement_description: String,
    defaults: RequestOptions,
}

impl InsightsService {
    /// Build the service from configuration
    ///
    /// # Errors
    ///
    /// `Error::Configuration` when the query settings are invalid.
    pub fn new(store: Arc<dyn TimeSeriesStore>, config: &Config) -> Result<Self> {
        let planner = BatchedQueryPlanner::from_config(store.clone(), &config.query)?;
        let flattener =
            ResponseFlattener::new(store.clone(), config.query.descriptor_lookup_concurrency);
        let aggregator = Aggregator::new(RowFilter {
            excluded_robot_name: config.insights.excluded_robot_name.clone(),
        });

        Ok(Self {
            registry: SeriesRegistry::new(store),
            planner,
            flattener,
            aggregator,
            measurement_description: config.insights.measurement_description.clone(),
            defaults: RequestOptions {
                deadline: config.query.deadline(),
            },
        })
    }

    /// Options applied when a caller has none of its own
    pub fn default_options(&self) -> RequestOptions {
        self.defaults
    }

    /// Series registry sharing this service's store
    pub fn registry(&self) -> &SeriesRegistry {
        &self.registry
    }

    /// Resolve the series and write one datapoint
    pub async fn ingest(
        &self,
        request: &IngestRequest,
        options: RequestOptions,
    ) -> Result<IngestResponse> {
        let start = Instant::now();
        let result = self
            .registry
            .ingest_datapoint_within(request, options.deadline)
            .await;
        metrics::record_pipeline("ingest", start.elapsed().as_secs_f64());
        result
    }

    /// Every good-quality measurement in a facility over a range, one record
    /// per datapoint
    pub async fn list_measurements(
        &self,
        facility: &str,
        range: &TimeRange,
        options: RequestOptions,
    ) -> Result<Vec<FlattenedRecord>> {
        self.run("list_measurements", options, async {
            let mut records = self.measurements(facility, range).await?;
            let row_filter = self.aggregator.filter();
            let before = records.len();
            records.retain(|r| row_filter.keep(r));
            if records.len() != before {
                debug!(dropped = before - records.len(), "Row filter dropped records");
            }
            Ok(records)
        })
        .await
    }

    /// Per-series indicators for a facility over a range
    pub async fn consolidate(
        &self,
        facility: &str,
        range: &TimeRange,
        options: RequestOptions,
    ) -> Result<Vec<IndicatorRow>> {
        self.run("consolidate", options, async {
            let records = self.measurements(facility, range).await?;
            let rows = self.aggregator.consolidate(&records);
            info!(
                facility = %facility,
                records = records.len(),
                series = rows.len(),
                "Consolidated measurements"
            );
            Ok(rows)
        })
        .await
    }

    /// The one reading of a named inspection in a facility over a range
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` when no series matches, or it has no datapoints
    ///   in range
    /// - `Error::Ambiguous` when more than one datapoint matches
    /// - `Error::Query` when a remote read fails
    pub async fn single_reading(
        &self,
        facility: &str,
        inspection_name: &str,
        range: &TimeRange,
        options: RequestOptions,
    ) -> Result<f64> {
        self.run("single_reading", options, async {
            let filter = SeriesFilter::new(&self.measurement_description, facility)
                .with_name(inspection_name);
            let scope = format!("inspection '{inspection_name}' in facility '{facility}'");

            let series = self.planner.select_series(&filter).await?;
            if series.is_empty() {
                return Err(Error::NotFound(format!("no series for {scope}")));
            }

            let ids: Vec<_> = series.into_iter().map(|d| d.id).collect();
            let results = self.planner.fetch(&ids, range).await?;
            let records = self.flattener.flatten(&results).await?;
            single_value(&records, &scope)
        })
        .await
    }

    async fn measurements(&self, facility: &str, range: &TimeRange) -> Result<Vec<FlattenedRecord>> {
        let filter = SeriesFilter::new(&self.measurement_description, facility);
        let series = self.planner.select_series(&filter).await?;
        let ids: Vec<_> = series.into_iter().map(|d| d.id).collect();

        let results = self.planner.fetch(&ids, range).await?;
        let records = self.flattener.flatten(&results).await?;
        metrics::record_flattened_rows("measurements", records.len());
        Ok(records)
    }

    async fn run<T, F>(&self, operation: &'static str, options: RequestOptions, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = match options.deadline {
            Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
                Err(Error::Query(format!(
                    "{operation} exceeded deadline of {limit:?}"
                )))
            }),
            None => fut.await,
        };
        metrics::record_pipeline(operation, start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            metrics::record_failure(operation, e);
            match e {
                Error::NotFound(_) | Error::Ambiguous { .. } => {
                    debug!(operation, kind = e.kind(), error = %e, "No single reading")
                }
                _ => warn!(operation, kind = e.kind(), error = %e, "Pipeline operation failed"),
            }
        }
        result
    }
}
