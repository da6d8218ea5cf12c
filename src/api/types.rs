//! Request and response bodies for the HTTP API

use crate::flatten::FlattenedRecord;
use crate::types::TimeRange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ApiError;

/// Facility and time window for listing and consolidation
#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementsRequest {
    /// Facility (installation code)
    pub facility: String,
    /// Window start, inclusive
    pub start_time: DateTime<Utc>,
    /// Window end, inclusive
    pub end_time: DateTime<Utc>,
}

impl MeasurementsRequest {
    /// Validated time range
    pub fn range(&self) -> Result<TimeRange, ApiError> {
        TimeRange::new(self.start_time, self.end_time)
            .map_err(|e| ApiError::BadRequest(e.to_string()))
    }
}

/// Scoped single reading request
#[derive(Debug, Clone, Deserialize)]
pub struct ConcentrationRequest {
    /// Facility (installation code)
    pub facility: String,
    /// Task window start, inclusive
    pub task_start_time: DateTime<Utc>,
    /// Task window end, inclusive
    pub task_end_time: DateTime<Utc>,
    /// Series name of the inspection
    pub inspection_name: String,
}

impl ConcentrationRequest {
    /// Validated time range
    pub fn range(&self) -> Result<TimeRange, ApiError> {
        TimeRange::new(self.task_start_time, self.task_end_time)
            .map_err(|e| ApiError::BadRequest(e.to_string()))
    }
}

/// Flattened measurements
#[derive(Debug, Serialize)]
pub struct MeasurementsResponse {
    /// One record per datapoint
    pub data: Vec<FlattenedRecord>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` when the server answers
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}
