//! Core data types shared by the store client and the pipeline
//!
//! # Key Types
//!
//! - **`SeriesDescriptor`**: a remote series with its static attributes and metadata
//! - **`SeriesRequest`**: the fields needed to resolve or create a series
//! - **`Datapoint`**: a single observation (time, value, quality status)
//! - **`QueryItem`**: one entry of a multi-series datapoint query
//! - **`TimeRange`**: inclusive query window in UTC
//! - **`FieldValue`**: typed scalar used for metadata and flattened fields
//!
//! Wire field names follow the remote store's camelCase convention.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Error;

/// Remote identifier of a time-series
pub type SeriesId = String;

/// Status code of a good-quality datapoint
pub const GOOD_STATUS: i32 = 192;

// =============================================================================
// Field values
// =============================================================================

/// Typed scalar carried in series metadata and flattened records
///
/// Serialized untagged, so `{"n": 3, "x": 1.5, "tag": "A", "ok": true}` maps
/// to `Integer`, `Number`, `Text` and `Bool` respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean flag
    Bool(bool),
    /// Integral value
    Integer(i64),
    /// Numeric value
    Number(f64),
    /// Free text
    Text(String),
}

impl FieldValue {
    /// Borrow the text content, if this is a text value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Free-form series metadata with typed values
pub type Metadata = BTreeMap<String, FieldValue>;

/// Accept `null` metadata values from the remote by dropping them
fn deserialize_metadata<'de, D>(deserializer: D) -> Result<Metadata, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<FieldValue>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect())
}

fn default_step() -> bool {
    true
}

// =============================================================================
// Series
// =============================================================================

/// A remote time-series and its static attributes
///
/// Owned by the remote store; the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesDescriptor {
    /// Remote identifier
    pub id: SeriesId,
    /// Logical name, encodes position, tag and robot context
    pub name: String,
    /// Facility (installation code)
    pub facility: String,
    /// External reference, usually the inspection id
    #[serde(default)]
    pub external_id: String,
    /// Measurement kind, e.g. `CO2Measurement`
    #[serde(default)]
    pub description: String,
    /// Unit of measure
    #[serde(default)]
    pub unit: String,
    /// Owning asset
    #[serde(default)]
    pub asset_id: String,
    /// Whether values are step-interpolated
    #[serde(default = "default_step")]
    pub step: bool,
    /// Structured metadata (inspection_description, robot_name, tag_id, offsets)
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: Metadata,
    /// Producing system, set by the remote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Normalized unit, set by the remote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_unit: Option<String>,
    /// Creation timestamp as reported by the remote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    /// Last change timestamp as reported by the remote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_time: Option<String>,
}

impl SeriesDescriptor {
    /// Scalar attributes keyed by their wire names, metadata excluded
    pub fn scalar_fields(&self) -> Metadata {
        let mut fields = Metadata::new();
        fields.insert("id".into(), self.id.clone().into());
        fields.insert("name".into(), self.name.clone().into());
        fields.insert("facility".into(), self.facility.clone().into());
        fields.insert("externalId".into(), self.external_id.clone().into());
        fields.insert("description".into(), self.description.clone().into());
        fields.insert("unit".into(), self.unit.clone().into());
        fields.insert("assetId".into(), self.asset_id.clone().into());
        fields.insert("step".into(), self.step.into());

        let optional = [
            ("source", &self.source),
            ("standardUnit", &self.standard_unit),
            ("createdTime", &self.created_time),
            ("changedTime", &self.changed_time),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                fields.insert(key.into(), v.clone().into());
            }
        }
        fields
    }
}

/// Fields needed to resolve or create a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRequest {
    /// Logical name
    pub name: String,
    /// Facility (installation code)
    pub facility: String,
    /// External reference
    pub external_id: String,
    /// Measurement kind
    #[serde(default)]
    pub description: String,
    /// Unit of measure
    pub unit: String,
    /// Owning asset
    pub asset_id: String,
    /// Step interpolation, defaults to true
    #[serde(default = "default_step")]
    pub step: bool,
    /// Structured metadata, defaults to empty
    #[serde(default)]
    pub metadata: Metadata,
}

impl SeriesRequest {
    /// Check that every required field is present and non-empty
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            ("name", &self.name),
            ("facility", &self.facility),
            ("externalId", &self.external_id),
            ("unit", &self.unit),
            ("assetId", &self.asset_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Registration(format!(
                    "missing required field: {}",
                    field
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Datapoints
// =============================================================================

/// A single observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    /// Observation time (UTC, any precision on read)
    pub time: DateTime<Utc>,
    /// Observed value
    pub value: f64,
    /// Quality status, 192 is good
    pub status: i32,
}

impl Datapoint {
    /// Create a good-quality datapoint
    pub fn good(time: DateTime<Utc>, value: f64) -> Self {
        Self {
            time,
            value,
            status: GOOD_STATUS,
        }
    }

    /// Check whether the datapoint carries the good-quality status
    pub fn is_good(&self) -> bool {
        self.status == GOOD_STATUS
    }
}

/// Format a timestamp the way the store expects on write (second precision)
pub fn format_write_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// One entry of a multi-series datapoint query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryItem {
    /// Series to read
    pub id: SeriesId,
    /// Window start, ISO-8601
    pub start_time: String,
    /// Window end, ISO-8601
    pub end_time: String,
    /// Accepted quality statuses
    pub status_filter: Vec<i32>,
}

impl QueryItem {
    /// Build a good-quality-only query for one series over a range
    pub fn good_quality(id: SeriesId, range: &TimeRange) -> Self {
        Self {
            id,
            start_time: range.start_iso(),
            end_time: range.end_iso(),
            status_filter: vec![GOOD_STATUS],
        }
    }
}

/// Datapoints returned for one series of a multi-series query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDatapoints {
    /// Series the datapoints belong to
    pub id: SeriesId,
    /// Datapoints in the requested range, possibly empty
    #[serde(default)]
    pub datapoints: Vec<Datapoint>,
}

/// Acknowledgement returned by the store for writes and deletes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMessage {
    /// Store-defined status code
    #[serde(default)]
    pub status_code: i32,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Correlation id, when the store provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

// =============================================================================
// Time range
// =============================================================================

/// Inclusive query window
///
/// # Example
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use facility_insights::types::TimeRange;
///
/// let start = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2025, 8, 2, 0, 0, 0).unwrap();
/// let range = TimeRange::new(start, end).unwrap();
/// assert!(range.contains(&start));
/// assert!(TimeRange::new(end, start).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start (inclusive)
    pub start: DateTime<Utc>,
    /// End (inclusive)
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new time range, rejecting start > end
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, Error> {
        if start > end {
            return Err(Error::Query(format!(
                "Invalid time range: start {} > end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Check if a timestamp falls within this range (inclusive)
    pub fn contains(&self, time: &DateTime<Utc>) -> bool {
        *time >= self.start && *time <= self.end
    }

    /// Start as ISO-8601 UTC
    pub fn start_iso(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// End as ISO-8601 UTC
    pub fn end_iso(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start_iso(), self.end_iso())
    }
}
