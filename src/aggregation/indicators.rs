//! Indicator rows
//!
//! One row per distinct series name. Groups appear in the order their name is
//! first seen, and each pass-through field keeps the first value observed for
//! it, so the output is fully determined by the input order.

use crate::flatten::FlattenedRecord;
use crate::types::{FieldValue, Metadata};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::stats::{Summary, ValueStats};

/// Fields copied from the first record that carries them
pub const PASSTHROUGH_FIELDS: [&str; 12] = [
    "description",
    "externalId",
    "inspection_description",
    "id",
    "facility",
    "robot_name",
    "source",
    "standardUnit",
    "status",
    "step",
    "tag_id",
    "unit",
];

/// Statistics for one series name
///
/// `value_std` is NaN for single-value groups and serializes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRow {
    /// Series name the row summarizes
    pub name: String,
    /// Earliest datapoint time
    pub time_min: DateTime<Utc>,
    /// Latest datapoint time
    pub time_max: DateTime<Utc>,
    /// Pass-through fields, absent when no record carried them
    #[serde(flatten)]
    pub fields: Metadata,
    /// Arithmetic mean
    pub value_mean: f64,
    /// Median
    pub value_median: f64,
    /// Largest value
    pub value_max: f64,
    /// Smallest value
    pub value_min: f64,
    /// Sample standard deviation
    pub value_std: f64,
    /// Number of datapoints in the group
    pub value_count: usize,
    /// 95th percentile
    pub value_p95: f64,
    /// 75th percentile
    pub value_p75: f64,
    /// Mean of the top 10% of values
    pub value_mean_top10: f64,
}

impl IndicatorRow {
    fn new(group: Group, summary: Summary) -> Self {
        Self {
            name: group.name,
            time_min: group.time_min,
            time_max: group.time_max,
            fields: group.fields,
            value_mean: summary.mean,
            value_median: summary.median,
            value_max: summary.max,
            value_min: summary.min,
            value_std: summary.std,
            value_count: summary.count,
            value_p95: summary.p95,
            value_p75: summary.p75,
            value_mean_top10: summary.mean_top10,
        }
    }

    /// Look up a pass-through field
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

/// Drops records before aggregation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    /// Records whose `robot_name` equals this value are dropped
    pub excluded_robot_name: Option<String>,
}

impl RowFilter {
    /// Filter excluding one robot
    pub fn excluding_robot(name: impl Into<String>) -> Self {
        Self {
            excluded_robot_name: Some(name.into()),
        }
    }

    /// Check whether a record survives the filter
    pub fn keep(&self, record: &FlattenedRecord) -> bool {
        match &self.excluded_robot_name {
            Some(robot) => record.text("robot_name") != Some(robot.as_str()),
            None => true,
        }
    }
}

struct Group {
    name: String,
    time_min: DateTime<Utc>,
    time_max: DateTime<Utc>,
    fields: Metadata,
    stats: ValueStats,
}

impl Group {
    fn new(name: String, record: &FlattenedRecord) -> Self {
        Self {
            name,
            time_min: record.time,
            time_max: record.time,
            fields: Metadata::new(),
            stats: ValueStats::new(),
        }
    }

    fn add(&mut self, record: &FlattenedRecord) {
        self.time_min = self.time_min.min(record.time);
        self.time_max = self.time_max.max(record.time);
        self.stats.add(record.value);

        for key in PASSTHROUGH_FIELDS {
            if self.fields.contains_key(key) {
                continue;
            }
            if let Some(value) = passthrough_value(record, key) {
                self.fields.insert(key.to_string(), value);
            }
        }
    }
}

/// Pass-through value of a record; `id` and `status` live on the datapoint
fn passthrough_value(record: &FlattenedRecord, key: &str) -> Option<FieldValue> {
    match key {
        "id" => Some(FieldValue::Text(record.id.clone())),
        "status" => Some(FieldValue::Integer(i64::from(record.status))),
        _ => record.field(key).cloned(),
    }
}

/// Groups flattened records by series name and computes indicators
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    filter: RowFilter,
}

impl Aggregator {
    /// Create an aggregator applying `filter` before grouping
    pub fn new(filter: RowFilter) -> Self {
        Self { filter }
    }

    /// Row filter in effect
    pub fn filter(&self) -> &RowFilter {
        &self.filter
    }

    /// Compute one indicator row per distinct name, in first-encounter order
    pub fn consolidate(&self, records: &[FlattenedRecord]) -> Vec<IndicatorRow> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();

        for record in records.iter().filter(|r| self.filter.keep(r)) {
            let name = record.name();
            let slot = match index.get(&name) {
                Some(&slot) => slot,
                None => {
                    index.insert(name.clone(), groups.len());
                    groups.push(Group::new(name, record));
                    groups.len() - 1
                }
            };
            groups[slot].add(record);
        }

        groups
            .into_iter()
            .filter_map(|group| {
                let summary = group.stats.summarize()?;
                Some(IndicatorRow::new(group, summary))
            })
            .collect()
    }
}
