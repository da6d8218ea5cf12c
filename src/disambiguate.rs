//! Single-reading disambiguation
//!
//! A scoped reading must resolve to exactly one datapoint. Zero datapoints is
//! `NotFound`; more than one is `Ambiguous`. Values are never averaged.

use crate::error::{Error, Result};
use crate::flatten::FlattenedRecord;

/// Reduce records to the value of the one record they must contain
///
/// `scope` describes what was looked up and appears in the `NotFound` message.
pub fn single_value(records: &[FlattenedRecord], scope: &str) -> Result<f64> {
    match records {
        [] => Err(Error::NotFound(format!("no datapoints for {scope}"))),
        [only] => Ok(only.value),
        many => Err(Error::Ambiguous { count: many.len() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;
    use chrono::{TimeZone, Utc};

    fn record(value: f64) -> FlattenedRecord {
        FlattenedRecord {
            id: "s1".into(),
            time: Utc.with_ymd_and_hms(2025, 8, 28, 12, 0, 0).unwrap(),
            value,
            status: 192,
            fields: Metadata::new(),
        }
    }

    #[test]
    fn test_exactly_one() {
        assert_eq!(single_value(&[record(412.5)], "x").unwrap(), 412.5);
    }

    #[test]
    fn test_none_is_not_found() {
        let err = single_value(&[], "inspection A in F").unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().contains("inspection A in F"));
    }

    #[test]
    fn test_two_is_ambiguous() {
        let err = single_value(&[record(1.0), record(1.0)], "x").unwrap_err();
        assert!(matches!(err, Error::Ambiguous { count: 2 }));
    }
}
