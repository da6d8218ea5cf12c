//! Pipeline Integration Tests
//!
//! Runs the insights service end to end against the in-memory store:
//! ingest, batched reads, flattening, aggregation and disambiguation.

use chrono::{DateTime, TimeZone, Utc};
use facility_insights::{
    config::Config,
    registry::IngestRequest,
    store::InMemoryStore,
    types::{Metadata, SeriesRequest, TimeRange},
    Error, InsightsService, RequestOptions,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 28, hour, minute, 0).unwrap()
}

fn day() -> TimeRange {
    TimeRange::new(at(0, 0), Utc.with_ymd_and_hms(2025, 8, 29, 0, 0, 0).unwrap()).unwrap()
}

fn reading(name: &str, facility: &str, robot: &str, value: f64, time: DateTime<Utc>) -> IngestRequest {
    IngestRequest {
        series: SeriesRequest {
            name: name.to_string(),
            facility: facility.to_string(),
            external_id: "inspection".to_string(),
            description: "CO2Measurement".to_string(),
            unit: "ppm".to_string(),
            asset_id: facility.to_string(),
            step: true,
            metadata: Metadata::from([
                ("robot_name".to_string(), robot.into()),
                ("inspection_description".to_string(), name.into()),
            ]),
        },
        value,
        timestamp: time,
    }
}

fn service(store: Arc<InMemoryStore>, config: &Config) -> InsightsService {
    InsightsService::new(store, config).unwrap()
}

async fn ingest_all(svc: &InsightsService, requests: &[IngestRequest]) {
    for request in requests {
        svc.ingest(request, RequestOptions::default()).await.unwrap();
    }
}

#[tokio::test]
async fn test_150_series_fetched_in_two_batches() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(store.clone(), &Config::default());

    let requests: Vec<_> = (0..150)
        .map(|i| reading(&format!("S{i:03}"), "F", "R1", i as f64, at(12, 0)))
        .collect();
    ingest_all(&svc, &requests).await;

    let records = svc
        .list_measurements("F", &day(), RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(records.len(), 150);
    let mut sizes = store.query_batch_sizes();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![50, 100]);
    assert_eq!(store.lookup_count(), 150);
}

#[tokio::test]
async fn test_row_count_equals_datapoint_count() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(store.clone(), &Config::default());

    let mut requests = Vec::new();
    for (series, points) in [("A", 4u32), ("B", 0), ("C", 7)] {
        for minute in 0..points {
            requests.push(reading(series, "F", "R1", f64::from(minute), at(10, minute)));
        }
    }
    ingest_all(&svc, &requests).await;
    // B exists but has no datapoints
    svc.registry()
        .resolve_or_create(&reading("B", "F", "R1", 0.0, at(10, 0)).series)
        .await
        .unwrap();
    assert_eq!(store.series_count(), 3);

    let records = svc
        .list_measurements("F", &day(), RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(records.len(), 11);

    let rows = svc
        .consolidate("F", &day(), RequestOptions::default())
        .await
        .unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["A", "C"]);
    assert_eq!(rows[0].value_count, 4);
    assert_eq!(rows[1].value_count, 7);
}

#[tokio::test]
async fn test_window_bounds_are_inclusive() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(store.clone(), &Config::default());
    ingest_all(
        &svc,
        &[
            reading("A", "F", "R1", 1.0, at(9, 59)),
            reading("A", "F", "R1", 2.0, at(10, 0)),
            reading("A", "F", "R1", 3.0, at(11, 0)),
            reading("A", "F", "R1", 4.0, at(11, 1)),
        ],
    )
    .await;

    let range = TimeRange::new(at(10, 0), at(11, 0)).unwrap();
    let records = svc
        .list_measurements("F", &range, RequestOptions::default())
        .await
        .unwrap();
    let values: Vec<f64> = records.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![2.0, 3.0]);
}

#[tokio::test]
async fn test_single_reading_scoped_by_window() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(store.clone(), &Config::default());
    ingest_all(
        &svc,
        &[
            reading("Inspection-1", "F", "R1", 420.0, at(8, 0)),
            reading("Inspection-1", "F", "R1", 430.0, at(14, 0)),
        ],
    )
    .await;

    let morning = TimeRange::new(at(7, 0), at(9, 0)).unwrap();
    let value = svc
        .single_reading("F", "Inspection-1", &morning, RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(value, 420.0);

    let err = svc
        .single_reading("F", "Inspection-1", &day(), RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Ambiguous { count: 2 }));

    let evening = TimeRange::new(at(20, 0), at(21, 0)).unwrap();
    let err = svc
        .single_reading("F", "Inspection-1", &evening, RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");

    let err = svc
        .single_reading("G", "Inspection-1", &day(), RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn test_failed_batch_yields_no_partial_data() {
    let store = Arc::new(InMemoryStore::new());
    let mut config = Config::default();
    config.query.max_items_per_request = 10;
    config.query.max_concurrent_batches = 2;
    let svc = service(store.clone(), &config);

    let requests: Vec<_> = (0..35)
        .map(|i| reading(&format!("S{i}"), "F", "R1", 1.0, at(12, 0)))
        .collect();
    ingest_all(&svc, &requests).await;
    store.fail_query_call(2);

    let err = svc
        .consolidate("F", &day(), RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "query");
}

#[tokio::test]
async fn test_descriptor_lookup_failure_is_query_error() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(store.clone(), &Config::default());
    let response = svc
        .ingest(&reading("A", "F", "R1", 1.0, at(12, 0)), RequestOptions::default())
        .await
        .unwrap();
    store.fail_lookup(&response.timeseries_id);

    let err = svc
        .list_measurements("F", &day(), RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "query");
}

#[tokio::test]
async fn test_deadline_cancels_slow_batches() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(store.clone(), &Config::default());
    ingest_all(&svc, &[reading("A", "F", "R1", 1.0, at(12, 0))]).await;
    store.set_query_delays(vec![Duration::from_secs(10)]);

    let started = std::time::Instant::now();
    let err = svc
        .consolidate(
            "F",
            &day(),
            RequestOptions::with_deadline(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "query");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_concurrent_requests_share_store() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(store.clone(), &Config::default());
    ingest_all(
        &svc,
        &[
            reading("A", "F", "R1", 1.0, at(12, 0)),
            reading("B", "G", "R1", 2.0, at(12, 0)),
        ],
    )
    .await;

    let window = day();
    let (f, g) = tokio::join!(
        svc.consolidate("F", &window, RequestOptions::default()),
        svc.consolidate("G", &window, RequestOptions::default()),
    );
    let f = f.unwrap();
    let g = g.unwrap();
    assert_eq!(f.len(), 1);
    assert_eq!(g.len(), 1);
    assert_eq!(f[0].name, "A");
    assert_eq!(g[0].name, "B");
}

#[tokio::test]
async fn test_delete_series_removes_it_from_listing() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(store.clone(), &Config::default());
    let response = svc
        .ingest(&reading("A", "F", "R1", 1.0, at(12, 0)), RequestOptions::default())
        .await
        .unwrap();

    svc.registry()
        .delete_series(&response.timeseries_id)
        .await
        .unwrap();

    let records = svc
        .list_measurements("F", &day(), RequestOptions::default())
        .await
        .unwrap();
    assert!(records.is_empty());

    let err = svc
        .registry()
        .delete_series(&response.timeseries_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "registration");
}

#[tokio::test]
async fn test_excluded_robot_never_reaches_indicators() {
    let store = Arc::new(InMemoryStore::new());
    let mut config = Config::default();
    config.insights.excluded_robot_name = Some("NLSBot".to_string());
    let svc = service(store.clone(), &config);
    ingest_all(
        &svc,
        &[
            reading("A", "F", "R1", 1.0, at(12, 0)),
            reading("Test", "F", "NLSBot", 999.0, at(12, 0)),
        ],
    )
    .await;

    let rows = svc
        .consolidate("F", &day(), RequestOptions::default())
        .await
        .unwrap();
    let names: HashSet<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, HashSet::from(["A"]));
}
