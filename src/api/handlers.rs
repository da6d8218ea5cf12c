//! HTTP handlers
//!
//! Thin adapters: decode the body, call the insights service with the
//! configured default options, encode the result.

use super::error::{ApiError, ApiResult};
use super::types::{ConcentrationRequest, HealthResponse, MeasurementsRequest, MeasurementsResponse};
use super::AppState;
use crate::aggregation::IndicatorRow;
use crate::metrics::gather_metrics;
use crate::registry::{IngestRequest, IngestResponse};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{info, warn};

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus metrics endpoint
pub async fn metrics() -> impl IntoResponse {
    match gather_metrics() {
        Ok(body) => (StatusCode::OK, [("content-type", "text/plain")], body),
        Err(e) => {
            warn!(error = %e, "Failed to gather metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e,
            )
        }
    }
}

/// Resolve the series and write one datapoint
pub async fn ingest_datapoint(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> ApiResult<Json<IngestResponse>> {
    let options = state.service.default_options();
    let response = state
        .service
        .ingest(&request, options)
        .await
        .map_err(ApiError::pipeline("Failed to ingest data"))?;
    Ok(Json(response))
}

/// All CO2 measurements for a facility and time window
pub async fn get_co2_measurements(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MeasurementsRequest>,
) -> ApiResult<Json<MeasurementsResponse>> {
    let range = request.range()?;
    let data = state
        .service
        .list_measurements(&request.facility, &range, state.service.default_options())
        .await
        .map_err(ApiError::pipeline("Failed to retrieve CO2 measurements"))?;
    Ok(Json(MeasurementsResponse { data }))
}

/// The single CO2 reading of an inspection
pub async fn get_co2_concentration(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConcentrationRequest>,
) -> ApiResult<Json<f64>> {
    let range = request.range()?;
    let value = state
        .service
        .single_reading(
            &request.facility,
            &request.inspection_name,
            &range,
            state.service.default_options(),
        )
        .await
        .map_err(ApiError::pipeline("Failed to retrieve CO2 concentration"))?;
    Ok(Json(value))
}

/// Per-series CO2 indicators for a facility and time window
pub async fn consolidate_co2_measurements(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MeasurementsRequest>,
) -> ApiResult<Json<Vec<IndicatorRow>>> {
    info!(
        facility = %request.facility,
        start = %request.start_time,
        end = %request.end_time,
        "Received request to consolidate CO2 measurements"
    );
    let range = request.range()?;
    let rows = state
        .service
        .consolidate(&request.facility, &range, state.service.default_options())
        .await
        .map_err(ApiError::pipeline(
            "Failed to retrieve consolidated CO2 measurements",
        ))?;
    Ok(Json(rows))
}
