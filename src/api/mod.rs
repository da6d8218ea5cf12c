//! HTTP API
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics
//! - `POST /timeseries/datapoint` - Ingest one datapoint
//! - `POST /timeseries/get-co2-measurements` - Flattened measurements
//! - `POST /timeseries/get-co2-concentration` - Single inspection reading
//! - `POST /insights/consolidate-co2-measurements` - Per-series indicators

pub mod error;
pub mod handlers;
pub mod types;

pub use error::{ApiError, ApiResult, ErrorResponse};

use crate::config::Config;
use crate::error::Result;
use crate::insights::InsightsService;
use crate::store::TimeSeriesStore;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared application state
pub struct AppState {
    /// Pipeline operations
    pub service: InsightsService,
    /// Effective configuration
    pub config: Config,
}

impl AppState {
    /// Build state over a store
    pub fn new(store: Arc<dyn TimeSeriesStore>, config: Config) -> Result<Self> {
        let service = InsightsService::new(store, &config)?;
        Ok(Self { service, config })
    }
}

/// CORS for the floor-plan front end
///
/// An empty origin list allows any origin. Origins that are not valid header
/// values are skipped with a warning.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins.iter().filter_map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|_| warn!(origin = %o, "Ignoring invalid CORS origin"))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // Timeseries API
        .route("/timeseries/datapoint", post(handlers::ingest_datapoint))
        .route(
            "/timeseries/get-co2-measurements",
            post(handlers::get_co2_measurements),
        )
        .route(
            "/timeseries/get-co2-concentration",
            post(handlers::get_co2_concentration),
        )
        // Insights API
        .route(
            "/insights/consolidate-co2-measurements",
            post(handlers::consolidate_co2_measurements),
        )
        // State, tracing and CORS
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&state.config.server.cors_allowed_origins))
}
