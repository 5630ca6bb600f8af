//! HTTP API for the pdflight service.
//!
//! This module provides:
//! - `POST /api/lighten`: PDF upload and optimization
//! - `GET /api/options`: accepted presets and configured defaults
//! - Health and metrics monitoring

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use strum::IntoEnumIterator;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::pipeline::{Oversample, Preset};
use crate::service::LightenService;

pub mod lighten;
use lighten::lighten_handler;

/// Room for multipart boundaries and the small text fields on top of the file.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Application state
pub struct AppState {
    pub service: LightenService,
    pub start_time: Instant,
    pub metrics: Option<PrometheusHandle>,
}

/// Build the API router
pub fn router(config: Arc<Config>, metrics: Option<PrometheusHandle>) -> Router {
    let max_body_size = (config.max_upload_bytes() + MULTIPART_OVERHEAD_BYTES) as usize;

    let state = Arc::new(AppState {
        service: LightenService::new(config),
        start_time: Instant::now(),
        metrics,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/lighten",
            post(lighten_handler).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route("/options", get(options_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

// === Health & Metrics ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

// === Options ===

/// Accepted option values and server-side defaults, for form UIs
#[derive(Serialize)]
struct OptionsResponse {
    presets: Vec<Preset>,
    default_preset: Preset,
    ocr_default: bool,
    max_mb: u64,
    oversample_min: u8,
    oversample_max: u8,
}

async fn options_handler(State(state): State<Arc<AppState>>) -> Json<OptionsResponse> {
    let config = state.service.config();
    Json(OptionsResponse {
        presets: Preset::iter().collect(),
        default_preset: config.default_preset,
        ocr_default: config.ocr_default,
        max_mb: config.max_mb,
        oversample_min: Oversample::MIN,
        oversample_max: Oversample::MAX,
    })
}
