// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! HTTP API: clip downloads for the dashboard.
//!
//! Endpoints:
//!   GET  /api/health                                                → liveness (JSON)
//!   GET  /api/clips/download?camera=cam1&start_time=..&end_time=..  → clip bytes
//!   GET  /api/clips/hls?camera=cam1&start=..&end=..&file=..          → proxied VOD file

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::clip::proxy::PROXY_ROUTE;
use crate::clip::{ClipRequest, ClipRetriever};
use crate::error::MediaError;

/// Shared state passed to all handlers.
pub struct AppState {
    pub retriever: ClipRetriever,
    pub base_url: String,
}

// ──────────────── request / response types ────────────────────────────────

#[derive(Deserialize)]
pub struct DownloadParams {
    camera: String,
    start_time: i64,
    end_time: i64,
}

#[derive(Deserialize)]
pub struct HlsParams {
    camera: String,
    start: i64,
    end: i64,
    #[serde(default = "default_hls_file")]
    file: String,
}

fn default_hls_file() -> String {
    "master.m3u8".to_string()
}

// ──────────────── router ──────────────────────────────────────────────────

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/clips/download", get(handle_download))
        .route(PROXY_ROUTE, get(handle_hls))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn start_server(state: Arc<AppState>, port: u16) {
    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", port);
    info!(port, "HTTP API listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "Failed to bind HTTP server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "HTTP server error");
    }
}

// ──────────────── handlers ────────────────────────────────────────────────

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({
            "status": "ok",
            "nvr": state.base_url,
        })),
    )
}

async fn handle_download(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> Response {
    let result = state
        .retriever
        .fetch_clip(&params.camera, params.start_time, params.end_time)
        .await;

    let asset = match result {
        Ok(asset) => asset,
        Err(e) => {
            warn!(camera = params.camera, error = %e, "Clip download failed");
            return error_response(&e);
        }
    };

    info!(
        camera = params.camera,
        bytes = asset.len(),
        origin = ?asset.origin,
        "Clip served via API"
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, asset.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", asset.file_name),
            ),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        asset.data,
    )
        .into_response()
}

async fn handle_hls(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HlsParams>,
) -> Response {
    let result = match ClipRequest::new(params.camera.clone(), params.start, params.end) {
        Ok(request) => {
            state
                .retriever
                .vod_proxy()
                .fetch(&request, &params.file, &CancellationToken::new())
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(file) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, file.content_type),
                (header::CACHE_CONTROL, file.cache_control()),
            ],
            file.body,
        )
            .into_response(),
        Err(e) => {
            warn!(camera = params.camera, file = params.file, error = %e, "HLS proxy failed");
            error_response(&e)
        }
    }
}

/// HTTP status for a failed clip request.
pub fn status_for(err: &MediaError) -> StatusCode {
    match err {
        MediaError::InvalidRange { .. } | MediaError::InvalidFile(_) => StatusCode::BAD_REQUEST,
        MediaError::EmptyClip { .. } => StatusCode::NOT_FOUND,
        MediaError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        MediaError::Upstream { .. }
        | MediaError::Network(_)
        | MediaError::NoVariant
        | MediaError::NoSegments
        | MediaError::Playlist(_)
        | MediaError::PlaylistFetch { .. }
        | MediaError::SegmentFetch { .. } => StatusCode::BAD_GATEWAY,
        MediaError::Cancelled | MediaError::Config(_) | MediaError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: &MediaError) -> Response {
    let status = status_for(err);
    let summary = match err {
        MediaError::InvalidRange { .. } => "Invalid clip range",
        MediaError::InvalidFile(_) => "Invalid HLS file",
        MediaError::EmptyClip { .. } => "No recordings found for the selected period",
        MediaError::Timeout(_) => "Clip export took too long",
        _ => "Failed to download clip from NVR server",
    };
    (
        status,
        axum::Json(serde_json::json!({
            "error": summary,
            "details": err.to_string(),
        })),
    )
        .into_response()
}
