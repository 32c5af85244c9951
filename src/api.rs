// src/api.rs
//! Trigger endpoints. Each one checks its own bearer secret, calls the
//! pipeline and maps the result to JSON. The pipeline never returns an error
//! past this layer; panics are caught and reported as structured 500s.

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::config::{Capability, Credentials};
use crate::ingest::pipeline::Pipeline;
use crate::ingest::types::IngestionResult;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub credentials: Arc<Credentials>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, credentials: Credentials) -> Self {
        Self {
            pipeline,
            credentials: Arc::new(credentials),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/cron/ingest", get(cron_ingest).post(cron_ingest))
        .route("/api/admin/ingest", post(admin_ingest))
        .route("/api/ingest/preview", get(preview_ingest))
        .layer(CorsLayer::very_permissive())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    timestamp: DateTime<Utc>,
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: msg.to_string(),
            timestamp: Utc::now(),
        }),
    )
        .into_response()
}

fn panic_response(_err: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("request handler panicked");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

fn authorized(state: &AppState, cap: Capability, headers: &HeaderMap) -> bool {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let ok = state.credentials.authorize(cap, header);
    if !ok {
        tracing::warn!(capability = ?cap, "rejected trigger request");
    }
    ok
}

fn status_for(result: &IngestionResult) -> StatusCode {
    if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// What the scheduled trigger reveals: outcome and counts, no feed content.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CronSummary {
    success: bool,
    articles_processed: usize,
    articles_created: usize,
    duplicates_skipped: usize,
    error_count: usize,
    timestamp: DateTime<Utc>,
}

async fn cron_ingest(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !authorized(&state, Capability::Cron, &headers) {
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    }
    let r = state.pipeline.commit().await;
    let body = CronSummary {
        success: r.success,
        articles_processed: r.articles_processed,
        articles_created: r.articles_created,
        duplicates_skipped: r.duplicates_skipped,
        error_count: r.errors.len(),
        timestamp: r.finished_at,
    };
    (status_for(&r), Json(body)).into_response()
}

async fn admin_ingest(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !authorized(&state, Capability::Admin, &headers) {
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    }
    let r = state.pipeline.commit().await;
    (status_for(&r), Json(r)).into_response()
}

async fn preview_ingest(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !authorized(&state, Capability::Preview, &headers) {
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    }
    let outcome = state.pipeline.preview().await;
    (status_for(&outcome.result), Json(outcome)).into_response()
}
