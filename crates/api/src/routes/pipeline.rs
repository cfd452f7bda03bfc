//! Pipeline status endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/pipeline", get(pipeline_status))
}

#[derive(Debug, Serialize)]
pub struct PipelineStatus {
    pub watched_addresses: usize,
    pub dedup_records: usize,
    pub cached_prices: usize,
    pub queue_pending: usize,
    pub queue_dropped: u64,
    /// `typed`, `raw`, or `disabled` when the native scanner is not running
    pub native_mode: &'static str,
}

/// GET /api/pipeline — Counters from the shared pipeline state.
async fn pipeline_status(State(state): State<AppState>) -> Json<PipelineStatus> {
    let native_mode = match &state.native_mode {
        Some(handle) if handle.is_engaged() => "raw",
        Some(_) => "typed",
        None => "disabled",
    };
    Json(PipelineStatus {
        watched_addresses: state.watch.len(),
        dedup_records: state.dedup.len(),
        cached_prices: state.oracle.cached_count(),
        queue_pending: state.queue.pending(),
        queue_dropped: state.queue.dropped(),
        native_mode,
    })
}
