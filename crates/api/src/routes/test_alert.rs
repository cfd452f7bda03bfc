//! Synthetic alert for checking delivery end to end.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

use sentinel_common::error::AppError;
use sentinel_common::types::{ClassifiedEvent, format_timestamp};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/test/module-installed", post(module_installed))
}

/// POST /api/test/module-installed — Enqueue an important InstallModule alert.
async fn module_installed(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let event = ClassifiedEvent::new(
        "🔴 [TEST] InstallModule",
        format!(
            "📋 Tx: 0xTEST\n🔧 Module: 0xdeadbeef\n⏰ Time: {}",
            format_timestamp(Utc::now())
        ),
        true,
    );
    if !state.queue.push(event) {
        return Err(AppError::Unavailable("notification queue is full".to_string()));
    }
    Ok((StatusCode::ACCEPTED, Json(json!({ "queued": true }))))
}
