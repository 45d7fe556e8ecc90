//! HTTP status surface.

use crate::session::SessionSummary;
use crate::AppState;
use axum::{extract::Extension, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Health check handler.
///
/// Returns `200 OK` with status, version, the current activity line, and
/// the number of active sessions.
async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "activity": state.activity(),
        "sessions": state.registry.len(),
    }))
}

/// Lists active sessions, oldest first.
async fn list_sessions(Extension(state): Extension<Arc<AppState>>) -> Json<Vec<SessionSummary>> {
    let mut sessions: Vec<SessionSummary> = state
        .registry
        .snapshot()
        .iter()
        .map(|session| session.summary())
        .collect();
    sessions.sort_by(|a, b| {
        a.joined_at
            .cmp(&b.joined_at)
            .then_with(|| a.guild_id.cmp(&b.guild_id))
    });
    Json(sessions)
}

/// Builds the status router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", get(list_sessions))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
