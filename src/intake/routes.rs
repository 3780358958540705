//! REST endpoints for the intake conversation.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use crate::error::IntakeError;

use super::orchestrator::{IntakeOrchestrator, IntakeSession};
use super::state::IntakePhase;

/// Shared state for intake routes.
#[derive(Clone)]
pub struct IntakeRouteState {
    pub orchestrator: Arc<IntakeOrchestrator>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    /// Session from the previous response; omitted on the first turn.
    #[serde(default)]
    state: Option<IntakeSession>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
    state: IntakeSession,
    customer_info: serde_json::Map<String, serde_json::Value>,
    is_complete: bool,
    current_phase: IntakePhase,
}

#[derive(Debug, Deserialize)]
struct SummaryRequest {
    state: IntakeSession,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "car-sales-assist"
    }))
}

/// POST /api/chat
///
/// Runs one turn. Collaborator failures still answer 200 with the apology
/// and the unchanged state, so the client can simply resend.
async fn chat(
    State(state): State<IntakeRouteState>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let session = req.state.unwrap_or_default();
    let outcome = state
        .orchestrator
        .process_message(session, &req.message)
        .await;

    let session = outcome.session;
    Json(ChatResponse {
        response: outcome.reply,
        customer_info: session.record.filled_fields(),
        is_complete: session.is_complete(),
        current_phase: session.phase(),
        state: session,
    })
}

/// POST /api/summary
///
/// Summary of a finished session, or a list of what is still missing.
/// A session whose phase or completion flag disagrees with its record is
/// answered with 422.
async fn summary(
    State(state): State<IntakeRouteState>,
    Json(req): Json<SummaryRequest>,
) -> impl IntoResponse {
    let session = req.state;
    match state
        .orchestrator
        .summaries()
        .generate(&session.record, &session.state, &session.history)
        .await
    {
        Ok(summary) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "summary": summary.text,
                "is_complete": summary.is_complete,
                "missing_fields": summary.missing,
            })),
        ),
        Err(IntakeError::InvariantViolation(reason)) => {
            warn!(session_id = %session.session_id, %reason, "Rejected inconsistent session");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({"error": format!("Invalid session state: {reason}")})),
            )
        }
        Err(e) => {
            error!(session_id = %session.session_id, error = %e, "Summary generation failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": "Summary generation failed"})),
            )
        }
    }
}

/// Build the intake REST routes.
pub fn intake_routes(state: IntakeRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/summary", post(summary))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}
