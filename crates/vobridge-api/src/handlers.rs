//! Route handler functions for all API endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vobridge_core::types::{Direction, KeyEvent};
use vobridge_listener::ListenerState;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub narrator_enabled: bool,
    pub polling: bool,
    pub latest_phrase_at: Option<DateTime<Utc>>,
    pub publish_count: u64,
    pub uptime_secs: u64,
    pub version: String,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /phrase - latest narrator phrase as plain text.
pub async fn phrase(State(state): State<AppState>) -> Result<String, ApiError> {
    state
        .listener
        .latest_phrase()
        .map(|p| p.text)
        .ok_or_else(|| ApiError::NotFound("No phrase observed yet".to_string()))
}

/// GET /move/{direction} - press and release an arrow key.
///
/// Key events are best-effort: failures are logged and the response is
/// still 200 once the direction parses.
pub async fn move_cursor(
    State(state): State<AppState>,
    Path(direction): Path<String>,
) -> Result<StatusCode, ApiError> {
    let direction = direction
        .parse::<Direction>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let key = direction.key_code();
    for event in [KeyEvent::Down, KeyEvent::Up] {
        if let Err(e) = state.injector.post_key(key, event).await {
            tracing::warn!(%direction, ?event, error = %e, "Key injection failed");
        }
    }
    tracing::debug!(%direction, "Cursor moved");

    Ok(StatusCode::OK)
}

/// GET /move and /move/ - direction missing.
pub async fn move_missing() -> ApiError {
    ApiError::BadRequest("Direction is required".to_string())
}

/// GET /select - run the narrator's primary action on its cursor.
pub async fn select(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.injector.perform_primary_action().await?;
    Ok(StatusCode::OK)
}

/// GET /status - narrator and polling status.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let listener = &state.listener;
    let latest = listener.latest_phrase();

    Json(StatusResponse {
        narrator_enabled: listener.is_narrator_enabled(),
        polling: listener.state() == ListenerState::Active,
        latest_phrase_at: latest.map(|p| p.observed_at),
        publish_count: listener.phrase_slot().publish_count(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
