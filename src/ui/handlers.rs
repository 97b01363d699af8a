//! HTTP API handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::{self, Stream};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::CandidateId;
use crate::error::{Error, SessionError};
use crate::game::{GameSnapshot, SessionResult};
use crate::playback::Ticket;
use crate::ui::server::AppState;

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

type ActionResponse = (StatusCode, Json<ApiResponse<GameSnapshot>>);

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Session(SessionError::UnknownCandidate(_)) => StatusCode::BAD_REQUEST,
        Error::Session(_) | Error::Playback(_) => StatusCode::CONFLICT,
        Error::Stopped => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Answer an action with the snapshot it produced
fn respond(state: &AppState, outcome: crate::Result<()>) -> ActionResponse {
    match outcome {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::ok(state.game.snapshot()))),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

/// Current game snapshot
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<ApiResponse<GameSnapshot>> {
    Json(ApiResponse::ok(state.game.snapshot()))
}

#[derive(Deserialize)]
pub struct SelectRequest {
    pub id: CandidateId,
}

pub async fn select(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectRequest>,
) -> ActionResponse {
    let outcome = state.game.select(req.id).await;
    respond(&state, outcome)
}

pub async fn clear_selection(State(state): State<Arc<AppState>>) -> ActionResponse {
    let outcome = state.game.clear_selection().await;
    respond(&state, outcome)
}

pub async fn confirm(State(state): State<Arc<AppState>>) -> ActionResponse {
    let outcome = state.game.confirm().await;
    respond(&state, outcome)
}

pub async fn skip(State(state): State<Arc<AppState>>) -> ActionResponse {
    let outcome = state.game.skip().await;
    respond(&state, outcome)
}

/// Retry blocked playback; the client calls this from a tap or click
pub async fn retry(State(state): State<Arc<AppState>>) -> ActionResponse {
    let outcome = state.game.retry().await;
    respond(&state, outcome)
}

pub async fn restart(State(state): State<Arc<AppState>>) -> ActionResponse {
    let outcome = state.game.restart().await;
    respond(&state, outcome)
}

#[derive(Deserialize)]
pub struct MediaEndedRequest {
    pub ticket: Ticket,
}

#[derive(Deserialize)]
pub struct MediaErrorRequest {
    pub ticket: Ticket,
    #[serde(default)]
    pub reason: String,
}

/// Queued media reports are answered before the game applies them
fn accepted(state: &AppState, outcome: crate::Result<()>) -> ActionResponse {
    match outcome {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(ApiResponse::ok(state.game.snapshot())),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

/// The client's audio element finished the preview
pub async fn media_ended(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MediaEndedRequest>,
) -> ActionResponse {
    let outcome = state.game.media_ended(req.ticket);
    accepted(&state, outcome)
}

/// The client's audio element failed to play the preview
pub async fn media_error(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MediaErrorRequest>,
) -> ActionResponse {
    tracing::debug!(candidate = %req.ticket.candidate, reason = %req.reason, "Client media error");
    let outcome = state.game.media_error(req.ticket, req.reason);
    accepted(&state, outcome)
}

/// Final result once the session has ended
pub async fn get_result(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<SessionResult>>) {
    match state.game.snapshot().result {
        Some(result) => (StatusCode::OK, Json(ApiResponse::ok(result))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Session has not ended yet")),
        ),
    }
}

/// Snapshot stream; one `snapshot` event per state change
pub async fn event_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("SSE client connected");
    let rx = state.game.subscribe();

    let stream = stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let snapshot = rx.borrow_and_update().clone();
        let event = Event::default()
            .event("snapshot")
            .json_data(&snapshot)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to serialize snapshot");
                Event::default().comment("serialization error")
            });
        Some((Ok(event), (rx, false)))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
