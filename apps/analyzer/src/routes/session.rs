//! Axum route handlers for the auth session.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::client::{Readiness, Session};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: Session,
    pub platform: Readiness,
    pub global_error: Option<String>,
}

fn snapshot(state: &AppState) -> Json<SessionResponse> {
    Json(SessionResponse {
        session: state.client.auth().session(),
        platform: state.client.readiness(),
        global_error: state.client.global_error(),
    })
}

/// GET /api/v1/session
pub async fn handle_get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    snapshot(&state)
}

/// POST /api/v1/session/sign-in
pub async fn handle_sign_in(State(state): State<AppState>) -> Json<SessionResponse> {
    state.client.auth().sign_in().await;
    snapshot(&state)
}

/// POST /api/v1/session/sign-out
pub async fn handle_sign_out(State(state): State<AppState>) -> Json<SessionResponse> {
    state.client.auth().sign_out().await;
    snapshot(&state)
}

/// DELETE /api/v1/session/error
/// Dismisses the last platform error.
pub async fn handle_clear_error(State(state): State<AppState>) -> Json<SessionResponse> {
    state.client.clear_error();
    snapshot(&state)
}

/// POST /api/v1/session/refresh
pub async fn handle_refresh(State(state): State<AppState>) -> Json<SessionResponse> {
    state.client.auth().refresh_user().await;
    snapshot(&state)
}
