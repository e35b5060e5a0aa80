pub mod health;
pub mod resumes;
pub mod session;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session
        .route("/api/v1/session", get(session::handle_get_session))
        .route("/api/v1/session/sign-in", post(session::handle_sign_in))
        .route("/api/v1/session/sign-out", post(session::handle_sign_out))
        .route("/api/v1/session/refresh", post(session::handle_refresh))
        .route("/api/v1/session/error", delete(session::handle_clear_error))
        // Resumes
        .route("/api/v1/resumes", get(resumes::handle_list_resumes))
        .route("/api/v1/resumes/:id", get(resumes::handle_get_resume))
        .route(
            "/api/v1/resumes/analyze",
            post(resumes::handle_analyze).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}
