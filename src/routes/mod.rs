mod auth;
mod curricula;
mod exams;
mod health;
mod lessons;
mod students;

use axum::extract::rejection::JsonRejection;
use axum::extract::DefaultBodyLimit;
use axum::http::Uri;
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::middleware::auth::require_auth;
use crate::response::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let prefix = state.config().api_prefix();
    let max_upload = state.config().max_file_size;

    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/google", post(auth::google_sign_in))
        .route("/auth/anonymous", post(auth::anonymous_sign_in));

    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/link-account", post(auth::link_account))
        .route(
            "/curricula",
            post(curricula::create).get(curricula::list_own),
        )
        .route("/curricula/:id", get(curricula::get_one))
        .route("/curricula/:id/process", post(curricula::process))
        .route("/curricula/:id/lessons", get(curricula::list_lessons))
        .route("/lessons/:id", get(lessons::get_one))
        .route("/lessons/:id/exam", get(lessons::get_exam))
        .route("/exams/:id/analyze", post(exams::analyze))
        .route("/students/:id/results", get(students::exam_results))
        .route("/support", post(students::emotional_support))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health::health))
        .route("/", get(health::info))
        .nest(&prefix, public.merge(protected))
        .fallback(not_found)
        // Uploads dominate request size; everything else is small JSON.
        .layer(DefaultBodyLimit::max(max_upload + 64 * 1024))
        .with_state(state)
}

async fn not_found(uri: Uri) -> Response {
    use axum::response::IntoResponse;
    ApiError::not_found(format!("Route not found: {}", uri.path())).into_response()
}

/// Unwrap a JSON body, turning axum's rejection into the standard
/// validation envelope instead of its bare-text response.
pub(crate) fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError::validation(format!(
            "Invalid request body: {}",
            rejection.body_text()
        ))),
    }
}
