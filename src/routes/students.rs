use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::db::operations::{exams, users};
use crate::middleware::auth::AuthUser;
use crate::models::{ExamResult, Role};
use crate::response::{success, ApiError};
use crate::state::AppState;

#[derive(Serialize)]
struct ResultsData {
    results: Vec<ExamResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportRequest {
    #[serde(default)]
    emotional_state: String,
    #[serde(default)]
    context: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SupportData {
    message: String,
    audio_url: Option<String>,
}

/// Short encouragement tuned to how the student is feeling right now.
pub async fn emotional_support(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    payload: Result<Json<SupportRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = super::parse_json(payload)?;
    if payload.emotional_state.trim().is_empty() {
        return Err(ApiError::validation("emotionalState is required"));
    }

    let (message, audio_url) = state
        .pipeline()
        .emotional_support(&payload.emotional_state, &payload.context)
        .await;

    Ok(success(
        "Support message generated",
        SupportData { message, audio_url },
    ))
}

/// Exam history for one student: visible to the student themself, to a
/// guardian assigned to them, and to legacy admins.
pub async fn exam_results(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(student_id): Path<String>,
) -> Result<Response, ApiError> {
    ensure_student_access(&state, &auth_user, &student_id).await?;

    let results = exams::list_results_by_student(&state.store(), &student_id).await?;
    Ok(success("Success", ResultsData { results }))
}

async fn ensure_student_access(
    state: &AppState,
    auth_user: &AuthUser,
    student_id: &str,
) -> Result<(), ApiError> {
    if auth_user.role == Role::Admin || auth_user.id == student_id {
        return Ok(());
    }

    if auth_user.role == Role::Guardian {
        let Some(guardian) = users::get_by_id(&state.store(), &auth_user.id).await? else {
            return Err(ApiError::authentication("Guardian profile not found"));
        };
        if guardian.student_ids.iter().any(|id| id == student_id) {
            return Ok(());
        }
    }

    tracing::warn!(
        user_id = %auth_user.id,
        student_id,
        "student access denied"
    );
    Err(ApiError::authorization(
        "You do not have access to this student",
    ))
}
