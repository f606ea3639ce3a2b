use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::middleware::auth::AuthUser;
use crate::models::ExamResult;
use crate::response::{now_iso, success, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    score_percent: f64,
    #[serde(default)]
    struggles: Vec<String>,
    #[serde(default)]
    hints_used: u32,
}

/// Record a completed exam and adapt its difficulty from the model's
/// recommendation. The analysis itself never fails; question
/// regeneration can.
pub async fn analyze(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = super::parse_json(payload)?;
    if !(0.0..=100.0).contains(&payload.score_percent) {
        return Err(ApiError::validation(
            "scorePercent must be between 0 and 100",
        ));
    }

    let result = ExamResult {
        exam_id: id.clone(),
        student_id: auth_user.id.clone(),
        score_percent: payload.score_percent,
        struggles: payload.struggles,
        hints_used: payload.hints_used,
        completed_at: now_iso(),
    };

    let outcome = state.pipeline().analyze_exam(&id, result).await?;
    Ok(success("Performance analyzed successfully", outcome))
}
