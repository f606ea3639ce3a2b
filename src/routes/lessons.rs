use axum::extract::{Path, State};
use axum::response::Response;
use axum::Extension;
use serde::Serialize;

use crate::db::operations::{exams, lessons};
use crate::middleware::auth::AuthUser;
use crate::models::{Exam, Lesson};
use crate::response::{success, ApiError};
use crate::state::AppState;

#[derive(Serialize)]
struct LessonData {
    lesson: Lesson,
}

#[derive(Serialize)]
struct ExamData {
    exam: Exam,
}

pub async fn get_one(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let lesson = load_accessible_lesson(&state, &auth_user, &id).await?;
    Ok(success("Success", LessonData { lesson }))
}

pub async fn get_exam(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let lesson = load_accessible_lesson(&state, &auth_user, &id).await?;
    let Some(exam) = exams::find_by_lesson(&state.store(), &lesson.id).await? else {
        return Err(ApiError::not_found("Exam not found"));
    };
    Ok(success("Success", ExamData { exam }))
}

/// Lesson access follows the parent curriculum's visibility rules.
async fn load_accessible_lesson(
    state: &AppState,
    auth_user: &AuthUser,
    lesson_id: &str,
) -> Result<Lesson, ApiError> {
    let Some(lesson) = lessons::get_by_id(&state.store(), lesson_id).await? else {
        return Err(ApiError::not_found("Lesson not found"));
    };
    super::curricula::load_accessible(state, auth_user, &lesson.curriculum_id).await?;
    Ok(lesson)
}
