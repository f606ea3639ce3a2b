use axum::extract::{Multipart, Path, State};
use axum::response::Response;
use axum::Extension;
use serde::Serialize;

use crate::db::operations::{curricula, lessons};
use crate::middleware::auth::{ensure_role, AuthUser};
use crate::models::{Curriculum, CurriculumStatus, Role};
use crate::response::{created, success, ApiError};
use crate::services::pipeline::UploadInput;
use crate::state::AppState;

#[derive(Serialize)]
struct CurriculumData {
    curriculum: Curriculum,
}

#[derive(Serialize)]
struct CurriculaData {
    curricula: Vec<Curriculum>,
}

#[derive(Serialize)]
struct LessonsData {
    lessons: Vec<crate::models::Lesson>,
}

/// Multipart upload: metadata fields plus one `file` part.
pub async fn create(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    ensure_role(&auth_user, &[Role::Teacher])?;

    let mut title = String::new();
    let mut subject = String::new();
    let mut grade_level = String::new();
    let mut description = String::new();
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::validation("Malformed multipart request"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = read_text(field).await?,
            "subject" => subject = read_text(field).await?,
            "gradeLevel" => grade_level = read_text(field).await?,
            "description" => description = read_text(field).await?,
            "file" => {
                let file_name = sanitize_file_name(field.file_name().unwrap_or("upload.bin"));
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::validation("File upload error"))?;
                file = Some((file_name, mime_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    if title.trim().is_empty() {
        return Err(ApiError::validation_fields(
            "Validation error",
            vec!["title is required".to_string()],
        ));
    }
    let Some((file_name, mime_type, bytes)) = file else {
        return Err(ApiError::validation_fields(
            "Validation error",
            vec!["file is required".to_string()],
        ));
    };

    let curriculum = state
        .pipeline()
        .ingest_upload(UploadInput {
            teacher_id: auth_user.id,
            title,
            subject,
            grade_level,
            description,
            file_name,
            mime_type,
            bytes,
        })
        .await?;

    Ok(created(
        "Curriculum uploaded successfully",
        CurriculumData { curriculum },
    ))
}

pub async fn list_own(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    ensure_role(&auth_user, &[Role::Teacher])?;

    let curricula = curricula::list_by_teacher(&state.store(), &auth_user.id).await?;
    Ok(success("Success", CurriculaData { curricula }))
}

pub async fn get_one(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let curriculum = load_accessible(&state, &auth_user, &id).await?;
    Ok(success("Success", CurriculumData { curriculum }))
}

pub async fn process(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    ensure_role(&auth_user, &[Role::Teacher])?;
    ensure_ownership(&state, &auth_user, &id).await?;

    let curriculum = state.pipeline().process_curriculum(&id).await?;
    Ok(success(
        "Curriculum processed successfully",
        CurriculumData { curriculum },
    ))
}

pub async fn list_lessons(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let _curriculum = load_accessible(&state, &auth_user, &id).await?;
    let lessons = lessons::list_by_curriculum(&state.store(), &id).await?;
    Ok(success("Success", LessonsData { lessons }))
}

/// Owners (and legacy admins) see a curriculum in any state; students and
/// guardians only once it is ready.
pub(crate) async fn load_accessible(
    state: &AppState,
    auth_user: &AuthUser,
    curriculum_id: &str,
) -> Result<Curriculum, ApiError> {
    let Some(curriculum) = curricula::get_by_id(&state.store(), curriculum_id).await? else {
        return Err(ApiError::not_found("Curriculum not found"));
    };

    let is_owner = curriculum.teacher_id == auth_user.id;
    if is_owner || auth_user.role == Role::Admin {
        return Ok(curriculum);
    }
    if curriculum.status == CurriculumStatus::Ready {
        return Ok(curriculum);
    }
    Err(ApiError::authorization(
        "You do not have access to this curriculum",
    ))
}

async fn ensure_ownership(
    state: &AppState,
    auth_user: &AuthUser,
    curriculum_id: &str,
) -> Result<(), ApiError> {
    let Some(curriculum) = curricula::get_by_id(&state.store(), curriculum_id).await? else {
        return Err(ApiError::not_found("Curriculum not found"));
    };
    if curriculum.teacher_id == auth_user.id || auth_user.role == Role::Admin {
        return Ok(());
    }
    Err(ApiError::authorization(
        "You do not have access to this curriculum",
    ))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|_| ApiError::validation("Malformed multipart request"))
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_sanitized_for_object_paths() {
        assert_eq!(sanitize_file_name("My Lesson (v2).pdf"), "My_Lesson__v2_.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name(""), "upload.bin");
    }
}
