use serde_json::{Map, Value};

use crate::db::{collections, FirestoreClient, StoreError, StoredDocument};
use crate::models::{Curriculum, CurriculumStatus};

pub async fn create_curriculum(
    client: &FirestoreClient,
    curriculum: &Curriculum,
) -> Result<Curriculum, StoreError> {
    let fields = super::to_fields(curriculum)?;
    let stored = client
        .create_document(collections::CURRICULA, Some(&curriculum.id), &fields)
        .await?;
    stored.into_typed("id")
}

pub async fn get_by_id(
    client: &FirestoreClient,
    id: &str,
) -> Result<Option<Curriculum>, StoreError> {
    match client.get_document(collections::CURRICULA, id).await? {
        Some(doc) => Ok(Some(doc.into_typed("id")?)),
        None => Ok(None),
    }
}

/// Raw read keeping the document's `updateTime`, for the CAS transition.
pub async fn get_raw(
    client: &FirestoreClient,
    id: &str,
) -> Result<Option<StoredDocument>, StoreError> {
    client.get_document(collections::CURRICULA, id).await
}

pub async fn list_by_teacher(
    client: &FirestoreClient,
    teacher_id: &str,
) -> Result<Vec<Curriculum>, StoreError> {
    let docs = client
        .run_query(
            collections::CURRICULA,
            "teacherId",
            &Value::String(teacher_id.to_string()),
        )
        .await?;
    docs.into_iter().map(|doc| doc.into_typed("id")).collect()
}

/// Compare-and-swap status transition guarded by the document's last-seen
/// update time. A concurrent writer makes this fail with
/// `StoreError::PreconditionFailed`, which the pipeline maps to 409.
pub async fn transition_status(
    client: &FirestoreClient,
    id: &str,
    to: CurriculumStatus,
    seen_update_time: &str,
    now: &str,
) -> Result<Curriculum, StoreError> {
    let mut fields = Map::new();
    fields.insert(
        "status".to_string(),
        Value::String(to.as_str().to_string()),
    );
    fields.insert("updatedAt".to_string(), Value::String(now.to_string()));

    let stored = client
        .patch_document_if_unchanged(collections::CURRICULA, id, &fields, seen_update_time)
        .await?;
    stored.into_typed("id")
}

pub async fn mark_ready(
    client: &FirestoreClient,
    id: &str,
    lesson_count: u32,
    now: &str,
) -> Result<Curriculum, StoreError> {
    let mut fields = Map::new();
    fields.insert(
        "status".to_string(),
        Value::String(CurriculumStatus::Ready.as_str().to_string()),
    );
    fields.insert("lessonCount".to_string(), Value::from(lesson_count as i64));
    fields.insert("errorMessage".to_string(), Value::Null);
    fields.insert("updatedAt".to_string(), Value::String(now.to_string()));

    let stored = client
        .patch_document(collections::CURRICULA, id, &fields)
        .await?;
    stored.into_typed("id")
}

pub async fn mark_error(
    client: &FirestoreClient,
    id: &str,
    message: &str,
    now: &str,
) -> Result<(), StoreError> {
    let mut fields = Map::new();
    fields.insert(
        "status".to_string(),
        Value::String(CurriculumStatus::Error.as_str().to_string()),
    );
    fields.insert(
        "errorMessage".to_string(),
        Value::String(message.to_string()),
    );
    fields.insert("updatedAt".to_string(), Value::String(now.to_string()));

    client
        .patch_document(collections::CURRICULA, id, &fields)
        .await?;
    Ok(())
}
