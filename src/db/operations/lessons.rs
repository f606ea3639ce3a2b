use serde_json::Value;

use crate::db::{collections, FirestoreClient, StoreError};
use crate::models::Lesson;

pub async fn create_lesson(
    client: &FirestoreClient,
    lesson: &Lesson,
) -> Result<Lesson, StoreError> {
    let fields = super::to_fields(lesson)?;
    let stored = client
        .create_document(collections::LESSONS, Some(&lesson.id), &fields)
        .await?;
    stored.into_typed("id")
}

pub async fn get_by_id(client: &FirestoreClient, id: &str) -> Result<Option<Lesson>, StoreError> {
    match client.get_document(collections::LESSONS, id).await? {
        Some(doc) => Ok(Some(doc.into_typed("id")?)),
        None => Ok(None),
    }
}

pub async fn list_by_curriculum(
    client: &FirestoreClient,
    curriculum_id: &str,
) -> Result<Vec<Lesson>, StoreError> {
    let docs = client
        .run_query(
            collections::LESSONS,
            "curriculumId",
            &Value::String(curriculum_id.to_string()),
        )
        .await?;
    docs.into_iter().map(|doc| doc.into_typed("id")).collect()
}

pub async fn delete_lesson(client: &FirestoreClient, id: &str) -> Result<(), StoreError> {
    client.delete_document(collections::LESSONS, id).await
}
