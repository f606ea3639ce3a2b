use crate::db::{collections, FirestoreClient, StoreError};
use crate::models::PipelineJob;

/// One job document per curriculum, keyed deterministically so a resumed
/// run finds its predecessor's step record.
pub async fn get_job(
    client: &FirestoreClient,
    curriculum_id: &str,
) -> Result<Option<PipelineJob>, StoreError> {
    let id = format!("job-{curriculum_id}");
    match client.get_document(collections::PROCESSING_JOBS, &id).await? {
        Some(doc) => Ok(Some(doc.into_typed("id")?)),
        None => Ok(None),
    }
}

pub async fn put_job(client: &FirestoreClient, job: &PipelineJob) -> Result<(), StoreError> {
    let fields = super::to_fields(job)?;
    // Upsert: patch touches only named fields and creates the document
    // when missing, which covers both the first write and step updates.
    client
        .patch_document(collections::PROCESSING_JOBS, &job.id, &fields)
        .await?;
    Ok(())
}

pub async fn delete_job(client: &FirestoreClient, curriculum_id: &str) -> Result<(), StoreError> {
    let id = format!("job-{curriculum_id}");
    client
        .delete_document(collections::PROCESSING_JOBS, &id)
        .await
}
