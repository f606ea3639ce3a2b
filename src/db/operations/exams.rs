use serde_json::{Map, Value};

use crate::db::{collections, FirestoreClient, StoreError};
use crate::models::{Exam, ExamResult, Question};

pub async fn create_exam(client: &FirestoreClient, exam: &Exam) -> Result<Exam, StoreError> {
    let fields = super::to_fields(exam)?;
    let stored = client
        .create_document(collections::EXAMS, Some(&exam.id), &fields)
        .await?;
    stored.into_typed("id")
}

pub async fn get_by_id(client: &FirestoreClient, id: &str) -> Result<Option<Exam>, StoreError> {
    match client.get_document(collections::EXAMS, id).await? {
        Some(doc) => Ok(Some(doc.into_typed("id")?)),
        None => Ok(None),
    }
}

pub async fn find_by_lesson(
    client: &FirestoreClient,
    lesson_id: &str,
) -> Result<Option<Exam>, StoreError> {
    let docs = client
        .run_query(
            collections::EXAMS,
            "lessonId",
            &Value::String(lesson_id.to_string()),
        )
        .await?;
    match docs.into_iter().next() {
        Some(doc) => Ok(Some(doc.into_typed("id")?)),
        None => Ok(None),
    }
}

/// Difficulty adaptation regenerates questions wholesale; nothing merges.
pub async fn replace_questions(
    client: &FirestoreClient,
    exam_id: &str,
    difficulty: u8,
    questions: &[Question],
    now: &str,
) -> Result<Exam, StoreError> {
    let mut fields = Map::new();
    fields.insert("difficulty".to_string(), Value::from(difficulty as i64));
    fields.insert("questions".to_string(), serde_json::to_value(questions)?);
    fields.insert("updatedAt".to_string(), Value::String(now.to_string()));

    let stored = client
        .patch_document(collections::EXAMS, exam_id, &fields)
        .await?;
    stored.into_typed("id")
}

pub async fn record_result(
    client: &FirestoreClient,
    result: &ExamResult,
) -> Result<(), StoreError> {
    let fields = super::to_fields(result)?;
    client
        .create_document(collections::STUDENT_PROGRESS, None, &fields)
        .await?;
    Ok(())
}

pub async fn list_results_by_student(
    client: &FirestoreClient,
    student_id: &str,
) -> Result<Vec<ExamResult>, StoreError> {
    let docs = client
        .run_query(
            collections::STUDENT_PROGRESS,
            "studentId",
            &Value::String(student_id.to_string()),
        )
        .await?;
    docs.into_iter().map(|doc| doc.into_typed("id")).collect()
}
