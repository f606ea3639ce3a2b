pub mod operations;
pub mod value;

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::Config;
use crate::response::ApiError;

/// Firestore collections.
pub mod collections {
    pub const USERS: &str = "users";
    pub const CURRICULA: &str = "curricula";
    pub const LESSONS: &str = "lessons";
    pub const LEARNING_MATERIALS: &str = "learningMaterials";
    pub const STUDENT_PROGRESS: &str = "studentProgress";
    pub const EXAMS: &str = "exams";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const ANALYTICS: &str = "analytics";
    pub const PROCESSING_JOBS: &str = "processingJobs";
}

/// Firestore subcollections.
pub mod subcollections {
    pub const LESSONS: &str = "lessons";
    pub const LESSON_PROGRESS: &str = "lessonProgress";
    pub const EXAM_RESULTS: &str = "examResults";
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{message}")]
    Upstream {
        status: reqwest::StatusCode,
        grpc_status: String,
        message: String,
    },
    #[error("precondition failed")]
    PreconditionFailed,
    #[error("decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PreconditionFailed => {
                ApiError::conflict("Resource was modified concurrently")
            }
            other => ApiError::upstream(other.to_string()),
        }
    }
}

/// Maps Firestore's gRPC status names to the messages the API surfaces.
/// Unrecognized codes fall back to the upstream message.
fn translate_grpc_status(grpc_status: &str, upstream_message: &str) -> String {
    match grpc_status {
        "NOT_FOUND" => "Database not found or not configured properly".to_string(),
        "PERMISSION_DENIED" => "Permission denied".to_string(),
        "UNAUTHENTICATED" => "Unauthenticated request".to_string(),
        _ if !upstream_message.is_empty() => upstream_message.to_string(),
        _ => "Database error".to_string(),
    }
}

/// A document read back from the store: its id plus decoded fields.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Map<String, Value>,
    pub update_time: Option<String>,
}

impl StoredDocument {
    /// Deserialize into a domain type, injecting the document id.
    pub fn into_typed<T: serde::de::DeserializeOwned>(self, id_field: &str) -> Result<T, StoreError> {
        let mut fields = self.fields;
        fields.insert(id_field.to_string(), Value::String(self.id));
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

/// Firestore REST client. Constructed once at startup and injected through
/// `AppState`; every method is a single HTTP round trip.
#[derive(Clone)]
pub struct FirestoreClient {
    client: reqwest::Client,
    base_url: String,
    parent: String,
    access_token: Option<String>,
}

impl FirestoreClient {
    pub fn new(config: &Config) -> Self {
        let base_url = match &config.firestore_emulator_host {
            Some(host) => format!("http://{host}/v1"),
            None => "https://firestore.googleapis.com/v1".to_string(),
        };
        let parent = format!(
            "projects/{}/databases/{}/documents",
            config.gcp_project_id, config.firestore_database_id
        );
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url,
            parent,
            access_token: config.gcp_access_token.clone(),
        }
    }

    pub fn is_available(&self) -> bool {
        !self.parent.starts_with("projects//")
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn create_document(
        &self,
        collection: &str,
        document_id: Option<&str>,
        fields: &Map<String, Value>,
    ) -> Result<StoredDocument, StoreError> {
        let mut url = format!("{}/{}/{}", self.base_url, self.parent, collection);
        if let Some(id) = document_id {
            url.push_str(&format!("?documentId={}", urlencoding::encode(id)));
        }

        let body = json!({ "fields": value::encode_fields(fields) });
        let response = self.request(reqwest::Method::POST, url).json(&body).send().await?;
        self.parse_document(response).await
    }

    pub async fn get_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let url = format!(
            "{}/{}/{}/{}",
            self.base_url,
            self.parent,
            collection,
            urlencoding::encode(document_id)
        );
        let response = self.request(reqwest::Method::GET, url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(self.parse_document(response).await?))
    }

    /// Patch the named fields of a document. Only the fields present in
    /// `fields` are touched (updateMask mirrors the keys).
    pub async fn patch_document(
        &self,
        collection: &str,
        document_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<StoredDocument, StoreError> {
        self.patch_inner(collection, document_id, fields, None).await
    }

    /// Patch guarded by the document's last-seen `updateTime`. Firestore
    /// rejects the write with FAILED_PRECONDITION when the document moved
    /// underneath us; that surfaces as `StoreError::PreconditionFailed`.
    pub async fn patch_document_if_unchanged(
        &self,
        collection: &str,
        document_id: &str,
        fields: &Map<String, Value>,
        update_time: &str,
    ) -> Result<StoredDocument, StoreError> {
        self.patch_inner(collection, document_id, fields, Some(update_time))
            .await
    }

    async fn patch_inner(
        &self,
        collection: &str,
        document_id: &str,
        fields: &Map<String, Value>,
        update_time: Option<&str>,
    ) -> Result<StoredDocument, StoreError> {
        let mut url = format!(
            "{}/{}/{}/{}",
            self.base_url,
            self.parent,
            collection,
            urlencoding::encode(document_id)
        );

        let mut query: Vec<String> = fields
            .keys()
            .map(|key| format!("updateMask.fieldPaths={}", urlencoding::encode(key)))
            .collect();
        if let Some(time) = update_time {
            query.push(format!(
                "currentDocument.updateTime={}",
                urlencoding::encode(time)
            ));
        }
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }

        let body = json!({ "fields": value::encode_fields(fields) });
        let response = self.request(reqwest::Method::PATCH, url).json(&body).send().await?;

        if update_time.is_some()
            && (response.status() == reqwest::StatusCode::CONFLICT
                || response.status() == reqwest::StatusCode::BAD_REQUEST
                || response.status() == reqwest::StatusCode::PRECONDITION_FAILED)
        {
            return Err(StoreError::PreconditionFailed);
        }

        self.parse_document(response).await
    }

    pub async fn delete_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<(), StoreError> {
        let url = format!(
            "{}/{}/{}/{}",
            self.base_url,
            self.parent,
            collection,
            urlencoding::encode(document_id)
        );
        let response = self.request(reqwest::Method::DELETE, url).send().await?;
        if response.status().is_success() || response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(self.error_from_response(response).await)
    }

    /// Single-field equality query over one collection.
    pub async fn run_query(
        &self,
        collection: &str,
        field: &str,
        equals: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let url = format!("{}/{}:runQuery", self.base_url, self.parent);
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field },
                        "op": "EQUAL",
                        "value": value::to_firestore_value(equals),
                    }
                }
            }
        });

        let response = self.request(reqwest::Method::POST, url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        // :runQuery streams one JSON object per matched document.
        let rows: Vec<Value> = response.json().await?;
        let mut documents = Vec::new();
        for row in rows {
            let Some(doc) = row.get("document") else {
                continue;
            };
            documents.push(decode_document(doc)?);
        }
        Ok(documents)
    }

    async fn parse_document(&self, response: reqwest::Response) -> Result<StoredDocument, StoreError> {
        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }
        let body: Value = response.json().await?;
        decode_document(&body)
    }

    async fn error_from_response(&self, response: reqwest::Response) -> StoreError {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let grpc_status = body
            .pointer("/error/status")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let upstream_message = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("");
        let message = translate_grpc_status(&grpc_status, upstream_message);
        StoreError::Upstream {
            status,
            grpc_status,
            message,
        }
    }
}

fn decode_document(doc: &Value) -> Result<StoredDocument, StoreError> {
    let name = doc.get("name").and_then(Value::as_str).unwrap_or("");
    let id = name.rsplit('/').next().unwrap_or("").to_string();
    let fields = doc
        .get("fields")
        .and_then(Value::as_object)
        .map(value::decode_fields)
        .unwrap_or_default();
    let update_time = doc
        .get("updateTime")
        .and_then(Value::as_str)
        .map(|s| s.to_string());

    Ok(StoredDocument {
        id,
        fields,
        update_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grpc_status_translation_table() {
        assert_eq!(
            translate_grpc_status("NOT_FOUND", "raw"),
            "Database not found or not configured properly"
        );
        assert_eq!(translate_grpc_status("PERMISSION_DENIED", ""), "Permission denied");
        assert_eq!(
            translate_grpc_status("UNAUTHENTICATED", ""),
            "Unauthenticated request"
        );
        assert_eq!(translate_grpc_status("ABORTED", "tx aborted"), "tx aborted");
        assert_eq!(translate_grpc_status("", ""), "Database error");
    }

    #[test]
    fn document_name_parses_to_id() {
        let doc = serde_json::json!({
            "name": "projects/p/databases/(default)/documents/users/abc123",
            "fields": { "email": { "stringValue": "a@b.co" } },
            "updateTime": "2024-05-01T10:00:00.000000Z"
        });
        let stored = decode_document(&doc).unwrap();
        assert_eq!(stored.id, "abc123");
        assert_eq!(stored.fields["email"], "a@b.co");
        assert_eq!(stored.update_time.as_deref(), Some("2024-05-01T10:00:00.000000Z"));
    }
}
