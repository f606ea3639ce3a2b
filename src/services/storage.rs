//! Cloud Storage client: media uploads/downloads over the JSON API with
//! public URL derivation.

use thiserror::Error;

use crate::config::Config;

const UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";
const OBJECT_BASE: &str = "https://storage.googleapis.com/storage/v1";
const PUBLIC_BASE: &str = "https://storage.googleapis.com";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("storage upload failed ({status}): {message}")]
    Upload {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("storage download failed ({status})")]
    Download { status: reqwest::StatusCode },
}

#[derive(Clone)]
pub struct StorageClient {
    client: reqwest::Client,
    access_token: Option<String>,
}

impl StorageClient {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            access_token: config.gcp_access_token.clone(),
        }
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Upload raw bytes and return the object's public URL.
    pub async fn upload_bytes(
        &self,
        bucket: &str,
        object: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let url = format!(
            "{UPLOAD_BASE}/b/{bucket}/o?uploadType=media&name={}",
            urlencoding::encode(object)
        );

        let response = self
            .with_auth(self.client.post(&url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Upload {
                status,
                message: message.chars().take(200).collect(),
            });
        }

        let public_url = public_url(bucket, object);
        tracing::info!(%public_url, "file uploaded to Cloud Storage");
        Ok(public_url)
    }

    pub async fn download_bytes(
        &self,
        bucket: &str,
        object: &str,
    ) -> Result<Vec<u8>, StorageError> {
        let url = format!(
            "{OBJECT_BASE}/b/{bucket}/o/{}?alt=media",
            urlencoding::encode(object)
        );

        let response = self.with_auth(self.client.get(&url)).send().await?;
        if !response.status().is_success() {
            return Err(StorageError::Download {
                status: response.status(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn delete_object(&self, bucket: &str, object: &str) -> Result<(), StorageError> {
        let url = format!(
            "{OBJECT_BASE}/b/{bucket}/o/{}",
            urlencoding::encode(object)
        );

        let response = self.with_auth(self.client.delete(&url)).send().await?;
        if response.status().is_success() || response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::info!(object, "file deleted from Cloud Storage");
            return Ok(());
        }
        Err(StorageError::Upload {
            status: response.status(),
            message: "delete failed".to_string(),
        })
    }
}

pub fn public_url(bucket: &str, object: &str) -> String {
    format!("{PUBLIC_BASE}/{bucket}/{object}")
}

/// Inverse of `public_url` for objects in the given bucket.
pub fn object_from_public_url<'a>(url: &'a str, bucket: &str) -> Option<&'a str> {
    url.strip_prefix(PUBLIC_BASE)?
        .strip_prefix('/')?
        .strip_prefix(bucket)?
        .strip_prefix('/')
        .filter(|object| !object.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_shape() {
        assert_eq!(
            public_url("aptx-media-files", "audio/lesson-1.mp3"),
            "https://storage.googleapis.com/aptx-media-files/audio/lesson-1.mp3"
        );
    }

    #[test]
    fn public_url_round_trips_to_object() {
        let url = public_url("aptx-media-files", "audio/questions/q-1.mp3");
        assert_eq!(
            object_from_public_url(&url, "aptx-media-files"),
            Some("audio/questions/q-1.mp3")
        );
        assert_eq!(object_from_public_url(&url, "other-bucket"), None);
        assert_eq!(
            object_from_public_url("https://example.com/x.mp3", "aptx-media-files"),
            None
        );
    }
}
