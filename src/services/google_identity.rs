//! Google ID-token verification for the federated sign-in flow.
//!
//! Tokens are checked once at sign-in against the tokeninfo endpoint;
//! sessions always use the application's own signed tokens afterwards.

use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Email not provided by Google")]
    MissingEmail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleIdentity {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
}

#[derive(Clone)]
pub struct GoogleIdentityClient {
    client: reqwest::Client,
    expected_audience: Option<String>,
}

impl GoogleIdentityClient {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            expected_audience: config.google_identity_audience.clone(),
        }
    }

    pub async fn verify_id_token(&self, id_token: &str) -> Result<GoogleIdentity, IdentityError> {
        let response = self
            .client
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IdentityError::InvalidToken);
        }

        let identity: GoogleIdentity = response
            .json()
            .await
            .map_err(|_| IdentityError::InvalidToken)?;

        if let Some(expected) = &self.expected_audience {
            if identity.aud.as_deref() != Some(expected.as_str()) {
                return Err(IdentityError::InvalidToken);
            }
        }

        if identity.email.as_deref().unwrap_or("").is_empty() {
            return Err(IdentityError::MissingEmail);
        }

        Ok(identity)
    }
}

/// Split a provider display name into first/last the way the original
/// accounts were created: first word, then the rest.
pub fn split_display_name(name: Option<&str>) -> (String, String) {
    let Some(name) = name else {
        return (String::new(), String::new());
    };
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or("").to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_splits_first_and_rest() {
        assert_eq!(
            split_display_name(Some("Ada Lovelace King")),
            ("Ada".to_string(), "Lovelace King".to_string())
        );
        assert_eq!(
            split_display_name(Some("Prince")),
            ("Prince".to_string(), String::new())
        );
        assert_eq!(split_display_name(None), (String::new(), String::new()));
    }
}
