use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub api_version: String,

    pub jwt_secret: String,
    pub jwt_expire: String,
    pub jwt_refresh_secret: String,
    pub jwt_refresh_expire: String,
    pub bcrypt_rounds: u32,

    pub cors_origins: Vec<String>,
    pub cors_credentials: bool,

    pub gcp_project_id: String,
    pub gcp_location: String,
    pub gcp_access_token: Option<String>,
    pub firestore_database_id: String,
    pub firestore_emulator_host: Option<String>,

    pub curriculum_bucket: String,
    pub media_bucket: String,
    pub default_bucket: String,

    pub document_ai_processor_id: String,
    pub document_ai_location: String,

    pub vertex_ai_model: String,
    pub vertex_ai_location: String,

    pub tts_language_code: String,
    pub tts_voice_name: String,
    pub tts_audio_encoding: String,

    pub allowed_file_types: Vec<String>,
    pub max_file_size: usize,
    pub upload_dir: String,

    pub google_identity_audience: Option<String>,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env_parse("PORT").unwrap_or(3000);
        let host = env_parse("HOST").unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        let log_level = env_string("RUST_LOG").unwrap_or_else(|| "info".to_string());

        Self {
            host,
            port,
            log_level,
            api_version: env_string("API_VERSION").unwrap_or_else(|| "v1".to_string()),

            jwt_secret: env_string("JWT_SECRET").unwrap_or_default(),
            jwt_expire: env_string("JWT_EXPIRE").unwrap_or_else(|| "1h".to_string()),
            jwt_refresh_secret: env_string("JWT_REFRESH_SECRET").unwrap_or_default(),
            jwt_refresh_expire: env_string("JWT_REFRESH_EXPIRE").unwrap_or_else(|| "7d".to_string()),
            bcrypt_rounds: env_parse("BCRYPT_ROUNDS").unwrap_or(10),

            cors_origins: env_list("CORS_ORIGIN"),
            cors_credentials: env_bool("CORS_CREDENTIALS").unwrap_or(false),

            gcp_project_id: env_string("GOOGLE_CLOUD_PROJECT_ID").unwrap_or_default(),
            gcp_location: env_string("GOOGLE_CLOUD_LOCATION")
                .unwrap_or_else(|| "us-central1".to_string()),
            gcp_access_token: env_string("GOOGLE_ACCESS_TOKEN"),
            firestore_database_id: env_string("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|| "(default)".to_string()),
            firestore_emulator_host: env_string("FIRESTORE_EMULATOR_HOST"),

            curriculum_bucket: env_string("GCS_CURRICULUM_BUCKET")
                .unwrap_or_else(|| "aptx-curriculum-files".to_string()),
            media_bucket: env_string("GCS_MEDIA_BUCKET")
                .unwrap_or_else(|| "aptx-media-files".to_string()),
            default_bucket: env_string("GCS_BUCKET_NAME")
                .unwrap_or_else(|| "aptx-learning-materials".to_string()),

            document_ai_processor_id: env_string("DOCUMENT_AI_PROCESSOR_ID").unwrap_or_default(),
            document_ai_location: env_string("DOCUMENT_AI_LOCATION")
                .unwrap_or_else(|| "us".to_string()),

            vertex_ai_model: env_string("VERTEX_AI_MODEL")
                .unwrap_or_else(|| "gemini-1.5-pro-002".to_string()),
            vertex_ai_location: env_string("VERTEX_AI_LOCATION")
                .unwrap_or_else(|| "us-central1".to_string()),

            tts_language_code: env_string("TTS_LANGUAGE_CODE")
                .unwrap_or_else(|| "en-US".to_string()),
            tts_voice_name: env_string("TTS_VOICE_NAME")
                .unwrap_or_else(|| "en-US-Neural2-C".to_string()),
            tts_audio_encoding: env_string("TTS_AUDIO_ENCODING")
                .unwrap_or_else(|| "MP3".to_string()),

            allowed_file_types: {
                let list = env_list("ALLOWED_FILE_TYPES");
                if list.is_empty() {
                    default_allowed_file_types()
                } else {
                    list
                }
            },
            max_file_size: env_parse("MAX_FILE_SIZE").unwrap_or(DEFAULT_MAX_FILE_SIZE),
            upload_dir: env_string("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),

            google_identity_audience: env_string("GOOGLE_IDENTITY_AUDIENCE"),
            http_timeout: Duration::from_millis(
                env_parse("HTTP_TIMEOUT_MS").unwrap_or(DEFAULT_HTTP_TIMEOUT_MS),
            ),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.api_version)
    }

    pub fn is_mime_allowed(&self, mime: &str) -> bool {
        self.allowed_file_types.iter().any(|allowed| allowed == mime)
    }
}

fn default_allowed_file_types() -> Vec<String> {
    vec![
        "application/pdf".to_string(),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document".to_string(),
        "image/jpeg".to_string(),
        "image/png".to_string(),
    ]
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key)?.parse().ok()
}

fn env_bool(key: &str) -> Option<bool> {
    env_string(key).map(|v| v == "true" || v == "1")
}

fn env_list(key: &str) -> Vec<String> {
    env_string(key)
        .map(|v| {
            v.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mime_allow_list_covers_pdf_and_docx() {
        let types = default_allowed_file_types();
        assert!(types.iter().any(|t| t == "application/pdf"));
        assert!(types
            .iter()
            .any(|t| t.ends_with("wordprocessingml.document")));
    }
}
