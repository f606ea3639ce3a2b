//! Text-to-Speech client plus the content-typed audio helpers.
//!
//! Speaking rates are tuned per content type for comprehension: lessons
//! and questions play slower than cards, instructions slowest of all.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::services::storage::{StorageClient, StorageError};

const SYNTHESIZE_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

pub const LESSON_SPEAKING_RATE: f64 = 0.85;
pub const CARD_SPEAKING_RATE: f64 = 0.9;
pub const QUESTION_SPEAKING_RATE: f64 = 0.85;
pub const INSTRUCTION_SPEAKING_RATE: f64 = 0.8;
pub const POSITIVE_FEEDBACK_SPEAKING_RATE: f64 = 1.0;
pub const NEGATIVE_FEEDBACK_SPEAKING_RATE: f64 = 0.9;

const BASE_WORDS_PER_MINUTE: f64 = 150.0;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to generate audio: {0}")]
    Upstream(String),
    #[error("audio payload missing or undecodable")]
    BadAudioPayload,
    #[error("Failed to generate audio: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone)]
pub enum SpeechInput {
    Text(String),
    Ssml(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioArtifact {
    pub audio_url: String,
    pub duration_secs: u32,
    pub file_name: String,
}

#[derive(Clone)]
pub struct SpeechClient {
    client: reqwest::Client,
    access_token: Option<String>,
    language_code: String,
    voice_name: String,
    audio_encoding: String,
    media_bucket: String,
}

impl SpeechClient {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            access_token: config.gcp_access_token.clone(),
            language_code: config.tts_language_code.clone(),
            voice_name: config.tts_voice_name.clone(),
            audio_encoding: config.tts_audio_encoding.clone(),
            media_bucket: config.media_bucket.clone(),
        }
    }

    async fn synthesize(
        &self,
        input: &SpeechInput,
        speaking_rate: f64,
        pitch: f64,
    ) -> Result<Vec<u8>, SpeechError> {
        let input_value = match input {
            SpeechInput::Text(text) => serde_json::json!({ "text": text }),
            SpeechInput::Ssml(ssml) => serde_json::json!({ "ssml": ssml }),
        };

        let payload = serde_json::json!({
            "input": input_value,
            "voice": {
                "languageCode": self.language_code,
                "name": self.voice_name,
                "ssmlGender": "NEUTRAL",
            },
            "audioConfig": {
                "audioEncoding": self.audio_encoding,
                "speakingRate": speaking_rate,
                "pitch": pitch,
                "volumeGainDb": 0,
            },
        });

        let mut request = self.client.post(SYNTHESIZE_URL).json(&payload);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(Value::as_str)
                        .map(|s| s.to_string())
                })
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(SpeechError::Upstream(message));
        }

        let body: Value = response.json().await?;
        let encoded = body
            .get("audioContent")
            .and_then(Value::as_str)
            .ok_or(SpeechError::BadAudioPayload)?;
        BASE64
            .decode(encoded)
            .map_err(|_| SpeechError::BadAudioPayload)
    }

    async fn synthesize_to_storage(
        &self,
        storage: &StorageClient,
        input: SpeechInput,
        speaking_rate: f64,
        pitch: f64,
        destination: String,
    ) -> Result<AudioArtifact, SpeechError> {
        let plain_text = match &input {
            SpeechInput::Text(text) => text.clone(),
            SpeechInput::Ssml(ssml) => ssml.clone(),
        };

        tracing::info!(text_len = plain_text.len(), voice = %self.voice_name, "generating audio");
        let audio = self.synthesize(&input, speaking_rate, pitch).await?;

        let audio_url = storage
            .upload_bytes(&self.media_bucket, &destination, audio, "audio/mpeg")
            .await?;

        Ok(AudioArtifact {
            audio_url,
            duration_secs: estimate_duration(&plain_text, speaking_rate),
            file_name: destination,
        })
    }

    pub async fn generate_lesson_audio(
        &self,
        storage: &StorageClient,
        lesson_content: &str,
        lesson_id: &str,
    ) -> Result<AudioArtifact, SpeechError> {
        let destination = format!("audio/lesson-{lesson_id}-{}.mp3", Uuid::new_v4());
        self.synthesize_to_storage(
            storage,
            SpeechInput::Text(lesson_content.to_string()),
            LESSON_SPEAKING_RATE,
            0.0,
            destination,
        )
        .await
    }

    pub async fn generate_card_audio(
        &self,
        storage: &StorageClient,
        card_text: &str,
        card_id: &str,
    ) -> Result<AudioArtifact, SpeechError> {
        let destination = format!("audio/card-{card_id}-{}.mp3", Uuid::new_v4());
        self.synthesize_to_storage(
            storage,
            SpeechInput::Text(card_text.to_string()),
            CARD_SPEAKING_RATE,
            0.0,
            destination,
        )
        .await
    }

    /// Question audio gets an SSML wrap: slow prosody and a closing pause.
    pub async fn generate_question_audio(
        &self,
        storage: &StorageClient,
        question_text: &str,
        question_id: &str,
    ) -> Result<AudioArtifact, SpeechError> {
        let destination = format!("audio/questions/question-{question_id}-{}.mp3", Uuid::new_v4());
        let artifact = self
            .synthesize_to_storage(
                storage,
                SpeechInput::Ssml(wrap_with_ssml(question_text)),
                QUESTION_SPEAKING_RATE,
                0.0,
                destination,
            )
            .await?;

        // Duration estimated from the spoken words, not the SSML markup.
        Ok(AudioArtifact {
            duration_secs: estimate_duration(question_text, QUESTION_SPEAKING_RATE),
            ..artifact
        })
    }

    pub async fn generate_feedback_audio(
        &self,
        storage: &StorageClient,
        feedback_text: &str,
        is_positive: bool,
    ) -> Result<AudioArtifact, SpeechError> {
        let (speaking_rate, pitch) = if is_positive {
            (POSITIVE_FEEDBACK_SPEAKING_RATE, 2.0)
        } else {
            (NEGATIVE_FEEDBACK_SPEAKING_RATE, 0.0)
        };
        let destination = format!("audio/feedback-{}.mp3", Uuid::new_v4());
        self.synthesize_to_storage(
            storage,
            SpeechInput::Text(feedback_text.to_string()),
            speaking_rate,
            pitch,
            destination,
        )
        .await
    }

    pub async fn generate_instruction_audio(
        &self,
        storage: &StorageClient,
        instruction_text: &str,
        instruction_id: &str,
    ) -> Result<AudioArtifact, SpeechError> {
        let destination = format!("audio/instruction-{instruction_id}-{}.mp3", Uuid::new_v4());
        self.synthesize_to_storage(
            storage,
            SpeechInput::Text(instruction_text.to_string()),
            INSTRUCTION_SPEAKING_RATE,
            0.0,
            destination,
        )
        .await
    }
}

pub fn wrap_with_ssml(text: &str) -> String {
    format!(
        r#"<speak>
      <prosody rate="slow" pitch="medium">
        {text}
      </prosody>
      <break time="500ms"/>
    </speak>"#
    )
}

/// Spoken-duration estimate: word count over a 150 wpm baseline scaled by
/// the speaking rate, rounded up to whole seconds.
pub fn estimate_duration(text: &str, speaking_rate: f64) -> u32 {
    let word_count = text.split_whitespace().count() as f64;
    let adjusted_words_per_minute = BASE_WORDS_PER_MINUTE * speaking_rate;
    if adjusted_words_per_minute <= 0.0 {
        return 0;
    }
    let duration_minutes = word_count / adjusted_words_per_minute;
    (duration_minutes * 60.0).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hundred_fifty_words_at_normal_rate_is_one_minute() {
        let text = vec!["word"; 150].join(" ");
        assert_eq!(estimate_duration(&text, 1.0), 60);
    }

    #[test]
    fn slower_rate_lengthens_duration() {
        let text = vec!["word"; 150].join(" ");
        assert_eq!(estimate_duration(&text, 0.85), 71);
    }

    #[test]
    fn empty_text_has_zero_duration() {
        assert_eq!(estimate_duration("", 1.0), 0);
    }

    #[test]
    fn ssml_wrap_includes_pause() {
        let wrapped = wrap_with_ssml("What color is the sky?");
        assert!(wrapped.starts_with("<speak>"));
        assert!(wrapped.contains("What color is the sky?"));
        assert!(wrapped.contains(r#"<break time="500ms"/>"#));
        assert!(wrapped.trim_end().ends_with("</speak>"));
    }

    #[test]
    fn rates_match_content_types() {
        assert_eq!(LESSON_SPEAKING_RATE, 0.85);
        assert_eq!(CARD_SPEAKING_RATE, 0.9);
        assert_eq!(QUESTION_SPEAKING_RATE, 0.85);
        assert_eq!(INSTRUCTION_SPEAKING_RATE, 0.8);
    }
}
