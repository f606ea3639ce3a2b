use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Guardian,
    Student,
    // Legacy accounts only; registration rejects it.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Guardian => "guardian",
            Self::Student => "student",
            Self::Admin => "admin",
        }
    }

    pub fn parse_registerable(value: &str) -> Option<Self> {
        match value {
            "teacher" => Some(Self::Teacher),
            "guardian" => Some(Self::Guardian),
            "student" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            other => Self::parse_registerable(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Email,
    Google,
    Anonymous,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Google => "google",
            Self::Anonymous => "anonymous",
        }
    }
}

/// Stored user document. The password hash stays server-side: it is
/// explicitly skipped on serialization, so no response can carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub photo_url: String,
    pub provider: Provider,
    #[serde(default)]
    pub provider_id: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub student_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurriculumStatus {
    Uploaded,
    Processing,
    Ready,
    Error,
}

impl CurriculumStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Curriculum {
    pub id: String,
    pub teacher_id: String,
    pub title: String,
    pub subject: String,
    pub grade_level: String,
    pub description: String,
    pub status: CurriculumStatus,
    pub file_name: String,
    pub file_url: String,
    pub mime_type: String,
    pub lesson_count: u32,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyEntry {
    pub word: String,
    pub simple_definition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualCard {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visual_description: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub interactive_element: String,
    #[serde(default)]
    pub audio_text: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub audio_duration_secs: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub curriculum_id: String,
    pub title: String,
    pub simplified_text: String,
    pub key_points: Vec<String>,
    pub vocabulary: Vec<VocabularyEntry>,
    pub visual_suggestions: Vec<String>,
    pub emoji_cues: HashMap<String, String>,
    pub cards: Vec<VisualCard>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub audio_duration_secs: Option<u32>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    Matching,
    Selection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub emoji: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question: String,
    #[serde(default)]
    pub visual_description: String,
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub correct_feedback: String,
    #[serde(default)]
    pub incorrect_feedback: String,
    #[serde(default)]
    pub audio_text: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub lesson_id: String,
    pub difficulty: u8,
    pub questions: Vec<Question>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub exam_id: String,
    pub student_id: String,
    pub score_percent: f64,
    #[serde(default)]
    pub struggles: Vec<String>,
    #[serde(default)]
    pub hints_used: u32,
    pub completed_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Done,
    Failed,
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Persisted pipeline job record. Staged step outputs ride along so a
/// resumed run never re-pays a completed external call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineJob {
    pub id: String,
    pub curriculum_id: String,
    #[serde(default)]
    pub extract: StepStatus,
    #[serde(default)]
    pub simplify: StepStatus,
    #[serde(default)]
    pub cards: StepStatus,
    #[serde(default)]
    pub exam: StepStatus,
    #[serde(default)]
    pub audio: StepStatus,
    #[serde(default)]
    pub persist: StepStatus,
    #[serde(default)]
    pub staged: HashMap<String, serde_json::Value>,
    pub updated_at: String,
}

impl PipelineJob {
    pub fn new(curriculum_id: &str, now: String) -> Self {
        Self {
            id: format!("job-{curriculum_id}"),
            curriculum_id: curriculum_id.to_string(),
            extract: StepStatus::Pending,
            simplify: StepStatus::Pending,
            cards: StepStatus::Pending,
            exam: StepStatus::Pending,
            audio: StepStatus::Pending,
            persist: StepStatus::Pending,
            staged: HashMap::new(),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serialization_strips_password() {
        let user = User {
            id: "u1".into(),
            email: "kid@example.com".into(),
            password: Some("$2b$10$hash".into()),
            role: Role::Student,
            first_name: "Sam".into(),
            last_name: "Lee".into(),
            photo_url: String::new(),
            provider: Provider::Email,
            provider_id: None,
            is_active: true,
            is_anonymous: false,
            student_ids: vec![],
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["role"], "student");
        assert_eq!(json["firstName"], "Sam");
    }

    #[test]
    fn registerable_roles_exclude_admin() {
        assert!(Role::parse_registerable("teacher").is_some());
        assert!(Role::parse_registerable("guardian").is_some());
        assert!(Role::parse_registerable("student").is_some());
        assert!(Role::parse_registerable("admin").is_none());
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
    }

    #[test]
    fn question_type_wire_names_are_kebab_case() {
        let q = QuestionType::MultipleChoice;
        assert_eq!(serde_json::to_value(q).unwrap(), "multiple-choice");
        let parsed: QuestionType = serde_json::from_value("true-false".into()).unwrap();
        assert_eq!(parsed, QuestionType::TrueFalse);
    }
}
