//! Gemini client for content simplification, card/exam generation, and
//! performance analysis.
//!
//! The model wraps its JSON answers in free text, so every structured
//! call scans for the outermost object span and strictly decodes it;
//! each call site owns a deterministic fallback value for responses that
//! do not decode. Fallbacks are part of the contract and never error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use crate::config::Config;
use crate::models::{Question, VisualCard};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Vertex AI not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{0}")]
    Upstream(String),
    #[error("empty response")]
    EmptyResponse,
}

#[derive(Debug, Clone)]
pub struct SimplifyOptions {
    pub reading_level: String,
    pub max_sentence_length: u32,
    pub include_visual_cues: bool,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            reading_level: "elementary".to_string(),
            max_sentence_length: 15,
            include_visual_cues: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplifiedContent {
    pub simplified_text: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub vocabulary: Vec<crate::models::VocabularyEntry>,
    #[serde(default)]
    pub visual_suggestions: Vec<String>,
    #[serde(default)]
    pub emoji_cues: HashMap<String, String>,
}

impl SimplifiedContent {
    /// The parse-failure fallback: the raw text with empty auxiliaries.
    pub fn fallback(raw: &str) -> Self {
        Self {
            simplified_text: raw.to_string(),
            key_points: Vec::new(),
            vocabulary: Vec::new(),
            visual_suggestions: Vec::new(),
            emoji_cues: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceAnalysis {
    pub recommended_difficulty: u8,
    pub reasoning: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub encouragement: String,
}

impl PerformanceAnalysis {
    pub fn stay_at(current_difficulty: u8) -> Self {
        Self {
            recommended_difficulty: current_difficulty,
            reasoning: "Continue at current level".to_string(),
            strengths: Vec::new(),
            areas_for_improvement: Vec::new(),
            suggestions: Vec::new(),
            encouragement: "Keep up the great work!".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreviousPerformance {
    pub score_percent: f64,
    pub struggles: Vec<String>,
}

#[derive(Deserialize)]
struct CardsEnvelope {
    cards: Vec<VisualCard>,
}

#[derive(Deserialize)]
struct QuestionsEnvelope {
    questions: Vec<Question>,
}

pub fn difficulty_description(level: u8) -> &'static str {
    match level {
        1 => "Very simple recognition and matching questions",
        2 => "Simple yes/no and multiple choice with images",
        3 => "Basic comprehension with visual support",
        4 => "Moderate comprehension and application",
        5 => "Advanced understanding and reasoning",
        _ => "Basic comprehension with visual support",
    }
}

#[derive(Clone)]
pub struct VertexAiClient {
    client: reqwest::Client,
    generate_url: String,
    access_token: Option<String>,
    configured: bool,
}

impl VertexAiClient {
    pub fn new(config: &Config) -> Self {
        let generate_url = format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:generateContent",
            loc = config.vertex_ai_location,
            project = config.gcp_project_id,
            model = config.vertex_ai_model,
        );
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            generate_url,
            access_token: config.gcp_access_token.clone(),
            configured: !config.gcp_project_id.is_empty(),
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if !self.configured {
            return Err(GenerationError::NotConfigured("GOOGLE_CLOUD_PROJECT_ID"));
        }

        let payload = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }],
            }]
        });

        let mut request = self.client.post(&self.generate_url).json(&payload);
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
            return Err(GenerationError::Upstream(message));
        }

        let body: Value = response.json().await?;
        body.pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .ok_or(GenerationError::EmptyResponse)
    }

    pub async fn simplify_content(
        &self,
        original_content: &str,
        options: &SimplifyOptions,
    ) -> Result<SimplifiedContent, GenerationError> {
        let prompt = simplify_prompt(original_content, options);

        tracing::info!("simplifying content");
        let text = self.generate(&prompt).await?;

        Ok(decode_response::<SimplifiedContent>(&text)
            .unwrap_or_else(|| SimplifiedContent::fallback(&text)))
    }

    pub async fn generate_visual_cards(
        &self,
        content: &str,
        lesson_title: &str,
    ) -> Result<Vec<VisualCard>, GenerationError> {
        let prompt = cards_prompt(content, lesson_title);

        tracing::info!(lesson_title, "generating visual cards");
        let text = self.generate(&prompt).await?;

        let cards = decode_response::<CardsEnvelope>(&text)
            .map(|envelope| envelope.cards)
            .unwrap_or_default();
        tracing::info!(card_count = cards.len(), "visual cards generated");
        Ok(cards)
    }

    pub async fn generate_exam_questions(
        &self,
        lesson_content: &str,
        difficulty: u8,
        question_count: u32,
        previous_performance: Option<&PreviousPerformance>,
    ) -> Result<Vec<Question>, GenerationError> {
        let prompt = exam_prompt(lesson_content, difficulty, question_count, previous_performance);

        tracing::info!(difficulty, question_count, "generating exam questions");
        let text = self.generate(&prompt).await?;

        let questions = decode_response::<QuestionsEnvelope>(&text)
            .map(|envelope| envelope.questions)
            .unwrap_or_default();
        tracing::info!(question_count = questions.len(), "exam questions generated");
        Ok(questions)
    }

    /// Analyze exam results and recommend the next difficulty. This call
    /// never fails: any upstream or decode problem resolves to the
    /// stay-at-current fallback.
    pub async fn analyze_performance(
        &self,
        exam_results: &Value,
        current_difficulty: u8,
    ) -> PerformanceAnalysis {
        let prompt = analysis_prompt(exam_results, current_difficulty);

        tracing::info!(current_difficulty, "analyzing student performance");
        match self.generate(&prompt).await {
            Ok(text) => decode_response::<PerformanceAnalysis>(&text)
                .unwrap_or_else(|| PerformanceAnalysis::stay_at(current_difficulty)),
            Err(err) => {
                tracing::warn!(error = %err, "performance analysis failed");
                PerformanceAnalysis::stay_at(current_difficulty)
            }
        }
    }

    /// Short encouragement for a student's emotional state. Falls back to
    /// a static message on any failure.
    pub async fn generate_emotional_support(
        &self,
        emotional_state: &str,
        context: &str,
    ) -> String {
        let prompt = support_prompt(emotional_state, context);

        match self.generate(&prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                tracing::warn!(error = %err, "emotional support generation failed");
                "You are doing great! Keep going! 💪😊".to_string()
            }
        }
    }
}

/// Locate the outermost `{...}` span in free text: first opening brace to
/// last closing brace.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn decode_response<T: for<'de> Deserialize<'de>>(text: &str) -> Option<T> {
    let span = extract_json_object(text)?;
    match serde_json::from_str(span) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(error = %err, "model response did not match schema");
            None
        }
    }
}

fn simplify_prompt(original_content: &str, options: &SimplifyOptions) -> String {
    let visual_cards_line = if options.include_visual_cues {
        "- Include suggestions for visual learning cards\n"
    } else {
        ""
    };

    format!(
        r#"You are an expert in creating accessible educational content for students with Down syndrome.

Please simplify the following educational content following these guidelines:
- Use simple, clear language at {level} reading level
- Keep sentences short (maximum {max_len} words)
- Use active voice
- Break complex ideas into smaller chunks
- Use repetition for key concepts
- Suggest visual aids and emojis where appropriate
{visual_cards_line}
Original Content:
{content}

Please provide the simplified content in the following JSON format:
{{
  "simplifiedText": "The simplified content here...",
  "keyPoints": ["point 1", "point 2", ...],
  "vocabulary": [{{"word": "difficult word", "simpleDefinition": "easy explanation"}}],
  "visualSuggestions": ["suggestion 1", "suggestion 2", ...],
  "emojiCues": {{"concept1": "🎨", "concept2": "📚"}}
}}"#,
        level = options.reading_level,
        max_len = options.max_sentence_length,
        visual_cards_line = visual_cards_line,
        content = original_content,
    )
}

fn cards_prompt(content: &str, lesson_title: &str) -> String {
    format!(
        r#"Create visual learning cards for students with Down syndrome based on this lesson.

Lesson Title: {lesson_title}
Content: {content}

Generate 5-8 learning cards with:
- Simple title (2-4 words)
- Brief description (1 sentence)
- Suggested visual/image description
- Emoji to represent the concept
- Interactive element suggestion (e.g., "tap to hear", "drag and match")

Provide response in JSON format:
{{
  "cards": [
    {{
      "title": "Card title",
      "description": "Simple description",
      "visualDescription": "What image or graphic should be shown",
      "emoji": "📝",
      "interactiveElement": "Tap to hear the word",
      "audioText": "Text to be converted to speech"
    }}
  ]
}}"#
    )
}

fn exam_prompt(
    lesson_content: &str,
    difficulty: u8,
    question_count: u32,
    previous_performance: Option<&PreviousPerformance>,
) -> String {
    let performance_context = match previous_performance {
        Some(perf) => format!(
            "The student previously scored {}% and struggled with: {}",
            perf.score_percent,
            perf.struggles.join(", ")
        ),
        None => "This is the first assessment".to_string(),
    };

    format!(
        r#"Generate {question_count} accessible exam questions for a student with Down syndrome.

Lesson Content: {lesson_content}

Difficulty Level: {difficulty}/5 - {difficulty_description}
{performance_context}

Guidelines:
- Use simple, clear language
- Include visual descriptions for each question
- Provide emoji-based answer options where appropriate
- Make questions engaging and encouraging
- Focus on key concepts
- Avoid trick questions or complex wording

Provide response in JSON format:
{{
  "questions": [
    {{
      "id": 1,
      "type": "multiple-choice | true-false | matching | selection",
      "question": "Simple, clear question text",
      "visualDescription": "Description of supporting image/visual",
      "options": [
        {{"id": "a", "text": "Option text", "emoji": "😊", "isCorrect": true}},
        {{"id": "b", "text": "Option text", "emoji": "🎨", "isCorrect": false}}
      ],
      "correctFeedback": "Encouraging positive feedback with emoji",
      "incorrectFeedback": "Gentle, supportive feedback",
      "audioText": "Question read aloud",
      "hint": "Optional hint if student struggles"
    }}
  ]
}}"#,
        difficulty_description = difficulty_description(difficulty),
    )
}

fn analysis_prompt(exam_results: &Value, current_difficulty: u8) -> String {
    format!(
        r#"Analyze this student performance data and suggest the next appropriate difficulty level.

Current Difficulty: {current_difficulty}/5
Exam Results: {results}

Consider:
- Score percentage
- Time taken per question
- Number of hints used
- Emotional feedback provided
- Pattern of errors

Provide response in JSON format:
{{
  "recommendedDifficulty": 2,
  "reasoning": "Explanation of recommendation",
  "strengths": ["area 1", "area 2"],
  "areasForImprovement": ["area 1", "area 2"],
  "suggestions": ["specific suggestion 1", "suggestion 2"],
  "encouragement": "Positive message for the student"
}}"#,
        results = serde_json::to_string_pretty(exam_results).unwrap_or_default(),
    )
}

fn support_prompt(emotional_state: &str, context: &str) -> String {
    format!(
        r#"Generate encouraging, supportive feedback for a student with Down syndrome.

Student's Current Emotional State: {emotional_state}
Context: {context}

Provide warm, positive, and age-appropriate encouragement that:
- Validates their feelings
- Provides reassurance
- Motivates them to continue
- Uses simple language
- Includes appropriate emojis

Keep the message to 1-2 short sentences."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_span_is_first_open_to_last_close() {
        let text = "Sure! Here it is:\n```json\n{\"a\": {\"b\": 1}}\n```\nDone.";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn no_braces_yields_none() {
        assert!(extract_json_object("plain prose only").is_none());
        assert!(extract_json_object("} reversed {").is_none());
    }

    #[test]
    fn simplify_fallback_carries_raw_text() {
        let raw = "The model ignored the format and just rewrote the text.";
        let decoded = decode_response::<SimplifiedContent>(raw);
        assert!(decoded.is_none());
        let fallback = SimplifiedContent::fallback(raw);
        assert_eq!(fallback.simplified_text, raw);
        assert!(fallback.key_points.is_empty());
        assert!(fallback.vocabulary.is_empty());
        assert!(fallback.visual_suggestions.is_empty());
        assert!(fallback.emoji_cues.is_empty());
    }

    #[test]
    fn simplify_response_decodes() {
        let text = r#"Here you go: {"simplifiedText": "Plants need sun.", "keyPoints": ["sun"], "vocabulary": [], "visualSuggestions": [], "emojiCues": {"sun": "☀️"}}"#;
        let decoded = decode_response::<SimplifiedContent>(text).unwrap();
        assert_eq!(decoded.simplified_text, "Plants need sun.");
        assert_eq!(decoded.emoji_cues["sun"], "☀️");
    }

    #[test]
    fn cards_decode_or_empty() {
        let ok = r#"{"cards": [{"title": "Sun", "description": "The sun is hot.", "visualDescription": "A bright sun", "emoji": "☀️", "interactiveElement": "Tap to hear", "audioText": "The sun"}]}"#;
        let cards = decode_response::<CardsEnvelope>(ok).unwrap().cards;
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].title, "Sun");

        assert!(decode_response::<CardsEnvelope>("not json at all").is_none());
    }

    #[test]
    fn questions_decode_with_types() {
        let text = r#"{"questions": [{
            "id": 1,
            "type": "true-false",
            "question": "Is the sun hot?",
            "visualDescription": "A sun",
            "options": [
                {"id": "a", "text": "Yes", "emoji": "😊", "isCorrect": true},
                {"id": "b", "text": "No", "emoji": "🌙", "isCorrect": false}
            ],
            "correctFeedback": "Great job! 🌟",
            "incorrectFeedback": "Nice try! Let's look again.",
            "audioText": "Is the sun hot?",
            "hint": "Think about summer."
        }]}"#;
        let questions = decode_response::<QuestionsEnvelope>(text).unwrap().questions;
        assert_eq!(questions.len(), 1);
        assert_eq!(
            questions[0].question_type,
            crate::models::QuestionType::TrueFalse
        );
        assert!(questions[0].options[0].is_correct);
    }

    #[test]
    fn analysis_fallback_stays_at_current() {
        let fallback = PerformanceAnalysis::stay_at(3);
        assert_eq!(fallback.recommended_difficulty, 3);
        assert!(!fallback.encouragement.is_empty());
    }

    #[test]
    fn difficulty_table_covers_all_levels() {
        for level in 1..=5 {
            assert!(!difficulty_description(level).is_empty());
        }
        // Out-of-range levels use the mid-table description.
        assert_eq!(difficulty_description(0), difficulty_description(3));
        assert_eq!(difficulty_description(9), difficulty_description(3));
    }

    #[test]
    fn exam_prompt_mentions_previous_performance() {
        let perf = PreviousPerformance {
            score_percent: 62.0,
            struggles: vec!["matching".to_string(), "reading".to_string()],
        };
        let prompt = exam_prompt("content", 2, 10, Some(&perf));
        assert!(prompt.contains("previously scored 62%"));
        assert!(prompt.contains("matching, reading"));

        let first = exam_prompt("content", 2, 10, None);
        assert!(first.contains("This is the first assessment"));
    }
}
