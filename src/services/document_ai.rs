//! Document AI client and the structure pass over its output.
//!
//! Extraction is the one pipeline step whose failure is terminal for a
//! curriculum, so errors here carry the upstream message verbatim.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;

const HEADING_MAX_LEN: usize = 100;
const KEY_TERM_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Document AI not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to process document: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page_number: u32,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub blocks: usize,
    pub lines: usize,
    pub tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub mention_text: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTable {
    pub rows: usize,
    pub columns: usize,
    pub content: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedParagraph {
    pub text: String,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDocument {
    pub text: String,
    pub pages: Vec<PageInfo>,
    pub entities: Vec<ExtractedEntity>,
    pub tables: Vec<ExtractedTable>,
    pub paragraphs: Vec<ExtractedParagraph>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub title: String,
    pub content: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumStructure {
    pub title: String,
    pub sections: Vec<Section>,
    pub key_terms: Vec<String>,
    pub full_text: String,
}

#[derive(Clone)]
pub struct DocumentAiClient {
    client: reqwest::Client,
    processor_url: String,
    access_token: Option<String>,
    configured: bool,
}

impl DocumentAiClient {
    pub fn new(config: &Config) -> Self {
        let processor_url = format!(
            "https://{loc}-documentai.googleapis.com/v1/projects/{project}/locations/{loc}/processors/{id}:process",
            loc = config.document_ai_location,
            project = config.gcp_project_id,
            id = config.document_ai_processor_id,
        );
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            processor_url,
            access_token: config.gcp_access_token.clone(),
            configured: !config.gcp_project_id.is_empty()
                && !config.document_ai_processor_id.is_empty(),
        }
    }

    pub async fn process(
        &self,
        file_bytes: &[u8],
        mime_type: &str,
    ) -> Result<ExtractedDocument, ExtractionError> {
        if !self.configured {
            return Err(ExtractionError::NotConfigured("DOCUMENT_AI_PROCESSOR_ID"));
        }

        let payload = serde_json::json!({
            "rawDocument": {
                "content": BASE64.encode(file_bytes),
                "mimeType": mime_type,
            }
        });

        tracing::info!(mime_type, size = file_bytes.len(), "processing document");

        let mut request = self.client.post(&self.processor_url).json(&payload);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Upstream(upstream_message(&body)));
        }

        let body: Value = response.json().await?;
        let document = body.get("document").cloned().unwrap_or(Value::Null);
        let extracted = decode_document(&document);

        tracing::info!(
            text_len = extracted.text.len(),
            pages = extracted.pages.len(),
            "document processed"
        );

        Ok(extracted)
    }
}

fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn decode_document(document: &Value) -> ExtractedDocument {
    let text = document
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let pages = document
        .get("pages")
        .and_then(Value::as_array)
        .map(|pages| {
            pages
                .iter()
                .enumerate()
                .map(|(index, page)| PageInfo {
                    page_number: index as u32 + 1,
                    width: page.pointer("/dimension/width").and_then(Value::as_f64),
                    height: page.pointer("/dimension/height").and_then(Value::as_f64),
                    blocks: array_len(page, "blocks"),
                    lines: array_len(page, "lines"),
                    tokens: array_len(page, "tokens"),
                })
                .collect()
        })
        .unwrap_or_default();

    let entities = document
        .get("entities")
        .and_then(Value::as_array)
        .map(|entities| {
            entities
                .iter()
                .map(|entity| ExtractedEntity {
                    entity_type: str_field(entity, "type"),
                    mention_text: str_field(entity, "mentionText"),
                    confidence: entity.get("confidence").and_then(Value::as_f64).unwrap_or(0.0),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut tables = Vec::new();
    let mut paragraphs = Vec::new();
    if let Some(pages) = document.get("pages").and_then(Value::as_array) {
        for page in pages {
            if let Some(page_tables) = page.get("tables").and_then(Value::as_array) {
                for table in page_tables {
                    tables.push(decode_table(table, &text));
                }
            }
            if let Some(page_paragraphs) = page.get("paragraphs").and_then(Value::as_array) {
                for paragraph in page_paragraphs {
                    let layout = paragraph.get("layout");
                    paragraphs.push(ExtractedParagraph {
                        text: layout
                            .map(|l| text_from_layout(l, &text))
                            .unwrap_or_default()
                            .trim()
                            .to_string(),
                        confidence: layout
                            .and_then(|l| l.get("confidence"))
                            .and_then(Value::as_f64),
                    });
                }
            }
        }
    }

    ExtractedDocument {
        text,
        pages,
        entities,
        tables,
        paragraphs,
    }
}

fn decode_table(table: &Value, full_text: &str) -> ExtractedTable {
    let mut content = Vec::new();
    for key in ["headerRows", "bodyRows"] {
        if let Some(rows) = table.get(key).and_then(Value::as_array) {
            for row in rows {
                let cells = row
                    .get("cells")
                    .and_then(Value::as_array)
                    .map(|cells| {
                        cells
                            .iter()
                            .map(|cell| {
                                cell.get("layout")
                                    .map(|l| text_from_layout(l, full_text))
                                    .unwrap_or_default()
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                content.push(cells);
            }
        }
    }

    ExtractedTable {
        rows: array_len(table, "bodyRows"),
        columns: table
            .pointer("/headerRows/0/cells")
            .and_then(Value::as_array)
            .map(|cells| cells.len())
            .unwrap_or(0),
        content,
    }
}

/// Stitch a layout's text anchor segments back out of the full text.
/// Segment indexes arrive as strings on the REST wire.
fn text_from_layout(layout: &Value, full_text: &str) -> String {
    let Some(segments) = layout
        .pointer("/textAnchor/textSegments")
        .and_then(Value::as_array)
    else {
        return String::new();
    };

    let mut out = String::new();
    for segment in segments {
        let start = index_field(segment, "startIndex");
        let end = index_field(segment, "endIndex");
        if start <= end {
            // Indexes are byte offsets into the UTF-8 text.
            if let Some(slice) = full_text.get(start..end.min(full_text.len())) {
                out.push_str(slice);
            }
        }
    }
    out
}

fn index_field(segment: &Value, key: &str) -> usize {
    match segment.get(key) {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
        _ => 0,
    }
}

fn array_len(value: &Value, key: &str) -> usize {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|a| a.len())
        .unwrap_or(0)
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Derive the teaching structure from an extracted document: first
/// paragraph as title, heading-split sections, high-confidence entities
/// as key terms.
pub fn extract_structure(extracted: &ExtractedDocument) -> CurriculumStructure {
    CurriculumStructure {
        title: extract_title(&extracted.paragraphs),
        sections: identify_sections(&extracted.paragraphs),
        key_terms: extracted
            .entities
            .iter()
            .filter(|e| e.confidence > KEY_TERM_CONFIDENCE)
            .map(|e| e.mention_text.clone())
            .collect(),
        full_text: extracted.text.clone(),
    }
}

fn extract_title(paragraphs: &[ExtractedParagraph]) -> String {
    paragraphs
        .first()
        .map(|p| p.text.clone())
        .unwrap_or_else(|| "Untitled".to_string())
}

/// A short paragraph starting with a chapter/section/unit marker or a
/// numbered prefix, or written fully upper-case, opens a new section.
/// Everything until the next heading accumulates as its content;
/// paragraphs before the first heading are dropped.
fn identify_sections(paragraphs: &[ExtractedParagraph]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<Section> = None;

    for paragraph in paragraphs {
        let text = paragraph.text.as_str();
        if is_heading(text) {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            current = Some(Section {
                title: text.to_string(),
                content: Vec::new(),
            });
        } else if let Some(section) = current.as_mut() {
            section.content.push(text.to_string());
        }
    }

    if let Some(section) = current {
        sections.push(section);
    }

    sections
}

fn is_heading(text: &str) -> bool {
    if text.is_empty() || text.len() >= HEADING_MAX_LEN {
        return false;
    }

    let lower = text.to_lowercase();
    let prefixed = lower.starts_with("chapter")
        || lower.starts_with("section")
        || lower.starts_with("unit")
        || starts_with_numbered_prefix(text);

    prefixed || text == text.to_uppercase()
}

fn starts_with_numbered_prefix(text: &str) -> bool {
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    !digits.is_empty() && text[digits.len()..].starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(texts: &[&str]) -> Vec<ExtractedParagraph> {
        texts
            .iter()
            .map(|t| ExtractedParagraph {
                text: t.to_string(),
                confidence: Some(0.9),
            })
            .collect()
    }

    #[test]
    fn splits_sections_on_headings() {
        let paras = paragraphs(&[
            "CHAPTER 1",
            "body text one",
            "body text two",
            "Section 2: Basics",
            "more body",
        ]);
        let sections = identify_sections(&paras);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "CHAPTER 1");
        assert_eq!(sections[0].content, vec!["body text one", "body text two"]);
        assert_eq!(sections[1].title, "Section 2: Basics");
        assert_eq!(sections[1].content, vec!["more body"]);
    }

    #[test]
    fn body_before_first_heading_is_dropped() {
        let paras = paragraphs(&["intro text here", "Unit 3", "body"]);
        let sections = identify_sections(&paras);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Unit 3");
        assert_eq!(sections[0].content, vec!["body"]);
    }

    #[test]
    fn numbered_prefix_is_a_heading() {
        assert!(is_heading("1. Introduction"));
        assert!(is_heading("12.Photosynthesis"));
        assert!(!is_heading("1 without a dot"));
    }

    #[test]
    fn long_paragraphs_are_never_headings() {
        let long = "CHAPTER ".repeat(20);
        assert!(!is_heading(&long));
    }

    #[test]
    fn title_is_first_paragraph_or_untitled() {
        let paras = paragraphs(&["Plant Biology", "body"]);
        assert_eq!(extract_title(&paras), "Plant Biology");
        assert_eq!(extract_title(&[]), "Untitled");
    }

    #[test]
    fn key_terms_use_confidence_threshold() {
        let doc = ExtractedDocument {
            text: "t".into(),
            pages: vec![],
            entities: vec![
                ExtractedEntity {
                    entity_type: "concept".into(),
                    mention_text: "photosynthesis".into(),
                    confidence: 0.92,
                },
                ExtractedEntity {
                    entity_type: "concept".into(),
                    mention_text: "maybe".into(),
                    confidence: 0.5,
                },
            ],
            tables: vec![],
            paragraphs: vec![],
        };
        let structure = extract_structure(&doc);
        assert_eq!(structure.key_terms, vec!["photosynthesis"]);
    }

    #[test]
    fn layout_text_stitches_segments() {
        let full = "Hello world, this is a document.";
        let layout = serde_json::json!({
            "textAnchor": {
                "textSegments": [
                    { "startIndex": "0", "endIndex": "5" },
                    { "startIndex": "11", "endIndex": "16" }
                ]
            }
        });
        assert_eq!(text_from_layout(&layout, full), "Hello, thi");
    }

    #[test]
    fn decode_handles_missing_fields() {
        let extracted = decode_document(&serde_json::json!({}));
        assert!(extracted.text.is_empty());
        assert!(extracted.pages.is_empty());
        assert!(extracted.paragraphs.is_empty());
    }
}
