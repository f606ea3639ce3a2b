//! Curriculum pipeline: ingestion, the extract → simplify → cards → exam
//! → audio → persist run, and adaptive exam difficulty.
//!
//! Each run is an explicit job with persisted per-step status and staged
//! outputs. A re-trigger after a failure resumes from the first
//! incomplete step instead of re-paying completed external calls.
//! Concurrent triggers are rejected twice over: an in-process lock set
//! for this instance, and a status compare-and-swap at the store for
//! anything else.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::db::operations::{curricula, exams, jobs, lessons};
use crate::db::FirestoreClient;
use crate::models::{
    Curriculum, CurriculumStatus, Exam, ExamResult, Lesson, PipelineJob, Question, StepStatus,
    VisualCard,
};
use crate::response::{now_iso, ApiError};
use crate::services::document_ai::{extract_structure, CurriculumStructure, DocumentAiClient};
use crate::services::speech::{AudioArtifact, SpeechClient};
use crate::services::storage::StorageClient;
use crate::services::vertex_ai::{
    PerformanceAnalysis, PreviousPerformance, SimplifyOptions, VertexAiClient,
};

const DEFAULT_EXAM_DIFFICULTY: u8 = 1;
const DEFAULT_QUESTION_COUNT: u32 = 10;

const STAGED_STRUCTURE: &str = "structure";
const STAGED_LESSONS: &str = "lessons";

/// Outcome of an exam analysis: the (possibly regenerated) exam, the
/// model's recommendation, and a spoken version of the encouragement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAnalysis {
    pub analysis: PerformanceAnalysis,
    pub exam: Exam,
    pub encouragement_audio_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadInput {
    pub teacher_id: String,
    pub title: String,
    pub subject: String,
    pub grade_level: String,
    pub description: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Per-lesson working record carried through the steps and staged on the
/// job document between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LessonDraft {
    lesson_id: String,
    title: String,
    source_text: String,
    #[serde(default)]
    simplified: Option<crate::services::vertex_ai::SimplifiedContent>,
    #[serde(default)]
    cards: Vec<VisualCard>,
    #[serde(default)]
    questions: Vec<Question>,
    #[serde(default)]
    audio: Option<AudioArtifact>,
}

pub struct CurriculumPipeline {
    store: Arc<FirestoreClient>,
    document_ai: Arc<DocumentAiClient>,
    vertex_ai: Arc<VertexAiClient>,
    speech: Arc<SpeechClient>,
    storage: Arc<StorageClient>,
    config: Arc<Config>,
    in_flight: Mutex<HashSet<String>>,
}

impl CurriculumPipeline {
    pub fn new(
        store: Arc<FirestoreClient>,
        document_ai: Arc<DocumentAiClient>,
        vertex_ai: Arc<VertexAiClient>,
        speech: Arc<SpeechClient>,
        storage: Arc<StorageClient>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            document_ai,
            vertex_ai,
            speech,
            storage,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Stage an uploaded file, push it to object storage, and create the
    /// curriculum record in `uploaded` state.
    pub async fn ingest_upload(&self, input: UploadInput) -> Result<Curriculum, ApiError> {
        if !self.config.is_mime_allowed(&input.mime_type) {
            return Err(ApiError::validation(format!(
                "File type not allowed: {}",
                input.mime_type
            )));
        }
        if input.bytes.len() > self.config.max_file_size {
            return Err(ApiError::validation("File size too large"));
        }

        let curriculum_id = Uuid::new_v4().to_string();
        let staging_path = self.stage_locally(&curriculum_id, &input.file_name, &input.bytes).await;

        let object = format!("curriculum/{curriculum_id}/{}", input.file_name);
        let file_url = self
            .storage
            .upload_bytes(
                &self.config.curriculum_bucket,
                &object,
                input.bytes,
                &input.mime_type,
            )
            .await
            .map_err(|err| ApiError::upstream(err.to_string()))?;

        // Staging cleanup is fire-and-forget; the object store copy is
        // authoritative from here on.
        if let Some(path) = staging_path {
            let _ = tokio::fs::remove_file(path).await;
        }

        let now = now_iso();
        let curriculum = Curriculum {
            id: curriculum_id,
            teacher_id: input.teacher_id,
            title: input.title,
            subject: input.subject,
            grade_level: input.grade_level,
            description: input.description,
            status: CurriculumStatus::Uploaded,
            file_name: object,
            file_url,
            mime_type: input.mime_type,
            lesson_count: 0,
            error_message: None,
            created_at: now.clone(),
            updated_at: now,
        };

        let created = curricula::create_curriculum(&self.store, &curriculum).await?;
        tracing::info!(curriculum_id = %created.id, "curriculum uploaded");
        Ok(created)
    }

    async fn stage_locally(
        &self,
        curriculum_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Option<PathBuf> {
        let dir = PathBuf::from(&self.config.upload_dir).join("tmp");
        if let Err(err) = tokio::fs::create_dir_all(&dir).await {
            tracing::warn!(error = %err, "upload staging dir unavailable");
            return None;
        }
        let path = dir.join(format!("{curriculum_id}-{file_name}"));
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => Some(path),
            Err(err) => {
                tracing::warn!(error = %err, "upload staging write failed");
                None
            }
        }
    }

    /// Run (or resume) the processing pipeline for one curriculum.
    pub async fn process_curriculum(&self, curriculum_id: &str) -> Result<Curriculum, ApiError> {
        let _guard = self.acquire(curriculum_id)?;

        let Some(raw) = curricula::get_raw(&self.store, curriculum_id).await? else {
            return Err(ApiError::not_found("Curriculum not found"));
        };
        let seen_update_time = raw.update_time.clone().unwrap_or_default();
        let curriculum: Curriculum = raw.into_typed("id")?;

        if curriculum.status == CurriculumStatus::Processing {
            return Err(ApiError::conflict("Curriculum is already being processed"));
        }

        // CAS on the stored status: a concurrent trigger from another
        // instance loses the precondition and gets the same 409.
        let now = now_iso();
        let curriculum = curricula::transition_status(
            &self.store,
            curriculum_id,
            CurriculumStatus::Processing,
            &seen_update_time,
            &now,
        )
        .await
        .map_err(|err| match err {
            crate::db::StoreError::PreconditionFailed => {
                ApiError::conflict("Curriculum is already being processed")
            }
            other => other.into(),
        })?;

        // A run resumes only out of `error`; anything else starts clean.
        let mut job = match jobs::get_job(&self.store, curriculum_id).await? {
            Some(existing) if has_failed_step(&existing) => existing,
            _ => PipelineJob::new(curriculum_id, now_iso()),
        };
        reset_failed_steps(&mut job);

        match self.run_steps(&curriculum, &mut job).await {
            Ok(lesson_count) => {
                let ready =
                    curricula::mark_ready(&self.store, curriculum_id, lesson_count, &now_iso())
                        .await?;
                let _ = jobs::delete_job(&self.store, curriculum_id).await;
                tracing::info!(curriculum_id, lesson_count, "curriculum processed");
                Ok(ready)
            }
            Err(err) => {
                let message = err.to_string();
                if let Err(mark_err) =
                    curricula::mark_error(&self.store, curriculum_id, &message, &now_iso()).await
                {
                    tracing::error!(error = %mark_err, "failed to record curriculum error");
                }
                let _ = jobs::put_job(&self.store, &job).await;
                tracing::error!(curriculum_id, error = %message, "curriculum processing failed");
                Err(err)
            }
        }
    }

    async fn run_steps(
        &self,
        curriculum: &Curriculum,
        job: &mut PipelineJob,
    ) -> Result<u32, ApiError> {
        let structure = self.step_extract(curriculum, job).await?;
        let mut drafts = self.step_simplify(&structure, job).await?;
        self.step_cards(&mut drafts, job).await?;
        self.step_exam(&mut drafts, job).await?;
        self.step_audio(&mut drafts, job).await?;
        self.step_persist(curriculum, &drafts, job).await
    }

    async fn step_extract(
        &self,
        curriculum: &Curriculum,
        job: &mut PipelineJob,
    ) -> Result<CurriculumStructure, ApiError> {
        if job.extract == StepStatus::Done {
            if let Some(staged) = read_staged::<CurriculumStructure>(job, STAGED_STRUCTURE) {
                return Ok(staged);
            }
        }

        let result = async {
            let bytes = self
                .storage
                .download_bytes(&self.config.curriculum_bucket, &curriculum.file_name)
                .await
                .map_err(|err| ApiError::upstream(err.to_string()))?;

            let extracted = self
                .document_ai
                .process(&bytes, &curriculum.mime_type)
                .await
                .map_err(|err| ApiError::upstream(err.to_string()))?;

            Ok::<_, ApiError>(extract_structure(&extracted))
        }
        .await;

        match result {
            Ok(structure) => {
                stage(job, STAGED_STRUCTURE, &structure);
                job.extract = StepStatus::Done;
                self.checkpoint(job).await;
                Ok(structure)
            }
            Err(err) => {
                job.extract = StepStatus::Failed;
                Err(err)
            }
        }
    }

    async fn step_simplify(
        &self,
        structure: &CurriculumStructure,
        job: &mut PipelineJob,
    ) -> Result<Vec<LessonDraft>, ApiError> {
        if job.simplify == StepStatus::Done {
            if let Some(staged) = read_staged::<Vec<LessonDraft>>(job, STAGED_LESSONS) {
                return Ok(staged);
            }
        }

        let mut drafts = drafts_from_structure(structure);
        let options = SimplifyOptions::default();

        for draft in &mut drafts {
            match self
                .vertex_ai
                .simplify_content(&draft.source_text, &options)
                .await
            {
                Ok(simplified) => draft.simplified = Some(simplified),
                Err(err) => {
                    job.simplify = StepStatus::Failed;
                    return Err(ApiError::upstream(format!(
                        "Failed to simplify content: {err}"
                    )));
                }
            }
        }

        stage(job, STAGED_LESSONS, &drafts);
        job.simplify = StepStatus::Done;
        self.checkpoint(job).await;
        Ok(drafts)
    }

    async fn step_cards(
        &self,
        drafts: &mut [LessonDraft],
        job: &mut PipelineJob,
    ) -> Result<(), ApiError> {
        if job.cards == StepStatus::Done {
            return Ok(());
        }

        for draft in drafts.iter_mut() {
            let content = draft
                .simplified
                .as_ref()
                .map(|s| s.simplified_text.as_str())
                .unwrap_or(&draft.source_text);
            match self
                .vertex_ai
                .generate_visual_cards(content, &draft.title)
                .await
            {
                Ok(cards) => draft.cards = cards,
                Err(err) => {
                    job.cards = StepStatus::Failed;
                    return Err(ApiError::upstream(format!(
                        "Failed to generate visual cards: {err}"
                    )));
                }
            }
        }

        stage(job, STAGED_LESSONS, &drafts);
        job.cards = StepStatus::Done;
        self.checkpoint(job).await;
        Ok(())
    }

    async fn step_exam(
        &self,
        drafts: &mut [LessonDraft],
        job: &mut PipelineJob,
    ) -> Result<(), ApiError> {
        if job.exam == StepStatus::Done {
            return Ok(());
        }

        for draft in drafts.iter_mut() {
            let content = draft
                .simplified
                .as_ref()
                .map(|s| s.simplified_text.as_str())
                .unwrap_or(&draft.source_text);
            match self
                .vertex_ai
                .generate_exam_questions(
                    content,
                    DEFAULT_EXAM_DIFFICULTY,
                    DEFAULT_QUESTION_COUNT,
                    None,
                )
                .await
            {
                Ok(questions) => draft.questions = questions,
                Err(err) => {
                    job.exam = StepStatus::Failed;
                    return Err(ApiError::upstream(format!("Failed to generate exam: {err}")));
                }
            }
        }

        stage(job, STAGED_LESSONS, &drafts);
        job.exam = StepStatus::Done;
        self.checkpoint(job).await;
        Ok(())
    }

    async fn step_audio(
        &self,
        drafts: &mut [LessonDraft],
        job: &mut PipelineJob,
    ) -> Result<(), ApiError> {
        if job.audio == StepStatus::Done {
            return Ok(());
        }

        let result = async {
            for draft in drafts.iter_mut() {
                let lesson_text = draft
                    .simplified
                    .as_ref()
                    .map(|s| s.simplified_text.clone())
                    .unwrap_or_else(|| draft.source_text.clone());
                draft.audio = Some(
                    self.speech
                        .generate_lesson_audio(&self.storage, &lesson_text, &draft.lesson_id)
                        .await?,
                );

                for (index, card) in draft.cards.iter_mut().enumerate() {
                    let text = if card.audio_text.is_empty() {
                        card.description.clone()
                    } else {
                        card.audio_text.clone()
                    };
                    let card_id = format!("{}-{index}", draft.lesson_id);
                    let artifact = self
                        .speech
                        .generate_card_audio(&self.storage, &text, &card_id)
                        .await?;
                    card.audio_url = Some(artifact.audio_url);
                    card.audio_duration_secs = Some(artifact.duration_secs);
                }

                for question in draft.questions.iter_mut() {
                    let text = if question.audio_text.is_empty() {
                        question.question.clone()
                    } else {
                        question.audio_text.clone()
                    };
                    let question_id = format!("{}-q{}", draft.lesson_id, question.id);
                    let artifact = self
                        .speech
                        .generate_question_audio(&self.storage, &text, &question_id)
                        .await?;
                    question.audio_url = Some(artifact.audio_url);
                }
            }
            Ok::<_, crate::services::speech::SpeechError>(())
        }
        .await;

        match result {
            Ok(()) => {
                stage(job, STAGED_LESSONS, &drafts);
                job.audio = StepStatus::Done;
                self.checkpoint(job).await;
                Ok(())
            }
            Err(err) => {
                job.audio = StepStatus::Failed;
                Err(ApiError::upstream(err.to_string()))
            }
        }
    }

    async fn step_persist(
        &self,
        curriculum: &Curriculum,
        drafts: &[LessonDraft],
        job: &mut PipelineJob,
    ) -> Result<u32, ApiError> {
        let result = async {
            // Replacement semantics: a re-run never merges with the
            // lessons of a previous run.
            self.remove_previous_lessons(&curriculum.id).await?;

            for draft in drafts {
                let now = now_iso();
                let simplified = draft.simplified.clone().unwrap_or_else(|| {
                    crate::services::vertex_ai::SimplifiedContent::fallback(&draft.source_text)
                });

                let lesson = Lesson {
                    id: draft.lesson_id.clone(),
                    curriculum_id: curriculum.id.clone(),
                    title: draft.title.clone(),
                    simplified_text: simplified.simplified_text,
                    key_points: simplified.key_points,
                    vocabulary: simplified.vocabulary,
                    visual_suggestions: simplified.visual_suggestions,
                    emoji_cues: simplified.emoji_cues,
                    cards: draft.cards.clone(),
                    audio_url: draft.audio.as_ref().map(|a| a.audio_url.clone()),
                    audio_duration_secs: draft.audio.as_ref().map(|a| a.duration_secs),
                    created_at: now.clone(),
                    updated_at: now.clone(),
                };
                lessons::create_lesson(&self.store, &lesson).await?;

                if !draft.questions.is_empty() {
                    let exam = Exam {
                        id: Uuid::new_v4().to_string(),
                        lesson_id: draft.lesson_id.clone(),
                        difficulty: DEFAULT_EXAM_DIFFICULTY,
                        questions: draft.questions.clone(),
                        created_at: now.clone(),
                        updated_at: now,
                    };
                    exams::create_exam(&self.store, &exam).await?;
                }
            }

            Ok::<_, crate::db::StoreError>(drafts.len() as u32)
        }
        .await;

        match result {
            Ok(count) => {
                job.persist = StepStatus::Done;
                Ok(count)
            }
            Err(err) => {
                job.persist = StepStatus::Failed;
                Err(err.into())
            }
        }
    }

    /// Delete a curriculum's previous lessons along with their audio
    /// objects. Audio cleanup is best-effort; document deletion is not.
    async fn remove_previous_lessons(
        &self,
        curriculum_id: &str,
    ) -> Result<(), crate::db::StoreError> {
        let existing = lessons::list_by_curriculum(&self.store, curriculum_id).await?;
        for lesson in existing {
            let mut audio_urls: Vec<&str> = lesson.audio_url.as_deref().into_iter().collect();
            audio_urls.extend(lesson.cards.iter().filter_map(|card| card.audio_url.as_deref()));

            for url in audio_urls {
                if let Some(object) =
                    crate::services::storage::object_from_public_url(url, &self.config.media_bucket)
                {
                    if let Err(err) = self
                        .storage
                        .delete_object(&self.config.media_bucket, object)
                        .await
                    {
                        tracing::warn!(error = %err, object, "stale audio cleanup failed");
                    }
                }
            }

            lessons::delete_lesson(&self.store, &lesson.id).await?;
        }
        Ok(())
    }

    /// Record an exam result, ask the model for the next difficulty, and
    /// regenerate the exam's questions when the recommendation moves.
    pub async fn analyze_exam(
        &self,
        exam_id: &str,
        result: ExamResult,
    ) -> Result<ExamAnalysis, ApiError> {
        let Some(exam) = exams::get_by_id(&self.store, exam_id).await? else {
            return Err(ApiError::not_found("Exam not found"));
        };

        exams::record_result(&self.store, &result).await?;

        let results_json = serde_json::to_value(&result)
            .map_err(|err| ApiError::internal(err.to_string()))?;
        let mut analysis = self
            .vertex_ai
            .analyze_performance(&results_json, exam.difficulty)
            .await;
        analysis.recommended_difficulty = analysis.recommended_difficulty.clamp(1, 5);

        // Spoken encouragement is best-effort; a synthesis failure never
        // blocks the analysis itself.
        let encouragement_audio_url = match self
            .speech
            .generate_feedback_audio(&self.storage, &analysis.encouragement, true)
            .await
        {
            Ok(artifact) => Some(artifact.audio_url),
            Err(err) => {
                tracing::warn!(error = %err, "encouragement audio failed");
                None
            }
        };

        let exam = self.adapt_exam_difficulty(exam, &analysis, &result).await?;

        Ok(ExamAnalysis {
            analysis,
            exam,
            encouragement_audio_url,
        })
    }

    async fn adapt_exam_difficulty(
        &self,
        exam: Exam,
        analysis: &PerformanceAnalysis,
        result: &ExamResult,
    ) -> Result<Exam, ApiError> {
        if analysis.recommended_difficulty == exam.difficulty {
            return Ok(exam);
        }

        let Some(lesson) = lessons::get_by_id(&self.store, &exam.lesson_id).await? else {
            return Ok(exam);
        };

        let performance = PreviousPerformance {
            score_percent: result.score_percent,
            struggles: result.struggles.clone(),
        };
        let questions = self
            .vertex_ai
            .generate_exam_questions(
                &lesson.simplified_text,
                analysis.recommended_difficulty,
                DEFAULT_QUESTION_COUNT,
                Some(&performance),
            )
            .await
            .map_err(|err| ApiError::upstream(format!("Failed to generate exam: {err}")))?;

        // An empty regeneration keeps the exam untouched rather than
        // wiping a working question set.
        if questions.is_empty() {
            return Ok(exam);
        }

        let updated = exams::replace_questions(
            &self.store,
            &exam.id,
            analysis.recommended_difficulty,
            &questions,
            &now_iso(),
        )
        .await?;

        Ok(updated)
    }

    /// Encouragement for a student's current emotional state, spoken when
    /// synthesis succeeds. Both halves degrade gracefully.
    pub async fn emotional_support(
        &self,
        emotional_state: &str,
        context: &str,
    ) -> (String, Option<String>) {
        let message = self
            .vertex_ai
            .generate_emotional_support(emotional_state, context)
            .await;

        let audio_url = match self
            .speech
            .generate_feedback_audio(&self.storage, &message, true)
            .await
        {
            Ok(artifact) => Some(artifact.audio_url),
            Err(err) => {
                tracing::warn!(error = %err, "support audio failed");
                None
            }
        };

        (message, audio_url)
    }

    fn acquire(&self, curriculum_id: &str) -> Result<ProcessGuard<'_>, ApiError> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(curriculum_id.to_string()) {
            return Err(ApiError::conflict("Curriculum is already being processed"));
        }
        Ok(ProcessGuard {
            pipeline: self,
            curriculum_id: curriculum_id.to_string(),
        })
    }

    async fn checkpoint(&self, job: &mut PipelineJob) {
        job.updated_at = now_iso();
        if let Err(err) = jobs::put_job(&self.store, job).await {
            // A lost checkpoint only costs resume granularity.
            tracing::warn!(error = %err, "pipeline checkpoint write failed");
        }
    }
}

struct ProcessGuard<'a> {
    pipeline: &'a CurriculumPipeline,
    curriculum_id: String,
}

impl Drop for ProcessGuard<'_> {
    fn drop(&mut self) {
        self.pipeline.in_flight.lock().remove(&self.curriculum_id);
    }
}

fn drafts_from_structure(structure: &CurriculumStructure) -> Vec<LessonDraft> {
    let sections: Vec<(String, String)> = if structure.sections.is_empty() {
        vec![(structure.title.clone(), structure.full_text.clone())]
    } else {
        structure
            .sections
            .iter()
            .map(|section| (section.title.clone(), section.content.join("\n\n")))
            .collect()
    };

    sections
        .into_iter()
        .map(|(title, source_text)| LessonDraft {
            lesson_id: Uuid::new_v4().to_string(),
            title,
            source_text,
            simplified: None,
            cards: Vec::new(),
            questions: Vec::new(),
            audio: None,
        })
        .collect()
}

fn has_failed_step(job: &PipelineJob) -> bool {
    [
        job.extract,
        job.simplify,
        job.cards,
        job.exam,
        job.audio,
        job.persist,
    ]
    .iter()
    .any(|status| *status == StepStatus::Failed)
}

fn reset_failed_steps(job: &mut PipelineJob) {
    for status in [
        &mut job.extract,
        &mut job.simplify,
        &mut job.cards,
        &mut job.exam,
        &mut job.audio,
        &mut job.persist,
    ] {
        if *status == StepStatus::Failed {
            *status = StepStatus::Pending;
        }
    }
}

fn stage<T: Serialize>(job: &mut PipelineJob, key: &str, value: &T) {
    if let Ok(json) = serde_json::to_value(value) {
        job.staged.insert(key.to_string(), json);
    }
}

fn read_staged<T: for<'de> Deserialize<'de>>(job: &PipelineJob, key: &str) -> Option<T> {
    job.staged
        .get(key)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::document_ai::Section;

    fn structure_with(sections: Vec<Section>) -> CurriculumStructure {
        CurriculumStructure {
            title: "Plant Biology".to_string(),
            sections,
            key_terms: vec![],
            full_text: "full document text".to_string(),
        }
    }

    #[test]
    fn one_draft_per_section() {
        let structure = structure_with(vec![
            Section {
                title: "CHAPTER 1".into(),
                content: vec!["one".into(), "two".into()],
            },
            Section {
                title: "CHAPTER 2".into(),
                content: vec!["three".into()],
            },
        ]);
        let drafts = drafts_from_structure(&structure);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].title, "CHAPTER 1");
        assert_eq!(drafts[0].source_text, "one\n\ntwo");
        assert_ne!(drafts[0].lesson_id, drafts[1].lesson_id);
    }

    #[test]
    fn sectionless_documents_become_a_single_lesson() {
        let drafts = drafts_from_structure(&structure_with(vec![]));
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title, "Plant Biology");
        assert_eq!(drafts[0].source_text, "full document text");
    }

    #[test]
    fn failed_steps_reset_for_resume() {
        let mut job = PipelineJob::new("c1", "t".into());
        job.extract = StepStatus::Done;
        job.simplify = StepStatus::Done;
        job.cards = StepStatus::Failed;
        assert!(has_failed_step(&job));

        reset_failed_steps(&mut job);
        assert_eq!(job.extract, StepStatus::Done);
        assert_eq!(job.simplify, StepStatus::Done);
        assert_eq!(job.cards, StepStatus::Pending);
        assert!(!has_failed_step(&job));
    }

    #[test]
    fn staged_values_round_trip() {
        let mut job = PipelineJob::new("c1", "t".into());
        let structure = structure_with(vec![]);
        stage(&mut job, STAGED_STRUCTURE, &structure);
        let back: CurriculumStructure = read_staged(&job, STAGED_STRUCTURE).unwrap();
        assert_eq!(back.title, "Plant Biology");
        assert!(read_staged::<CurriculumStructure>(&job, "missing").is_none());
    }
}
