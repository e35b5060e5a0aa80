//! Resume Analysis Pipeline — upload, rasterize, persist, score.
//!
//! Flow: upload resume → convert to image → upload image → persist record
//!       (empty feedback) → model feedback → parse → persist record with feedback.
//!
//! Strictly sequential. Any stage failure stops the run and leaves earlier
//! side effects in place; there is no rollback and no retry. Progress and the
//! final error live on the caller's `Progress`, never on the global error slot.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::analysis::convert::{DocumentConverter, IdSource};
use crate::analysis::prompts::prepare_instructions;
use crate::analysis::record::{Feedback, FeedbackDocument, ResumeRecord};
use crate::client::{FileStore, InferenceClient, KeyValueStore, PlatformClient};
use crate::platform::FileBlob;

pub const STATUS_UPLOADING: &str = "Uploading the file...";
pub const STATUS_CONVERTING: &str = "Converting to image...";
pub const STATUS_UPLOADING_IMAGE: &str = "Uploading the image...";
pub const STATUS_PREPARING: &str = "Preparing data...";
pub const STATUS_ANALYZING: &str = "Analyzing...";
pub const STATUS_COMPLETE: &str = "Analysis complete, redirecting...";

/// Why a run stopped. `Display` is the status text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("Error: No file selected")]
    NoFile,

    #[error("Error: Failed to upload file")]
    Upload,

    #[error("Error: Failed to convert PDF to image")]
    Conversion,

    #[error("Error: Failed to upload image")]
    ImageUpload,

    #[error("Error: Failed to save resume record")]
    Persist,

    #[error("Error: Failed to analyze resume")]
    Analysis,

    #[error("Error: Failed to parse analysis feedback")]
    Parse,

    #[error("Error: Failed to save analysis feedback")]
    FeedbackPersist,
}

impl StageError {
    /// Stage number (1–7) that failed; 0 for input rejected before stage 1.
    pub fn stage(&self) -> u8 {
        match self {
            StageError::NoFile => 0,
            StageError::Upload => 1,
            StageError::Conversion => 2,
            StageError::ImageUpload => 3,
            StageError::Persist => 4,
            StageError::Analysis => 5,
            StageError::Parse => 6,
            StageError::FeedbackPersist => 7,
        }
    }
}

/// Observable status text for one pipeline run.
pub struct Progress {
    status: watch::Sender<String>,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    pub fn new() -> Self {
        let (status, _) = watch::channel(String::new());
        Self { status }
    }

    pub fn current(&self) -> String {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.status.subscribe()
    }

    fn set(&self, text: impl Into<String>) {
        self.status.send_replace(text.into());
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub resume: FileBlob,
}

pub struct AnalysisPipeline {
    fs: FileStore,
    ai: InferenceClient,
    kv: KeyValueStore,
    converter: Arc<dyn DocumentConverter>,
    ids: Arc<dyn IdSource>,
}

impl AnalysisPipeline {
    pub fn new(
        client: &PlatformClient,
        converter: Arc<dyn DocumentConverter>,
        ids: Arc<dyn IdSource>,
    ) -> Self {
        Self {
            fs: client.fs().clone(),
            ai: client.ai().clone(),
            kv: client.kv().clone(),
            converter,
            ids,
        }
    }

    /// Runs every stage in order. On failure the progress text holds the
    /// error, and whatever earlier stages stored stays stored.
    pub async fn analyze(
        &self,
        request: AnalysisRequest,
        progress: &Progress,
    ) -> Result<ResumeRecord, StageError> {
        let result = self.run(request, progress).await;
        if let Err(e) = &result {
            warn!(stage = e.stage(), "Resume analysis aborted: {e}");
            progress.set(e.to_string());
        }
        result
    }

    async fn run(
        &self,
        request: AnalysisRequest,
        progress: &Progress,
    ) -> Result<ResumeRecord, StageError> {
        if request.resume.is_empty() {
            return Err(StageError::NoFile);
        }

        // Stage 1: upload the document
        progress.set(STATUS_UPLOADING);
        let uploaded = self
            .fs
            .upload(vec![request.resume.clone()])
            .await
            .map_err(|_| StageError::Upload)?;

        // Stage 2: rasterize
        progress.set(STATUS_CONVERTING);
        let image = self
            .converter
            .convert_to_image(&request.resume)
            .await
            .map_err(|e| {
                warn!("Conversion of {} failed: {e}", request.resume.name);
                StageError::Conversion
            })?;

        // Stage 3: upload the image
        progress.set(STATUS_UPLOADING_IMAGE);
        let uploaded_image = self
            .fs
            .upload(vec![image])
            .await
            .map_err(|_| StageError::ImageUpload)?;

        // Stage 4: persist the record with empty feedback
        progress.set(STATUS_PREPARING);
        let mut record = ResumeRecord {
            id: self.ids.next_id(),
            resume_path: uploaded.path,
            image_path: uploaded_image.path,
            company_name: request.company_name,
            job_title: request.job_title,
            job_description: request.job_description,
            feedback: Feedback::pending(),
        };
        if !self.save(&record).await {
            return Err(StageError::Persist);
        }

        // Stage 5: ask the model
        progress.set(STATUS_ANALYZING);
        let instructions = prepare_instructions(&record.job_title, &record.job_description);
        let response = self
            .ai
            .feedback(&record.resume_path, &instructions)
            .await
            .map_err(|_| StageError::Analysis)?;

        // Stage 6: extract and parse
        let text = response.message.content.text().ok_or_else(|| {
            warn!("Feedback response for {} carried no text", record.id);
            StageError::Parse
        })?;
        let document = FeedbackDocument::parse(text).map_err(|e| {
            warn!("Feedback for {} is not a JSON object: {e}", record.id);
            StageError::Parse
        })?;

        // Stage 7: overwrite the record with feedback
        record.feedback = Feedback::Document(document);
        if !self.save(&record).await {
            return Err(StageError::FeedbackPersist);
        }

        progress.set(STATUS_COMPLETE);
        info!(
            "Analyzed resume {} (overall score: {:?})",
            record.id,
            record.feedback.document().and_then(|d| d.overall_score())
        );
        Ok(record)
    }

    /// `true` once the key store has accepted the record.
    async fn save(&self, record: &ResumeRecord) -> bool {
        let value = match serde_json::to_string(record) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize record {}: {e}", record.id);
                return false;
            }
        };
        match self.kv.set(&record.key(), &value).await {
            Ok(true) => true,
            Ok(false) => {
                warn!("Key store refused record {}", record.id);
                false
            }
            Err(_) => false,
        }
    }
}
