//! The upload → convert → analyze → persist workflow.
//!
//! ```text
//! Idle ─▶ Uploading ─▶ Converting ─▶ UploadingPreview ─▶ SavingMetadata
//!                                                            │
//!                     Complete ◀── RequestingAnalysis ◀──────┘
//!
//! any non-idle stage ──failure──▶ Error
//! ```
//!
//! Steps run strictly in order; each depends on the output of the one before
//! (a storage path, a record id). The first failure stops the run with a
//! user-facing message and nothing is retried. The record saved in
//! `SavingMetadata` is a checkpoint: it stays behind, with pending feedback,
//! if the analysis step fails.
//!
//! Progress is observable two ways: [`UploadOrchestrator::subscribe`] yields a
//! `watch` receiver of [`UploadState`], and an optional
//! [`UploadProgressCallback`](crate::progress::UploadProgressCallback) is told
//! about every stage.

use crate::client::UploadFile;
use crate::config::AppConfig;
use crate::error::ResumindError;
use crate::facade::Capabilities;
use crate::pipeline::input::validate_upload;
use crate::pipeline::render::Rasterizer;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::prompts::prepare_instructions;
use crate::record::{Feedback, ResumeRecord};
use crate::utils::generate_id;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Where a submission currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadStage {
    #[default]
    Idle,
    Uploading,
    Converting,
    UploadingPreview,
    SavingMetadata,
    RequestingAnalysis,
    Complete,
    Error,
}

impl UploadStage {
    /// Status line shown while the stage runs; empty for `Idle` and `Error`.
    pub fn status_text(self) -> &'static str {
        match self {
            UploadStage::Idle | UploadStage::Error => "",
            UploadStage::Uploading => "Uploading resume...",
            UploadStage::Converting => "Converting PDF to image (for preview)...",
            UploadStage::UploadingPreview => "Uploading preview image...",
            UploadStage::SavingMetadata => "Saving metadata...",
            UploadStage::RequestingAnalysis => "Requesting AI analysis...",
            UploadStage::Complete => "Analysis complete, opening review...",
        }
    }
}

/// Observable workflow state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadState {
    pub stage: UploadStage,
    /// Status line of the running stage; empty after a failure.
    pub status: String,
    pub error: Option<String>,
    pub is_processing: bool,
}

/// What the user submitted.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub file: Option<UploadFile>,
}

impl Submission {
    pub fn new(file: UploadFile) -> Self {
        Self {
            file: Some(file),
            ..Default::default()
        }
    }

    pub fn with_job(
        mut self,
        company_name: impl Into<String>,
        job_title: impl Into<String>,
        job_description: impl Into<String>,
    ) -> Self {
        self.company_name = company_name.into();
        self.job_title = job_title.into();
        self.job_description = job_description.into();
        self
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The record as persisted, feedback included.
    pub record: ResumeRecord,
    /// Route of the review view, `/resume/<id>`.
    pub review_path: String,
}

impl UploadOutcome {
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

/// Drives one submission at a time through the workflow.
pub struct UploadOrchestrator {
    caps: Arc<Capabilities>,
    rasterizer: Arc<Rasterizer>,
    max_upload_bytes: u64,
    state: watch::Sender<UploadState>,
    in_flight: AtomicBool,
    progress: ProgressCallback,
}

/// Clears the single-flight flag when a run ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl UploadOrchestrator {
    pub fn new(caps: Arc<Capabilities>, rasterizer: Arc<Rasterizer>, config: &AppConfig) -> Self {
        let (state, _) = watch::channel(UploadState::default());
        Self {
            caps,
            rasterizer,
            max_upload_bytes: config.max_upload_bytes,
            state,
            in_flight: AtomicBool::new(false),
            progress: Arc::new(NoopProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> UploadState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.state.subscribe()
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run the whole workflow for one submission.
    ///
    /// A second call while a run is in flight is rejected with
    /// [`ResumindError::AlreadyProcessing`] and does not touch the state of
    /// the running submission.
    pub async fn submit(&self, submission: Submission) -> Result<UploadOutcome, ResumindError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Submission rejected: another analysis is running");
            return Err(ResumindError::AlreadyProcessing);
        }
        let _guard = InFlight(&self.in_flight);

        let result = match self.validate(&submission) {
            Ok(()) => self.run(submission).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(record) => {
                self.state.send_modify(|s| {
                    s.stage = UploadStage::Complete;
                    s.status = UploadStage::Complete.status_text().to_string();
                    s.is_processing = false;
                });
                info!("Analysis of resume {} complete", record.id);
                self.progress.on_complete(&record.id);
                Ok(UploadOutcome {
                    review_path: format!("/resume/{}", record.id),
                    record,
                })
            }
            Err(e) => {
                let msg = e.to_string();
                warn!("Upload workflow failed: {msg}");
                self.state.send_modify(|s| {
                    s.stage = UploadStage::Error;
                    s.status.clear();
                    s.error = Some(msg.clone());
                    s.is_processing = false;
                });
                self.progress.on_error(&msg);
                Err(e)
            }
        }
    }

    fn validate(&self, submission: &Submission) -> Result<(), ResumindError> {
        let file = submission.file.as_ref().ok_or(ResumindError::MissingFile)?;
        validate_upload(file, self.max_upload_bytes)
    }

    fn enter(&self, stage: UploadStage) {
        let status = stage.status_text();
        info!("{status}");
        self.state.send_modify(|s| {
            s.stage = stage;
            s.status = status.to_string();
            s.error = None;
            s.is_processing = true;
        });
        self.progress.on_stage(stage, status);
    }

    async fn run(&self, submission: Submission) -> Result<ResumeRecord, ResumindError> {
        let Submission {
            company_name,
            job_title,
            job_description,
            file,
        } = submission;
        let file = file.ok_or(ResumindError::MissingFile)?;

        // 1. original file
        self.enter(UploadStage::Uploading);
        let resume_path = self
            .upload_one(file.clone(), "Failed to upload resume")
            .await?;
        debug!("Resume stored at {resume_path}");

        // 2. preview
        self.enter(UploadStage::Converting);
        let conversion = self.rasterizer.convert(&file).await;
        let preview = conversion.file.ok_or_else(|| {
            ResumindError::ConversionFailed(
                conversion
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "PDF conversion failed".to_string()),
            )
        })?;

        self.enter(UploadStage::UploadingPreview);
        let image_path = self.upload_one(preview, "Failed to upload image").await?;
        debug!("Preview stored at {image_path}");

        // 3. checkpoint
        self.enter(UploadStage::SavingMetadata);
        let mut record = ResumeRecord::new(
            generate_id(),
            resume_path,
            image_path,
            company_name,
            job_title,
            job_description,
        );
        self.save(&record).await?;

        // 4. analysis
        self.enter(UploadStage::RequestingAnalysis);
        let instructions = prepare_instructions(&record.job_title, &record.job_description);
        let response = self
            .caps
            .ai()
            .feedback(&record.resume_path, &instructions)
            .await
            .map_err(|e| {
                warn!("Feedback request failed: {e}");
                ResumindError::from_remote_or(e, ResumindError::AnalysisFailed)
            })?
            .ok_or(ResumindError::AnalysisFailed)?;

        let text = response.message.content.to_text();
        record.feedback = Feedback::from_response_text(&text);
        if let Feedback::Raw(_) = record.feedback {
            warn!("AI feedback for {} is not report JSON; storing raw text", record.id);
        }
        self.save(&record).await?;
        Ok(record)
    }

    /// Upload a single file and return its storage path.
    async fn upload_one(&self, file: UploadFile, failure: &str) -> Result<String, ResumindError> {
        let item = self.caps.fs().upload(vec![file]).await.map_err(|e| {
            warn!("{failure}: {e}");
            ResumindError::from_remote_or(e, ResumindError::UploadFailed(failure.to_string()))
        })?;
        item.map(|i| i.path)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ResumindError::UploadFailed(failure.to_string()))
    }

    async fn save(&self, record: &ResumeRecord) -> Result<(), ResumindError> {
        let json = record
            .to_json()
            .map_err(|e| ResumindError::Internal(format!("Failed to encode record: {e}")))?;
        let stored = self
            .caps
            .kv()
            .set(&record.key(), &json)
            .await
            .map_err(|e| ResumindError::from_remote_or(e.clone(), ResumindError::Storage(e)))?;
        if !stored {
            warn!("Key-value store did not confirm write of {}", record.key());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_texts() {
        assert_eq!(UploadStage::Uploading.status_text(), "Uploading resume...");
        assert_eq!(
            UploadStage::Converting.status_text(),
            "Converting PDF to image (for preview)..."
        );
        assert_eq!(
            UploadStage::Complete.status_text(),
            "Analysis complete, opening review..."
        );
        assert_eq!(UploadStage::Idle.status_text(), "");
    }

    #[test]
    fn submission_builder() {
        let s = Submission::new(UploadFile::pdf("cv.pdf", b"%PDF".to_vec())).with_job(
            "Acme",
            "Engineer",
            "Build things.",
        );
        assert_eq!(s.company_name, "Acme");
        assert_eq!(s.file.unwrap().name, "cv.pdf");
        assert!(Submission::default().file.is_none());
    }

    #[test]
    fn in_flight_guard_releases_flag() {
        let flag = AtomicBool::new(true);
        drop(InFlight(&flag));
        assert!(!flag.load(Ordering::SeqCst));
    }
}
