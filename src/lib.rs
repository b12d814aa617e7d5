//! # resumind
//!
//! Upload a PDF resume, render a preview of its first page, and get a
//! structured ATS-style review from an AI model.
//!
//! ## Why this crate?
//!
//! All durable state (files, key-value records, the signed-in user) and the
//! AI model itself live behind a *remote client* that the host injects. This
//! crate owns what sits in between: the workflow that moves a resume through
//! storage, rendering and analysis, and the data contracts for what gets
//! stored.
//!
//! ## Workflow
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Upload    store the original through fs.upload
//!  ├─ 2. Render    page 1 → PNG via pdfium (loaded once, spawn_blocking)
//!  ├─ 3. Upload    store the preview image
//!  ├─ 4. Save      record `resume:<id>` with pending feedback (checkpoint)
//!  ├─ 5. Analyze   one chat turn: file reference + instructions
//!  ├─ 6. Parse     report JSON, or keep the raw text
//!  └─ 7. Save      overwrite the record with feedback
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resumind::backend::{local_client, ProviderSettings};
//! use resumind::{AppConfig, Capabilities, Environment, Rasterizer, Submission,
//!                UploadFile, UploadOrchestrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::default();
//!     let rasterizer = Arc::new(Rasterizer::new(&config));
//!     let client = local_client(&config, "me", ProviderSettings::default(),
//!                               Arc::clone(&rasterizer)).await?;
//!
//!     let caps = Arc::new(Capabilities::new(Environment::with_client(client), &config));
//!     caps.init().await;
//!
//!     let bytes = std::fs::read("resume.pdf")?;
//!     let uploader = UploadOrchestrator::new(caps, rasterizer, &config);
//!     let outcome = uploader
//!         .submit(Submission::new(UploadFile::pdf("resume.pdf", bytes))
//!             .with_job("Acme", "Engineer", "Build things."))
//!         .await?;
//!     println!("review at {}", outcome.review_path);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resumind` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod facade;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod store;
pub mod upload;
pub mod utils;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{
    ChatContent, ChatOptions, ChatPrompt, ChatResponse, Environment, FsItem, ImageSource,
    KvEntry, RemoteClient, UploadFile, User,
};
pub use config::{AppConfig, AppConfigBuilder};
pub use error::{RemoteError, ResumindError};
pub use facade::{AuthState, Capabilities, FacadeState};
pub use pipeline::render::{PageRenderer, PdfConversionResult, Rasterizer};
pub use progress::{NoopProgressCallback, ProgressCallback, UploadProgressCallback};
pub use record::{CategoryReport, Feedback, FeedbackReport, ResumeRecord, Tip, TipKind};
pub use store::{ResumeReview, ResumeStore, ResumeSummary, ScoreBadge, WipeReport};
pub use upload::{Submission, UploadOrchestrator, UploadOutcome, UploadStage, UploadState};
pub use utils::{format_size, generate_id};
