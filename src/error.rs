//! Error types for the resumind library.
//!
//! Two error types mirror the two boundaries of the crate:
//!
//! * [`RemoteError`]: returned by the remote client traits in
//!   [`crate::client`] and passed through unchanged by
//!   [`crate::facade::Capabilities`]. `Unavailable` is the availability-gate
//!   case: no client has been injected into the environment yet.
//!
//! * [`ResumindError`]: returned by the upload workflow and the record
//!   store. Its `Display` text is the human-readable message shown to the
//!   user, so the workflow failure variants carry exactly the wording the
//!   caller should surface ("Failed to upload resume", …).
//!
//! A feedback text that does not parse as JSON is *not* an error: it becomes
//! [`crate::record::Feedback::Raw`] and the workflow carries on.

use std::path::PathBuf;
use thiserror::Error;

/// Failures at the remote client boundary.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// No remote client is present in the environment.
    #[error("{capability} not available")]
    Unavailable { capability: String },

    /// The requested file or key does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Local I/O failure inside a backend.
    #[error("I/O error: {0}")]
    Io(String),

    /// The AI provider returned an error.
    #[error("AI provider error: {0}")]
    Provider(String),

    /// A value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The remote side refused the request (not signed in, bad input, …).
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RemoteError::Unavailable { .. })
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            RemoteError::NotFound(e.to_string())
        } else {
            RemoteError::Io(e.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Serialization(e.to_string())
    }
}

/// All errors returned by the resumind workflow and record store.
#[derive(Debug, Error)]
pub enum ResumindError {
    // ── Workflow errors ───────────────────────────────────────────────────
    /// The remote client is not injected; the facade state already holds
    /// the same message.
    #[error("{0}")]
    CapabilityUnavailable(String),

    /// Storage accepted the request but returned no usable path.
    #[error("{0}")]
    UploadFailed(String),

    /// The rasterizer could not produce a preview image.
    #[error("{0}")]
    ConversionFailed(String),

    /// The AI call failed or returned an empty response.
    #[error("AI analysis failed")]
    AnalysisFailed,

    /// Submission made without a file.
    #[error("Please upload a PDF resume.")]
    MissingFile,

    /// The selected file is not acceptable (wrong type, too large).
    #[error("{reason}")]
    FileRejected { reason: String },

    /// A second submission arrived while one is still running.
    #[error("An analysis is already in progress")]
    AlreadyProcessing,

    /// A key-value or file operation failed outside the upload steps.
    #[error("Storage error: {0}")]
    Storage(#[from] RemoteError),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{name}'\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: [u8; 4] },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured AI provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResumindError {
    /// Map a remote failure to the workflow error, keeping the
    /// availability-gate message intact.
    pub(crate) fn from_remote_or(e: RemoteError, fallback: ResumindError) -> ResumindError {
        match e {
            RemoteError::Unavailable { .. } => ResumindError::CapabilityUnavailable(e.to_string()),
            _ => fallback,
        }
    }
}
