//! Progress-callback trait for upload workflow events.
//!
//! Inject an [`Arc<dyn UploadProgressCallback>`] via
//! [`crate::upload::UploadOrchestrator::with_progress`] to receive events as
//! the workflow moves through its stages. The same information is available
//! as a [`tokio::sync::watch`] stream from
//! [`crate::upload::UploadOrchestrator::subscribe`]; the callback suits hosts
//! that drive a terminal spinner or forward events elsewhere.
//!
//! # Example
//!
//! ```rust
//! use resumind::{UploadProgressCallback, UploadStage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     stages: AtomicUsize,
//! }
//!
//! impl UploadProgressCallback for CountingCallback {
//!     fn on_stage(&self, _stage: UploadStage, status: &str) {
//!         self.stages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{status}");
//!     }
//! }
//!
//! let cb: Arc<dyn UploadProgressCallback> = Arc::new(CountingCallback {
//!     stages: AtomicUsize::new(0),
//! });
//! cb.on_stage(UploadStage::Uploading, UploadStage::Uploading.status_text());
//! ```

use crate::upload::UploadStage;
use std::sync::Arc;

/// Called by the upload workflow as it advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait UploadProgressCallback: Send + Sync {
    /// Called on entry to every non-idle stage, with its status text.
    fn on_stage(&self, stage: UploadStage, status: &str) {
        let _ = (stage, status);
    }

    /// Called once when the workflow stops with an error.
    fn on_error(&self, message: &str) {
        let _ = message;
    }

    /// Called once after the record has been written with feedback.
    fn on_complete(&self, id: &str) {
        let _ = id;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl UploadProgressCallback for NoopProgressCallback {}

/// Convenience alias for the type stored by the orchestrator.
pub type ProgressCallback = Arc<dyn UploadProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl UploadProgressCallback for Recorder {
        fn on_stage(&self, stage: UploadStage, _status: &str) {
            self.events.lock().unwrap().push(format!("{stage:?}"));
        }

        fn on_error(&self, message: &str) {
            self.events.lock().unwrap().push(format!("error: {message}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage(UploadStage::Converting, "Converting");
        cb.on_error("boom");
        cb.on_complete("id");
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Recorder::default();
        rec.on_stage(UploadStage::Uploading, "Uploading resume...");
        rec.on_error("Failed to upload resume");
        rec.on_complete("ignored by default");
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["Uploading", "error: Failed to upload resume"]
        );
    }
}
