//! Configuration for the resume workflow.
//!
//! Every knob lives in [`AppConfig`], built via [`AppConfigBuilder`]. The
//! defaults reproduce the behaviour the web client shipped with: a 2× preview
//! render, a 20 MB upload limit, and a remote client that is polled for every
//! 100 ms for up to 10 seconds.

use crate::error::ResumindError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Model identifier sent with every feedback request.
pub const DEFAULT_FEEDBACK_MODEL: &str = "claude-3-7-sonnet";

/// Name used in availability messages ("Remote client not available").
pub const DEFAULT_CLIENT_NAME: &str = "Remote client";

/// Configuration for the upload → convert → analyze → persist workflow.
///
/// # Example
/// ```rust
/// use resumind::AppConfig;
///
/// let config = AppConfig::builder()
///     .render_scale(1.5)
///     .feedback_model("claude-3-7-sonnet")
///     .build()
///     .unwrap();
/// assert_eq!(config.render_scale, 1.5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the remote client, used in availability error messages.
    pub client_name: String,

    /// Model identifier passed with the feedback request. Default: `claude-3-7-sonnet`.
    pub feedback_model: String,

    /// Scale factor applied to page 1 when rendering the preview. Range: 0.5–4.0. Default: 2.0.
    pub render_scale: f32,

    /// Largest resume accepted for upload, in bytes. Default: 20 MB.
    pub max_upload_bytes: u64,

    /// How often `init` checks whether the remote client has been injected. Default: 100 ms.
    pub init_poll_interval: Duration,

    /// How long `init` waits for the remote client before giving up. Default: 10 s.
    pub init_timeout: Duration,

    /// Explicit pdfium library path. Falls back to `PDFIUM_LIB_PATH`, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Root directory of the local backend (files + key-value snapshot).
    pub data_dir: PathBuf,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            feedback_model: DEFAULT_FEEDBACK_MODEL.to_string(),
            render_scale: 2.0,
            max_upload_bytes: 20 * 1024 * 1024,
            init_poll_interval: Duration::from_millis(100),
            init_timeout: Duration::from_secs(10),
            pdfium_lib_path: None,
            data_dir: PathBuf::from(".resumind"),
            download_timeout_secs: 120,
        }
    }
}

impl AppConfig {
    /// Create a new builder for `AppConfig`.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder {
            config: Self::default(),
        }
    }

    /// The pdfium library path to bind, if one was configured or exported.
    pub fn resolved_pdfium_path(&self) -> Option<PathBuf> {
        self.pdfium_lib_path.clone().or_else(|| {
            std::env::var("PDFIUM_LIB_PATH")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
        })
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = name.into();
        self
    }

    pub fn feedback_model(mut self, model: impl Into<String>) -> Self {
        self.config.feedback_model = model.into();
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn init_poll_interval(mut self, interval: Duration) -> Self {
        self.config.init_poll_interval = interval;
        self
    }

    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.config.init_timeout = timeout;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AppConfig, ResumindError> {
        let c = &self.config;
        if !(0.5..=4.0).contains(&c.render_scale) {
            return Err(ResumindError::InvalidConfig(format!(
                "Render scale must be 0.5–4.0, got {}",
                c.render_scale
            )));
        }
        if c.feedback_model.trim().is_empty() {
            return Err(ResumindError::InvalidConfig(
                "Feedback model must not be empty".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(ResumindError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if c.init_poll_interval.is_zero() || c.init_poll_interval > c.init_timeout {
            return Err(ResumindError::InvalidConfig(format!(
                "Init poll interval ({:?}) must be non-zero and within the init timeout ({:?})",
                c.init_poll_interval, c.init_timeout
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_web_client() {
        let c = AppConfig::default();
        assert_eq!(c.render_scale, 2.0);
        assert_eq!(c.feedback_model, "claude-3-7-sonnet");
        assert_eq!(c.max_upload_bytes, 20_971_520);
        assert_eq!(c.init_poll_interval, Duration::from_millis(100));
        assert_eq!(c.init_timeout, Duration::from_secs(10));
    }

    #[test]
    fn build_rejects_out_of_range_scale() {
        let err = AppConfig::builder().render_scale(8.0).build().unwrap_err();
        assert!(err.to_string().contains("Render scale"), "got: {err}");
    }

    #[test]
    fn build_rejects_poll_longer_than_timeout() {
        let err = AppConfig::builder()
            .init_poll_interval(Duration::from_secs(20))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("poll interval"), "got: {err}");
    }

    #[test]
    fn explicit_pdfium_path_wins() {
        let c = AppConfig::builder()
            .pdfium_lib_path("/opt/pdfium/libpdfium.so")
            .build()
            .unwrap();
        assert_eq!(
            c.resolved_pdfium_path(),
            Some(PathBuf::from("/opt/pdfium/libpdfium.so"))
        );
    }
}
