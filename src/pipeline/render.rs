//! PDF rasterisation: page 1 of an in-memory PDF → named PNG preview.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with internal state; rendering is CPU-bound and
//! must not stall Tokio worker threads. Both binding the library and rendering
//! run on the blocking pool.
//!
//! ## Why a trait?
//!
//! [`Rasterizer`] talks to a [`PageRenderer`], loaded lazily through an
//! [`EngineCell`]. The default loader binds pdfium; tests and hosts without a
//! native library can plug in another renderer.

use crate::client::UploadFile;
use crate::config::AppConfig;
use crate::pipeline::encode::{self, PNG_MIME};
use crate::pipeline::engine::{EngineCell, EngineFuture};
use futures::FutureExt;
use image::DynamicImage;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Renders the first page of a PDF document.
pub trait PageRenderer: Send + Sync {
    fn render_first_page(&self, pdf: &[u8], scale: f32) -> Result<DynamicImage, String>;
}

/// Creates a fresh engine; called at most once per successful load.
pub type EngineLoader = Arc<dyn Fn() -> EngineFuture<dyn PageRenderer> + Send + Sync>;

/// Outcome of [`Rasterizer::convert`].
///
/// Either `file` is set and `error` is `None`, or `file` is `None`,
/// `image_url` is empty and `error` holds a non-empty description.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfConversionResult {
    /// `data:image/png;base64,…` URL of the preview.
    pub image_url: String,
    /// The preview as a named PNG file, ready to upload.
    pub file: Option<UploadFile>,
    pub error: Option<String>,
}

impl PdfConversionResult {
    fn failed(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "PDF conversion failed".to_string();
        }
        Self {
            image_url: String::new(),
            file: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.file.is_some()
    }
}

/// Turns uploaded PDFs into preview images.
pub struct Rasterizer {
    engine: EngineCell<dyn PageRenderer>,
    loader: EngineLoader,
    scale: f32,
}

impl Rasterizer {
    /// Rasterizer backed by pdfium, bound on first use.
    pub fn new(config: &AppConfig) -> Self {
        Self::with_loader(config.render_scale, pdfium_loader(config.resolved_pdfium_path()))
    }

    /// Rasterizer with a custom engine loader.
    pub fn with_loader(scale: f32, loader: EngineLoader) -> Self {
        Self {
            engine: EngineCell::new(),
            loader,
            scale,
        }
    }

    /// Rasterizer around an already-constructed renderer.
    pub fn with_renderer(scale: f32, renderer: Arc<dyn PageRenderer>) -> Self {
        Self::with_loader(
            scale,
            Arc::new(move || {
                let renderer = Arc::clone(&renderer);
                async move { Ok(renderer) }.boxed()
            }),
        )
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Render page 1 of `document` to a PNG preview.
    ///
    /// Never fails out-of-band: every problem (engine load, unreadable
    /// document, render or encode failure) is reported in the result's
    /// `error` field.
    pub async fn convert(&self, document: &UploadFile) -> PdfConversionResult {
        match self.try_convert(document).await {
            Ok((image_url, file)) => {
                info!("Rendered preview '{}' ({} bytes)", file.name, file.bytes.len());
                PdfConversionResult {
                    image_url,
                    file: Some(file),
                    error: None,
                }
            }
            Err(e) => {
                warn!("PDF conversion of '{}' failed: {}", document.name, e);
                PdfConversionResult::failed(e)
            }
        }
    }

    async fn try_convert(&self, document: &UploadFile) -> Result<(String, UploadFile), String> {
        let engine = self
            .engine
            .get_or_init(|| (self.loader)())
            .await
            .map_err(|e| format!("Failed to load PDF engine: {e}"))?;

        if document.bytes.is_empty() {
            return Err(format!("No PDF data in '{}'", document.name));
        }

        let bytes = document.bytes.clone();
        let scale = self.scale;
        let image = tokio::task::spawn_blocking(move || engine.render_first_page(&bytes, scale))
            .await
            .map_err(|e| format!("Render task panicked: {e}"))??;
        debug!("Rendered page 1 → {}x{} px", image.width(), image.height());

        let png = encode::encode_png(&image).map_err(|e| format!("Failed to create blob: {e}"))?;
        let image_url = encode::data_url(&png, PNG_MIME);
        let file = UploadFile::new(preview_file_name(&document.name), PNG_MIME, png);
        Ok((image_url, file))
    }
}

static RE_PDF_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.pdf$").unwrap());

/// Preview name: a trailing `.pdf` (any case) removed once, then `.png` appended.
pub fn preview_file_name(pdf_name: &str) -> String {
    format!("{}.png", RE_PDF_SUFFIX.replace(pdf_name, ""))
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// [`PageRenderer`] backed by a bound pdfium library.
pub struct PdfiumRenderer {
    pdfium: Pdfium,
}

impl PdfiumRenderer {
    /// Bind pdfium from `lib_path` (a file or the directory holding it), or
    /// from the system library search path.
    pub fn bind(lib_path: Option<&Path>) -> Result<Self, String> {
        let bindings = match lib_path {
            Some(path) if path.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
            }
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| {
            format!(
                "Failed to bind to pdfium library ({}): {:?}. Set PDFIUM_LIB_PATH=/path/to/libpdfium.",
                lib_path.map_or_else(|| "system".to_string(), |p| p.display().to_string()),
                e
            )
        })?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_first_page(&self, pdf: &[u8], scale: f32) -> Result<DynamicImage, String> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| format!("Failed to open PDF document: {e:?}"))?;

        let pages = document.pages();
        if pages.len() == 0 {
            return Err("PDF document has no pages".to_string());
        }
        let page = pages
            .get(0)
            .map_err(|e| format!("Failed to read page 1: {e:?}"))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| format!("Failed to render page 1: {e:?}"))?;

        Ok(bitmap.as_image())
    }
}

fn pdfium_loader(lib_path: Option<PathBuf>) -> EngineLoader {
    Arc::new(move || {
        let lib_path = lib_path.clone();
        async move {
            info!("Loading pdfium engine");
            let renderer =
                tokio::task::spawn_blocking(move || PdfiumRenderer::bind(lib_path.as_deref()))
                    .await
                    .map_err(|e| format!("Engine load task panicked: {e}"))??;
            Ok(Arc::new(renderer) as Arc<dyn PageRenderer>)
        }
        .boxed()
    })
}
