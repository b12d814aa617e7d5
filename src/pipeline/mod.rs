//! Pipeline stages that turn a resume file into a preview image.
//!
//! Each submodule implements one step; the upload workflow in
//! [`crate::upload`] drives them in order.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ engine ──▶ render ──▶ encode
//! (path/URL)  (load once)  (pdfium)   (PNG, data URL)
//! ```
//!
//! 1. [`input`]: read a local path or download a URL into an
//!    [`UploadFile`](crate::client::UploadFile), checking magic bytes and size
//! 2. [`engine`]: once-only async initialisation shared by concurrent callers
//! 3. [`render`]: rasterise page 1; runs in `spawn_blocking` because pdfium
//!    is not async-safe
//! 4. [`encode`]: PNG-encode the page and wrap it as a data URL or as VLM
//!    image data

pub mod encode;
pub mod engine;
pub mod input;
pub mod render;
