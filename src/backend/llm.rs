//! AI capability over an `edgequake-llm` provider.
//!
//! Chat messages reference stored files by path. Before the request is sent
//! each file part is read from storage and attached according to its content:
//!
//! | Stored bytes | Sent as |
//! |--------------|---------|
//! | PDF          | page 1 rendered to PNG by the [`Rasterizer`] |
//! | PNG / JPEG   | the image itself |
//! | anything else | UTF-8 text (lossy) |
//!
//! Only page 1 of a PDF is sent; a resume that needs more pages than that
//! should be analysed through a hosted client that accepts PDF input.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Provider calls are
//! retried with exponential backoff (`retry_backoff_ms * 2^attempt`) up to
//! `max_retries` times; the default is no retry.

use crate::client::{
    AiApi, ChatOptions, ChatPrompt, ChatResponse, ContentPart, FsApi, ImageSource, UploadFile,
};
use crate::error::RemoteError;
use crate::pipeline::encode::{self, image_mime};
use crate::pipeline::render::Rasterizer;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_LOCAL_MODEL: &str = "gpt-4.1-mini";

const OCR_PROMPT: &str = "Transcribe all text visible in this image. \
Output only the transcribed text, preserving line breaks.";

/// Which provider to use, and how to call it.
#[derive(Clone)]
pub struct ProviderSettings {
    /// Pre-built provider; takes priority over everything else.
    pub provider: Option<Arc<dyn LLMProvider>>,
    /// Provider name such as `"openai"` or `"anthropic"`.
    pub provider_name: Option<String>,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider: None,
            provider_name: None,
            model: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("provider", &self.provider.as_ref().map(|_| "<provider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// How one stored file is attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    Image { bytes: Vec<u8>, mime_type: &'static str },
    Text(String),
}

/// [`AiApi`] backed by a vision-capable LLM provider.
pub struct LlmAi {
    settings: ProviderSettings,
    provider: OnceCell<Arc<dyn LLMProvider>>,
    fs: Arc<dyn FsApi>,
    rasterizer: Arc<Rasterizer>,
}

impl LlmAi {
    pub fn new(settings: ProviderSettings, fs: Arc<dyn FsApi>, rasterizer: Arc<Rasterizer>) -> Self {
        Self {
            settings,
            provider: OnceCell::new(),
            fs,
            rasterizer,
        }
    }

    async fn provider(&self) -> Result<&Arc<dyn LLMProvider>, RemoteError> {
        self.provider
            .get_or_try_init(|| async { resolve_provider(&self.settings) })
            .await
    }

    /// Read a stored file and decide how to attach it.
    pub async fn attachment(&self, path: &str) -> Result<Attachment, RemoteError> {
        let bytes = self.fs.read(path).await?;
        if bytes.starts_with(b"%PDF") {
            let name = path.rsplit('/').next().unwrap_or(path);
            let conversion = self.rasterizer.convert(&UploadFile::pdf(name, bytes)).await;
            return match conversion.file {
                Some(png) => Ok(Attachment::Image {
                    bytes: png.bytes,
                    mime_type: encode::PNG_MIME,
                }),
                None => Err(RemoteError::Provider(format!(
                    "Cannot attach '{}': {}",
                    path,
                    conversion.error.unwrap_or_default()
                ))),
            };
        }
        if let Some(mime_type) = image_mime(&bytes) {
            return Ok(Attachment::Image { bytes, mime_type });
        }
        Ok(Attachment::Text(String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn build_messages(
        &self,
        prompt: ChatPrompt,
        image_url: Option<String>,
    ) -> Result<Vec<ChatMessage>, RemoteError> {
        let mut messages = Vec::new();
        let turns = match prompt {
            ChatPrompt::Text(text) => vec![("user".to_string(), vec![ContentPart::Text { text }])],
            ChatPrompt::Messages(list) => list.into_iter().map(|m| (m.role, m.content)).collect(),
        };

        let mut extra_image = image_url.as_deref().map(image_from_url).transpose()?;
        let last_user = turns.iter().rposition(|(role, _)| role != "system");

        for (idx, (role, parts)) in turns.into_iter().enumerate() {
            let mut texts = Vec::new();
            let mut images = Vec::new();
            for part in parts {
                match part {
                    ContentPart::Text { text } => texts.push(text),
                    ContentPart::File { path } => match self.attachment(&path).await? {
                        Attachment::Image { bytes, mime_type } => {
                            debug!("Attaching {} as {}", path, mime_type);
                            images.push(encode::image_data(&bytes, mime_type));
                        }
                        Attachment::Text(text) => texts.push(text),
                    },
                }
            }
            if Some(idx) == last_user {
                images.extend(extra_image.take());
            }
            let text = texts.join("\n\n");
            if role == "system" {
                messages.push(ChatMessage::system(&text));
            } else {
                messages.push(ChatMessage::user_with_images(&text, images));
            }
        }
        Ok(messages)
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, RemoteError> {
        let provider = self.provider().await?;
        let options = CompletionOptions {
            temperature: Some(self.settings.temperature),
            max_tokens: Some(self.settings.max_tokens),
            ..Default::default()
        };

        let mut last_err = None;
        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.settings.retry_backoff_ms, attempt);
                warn!(
                    "AI request retry {}/{} after {}ms",
                    attempt, self.settings.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }
            match provider.chat(messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "AI response: {} input tokens, {} output tokens",
                        response.prompt_tokens, response.completion_tokens
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    warn!("AI request attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e.to_string());
                }
            }
        }
        Err(RemoteError::Provider(
            last_err.unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }
}

#[async_trait]
impl AiApi for LlmAi {
    async fn chat(
        &self,
        prompt: ChatPrompt,
        image_url: Option<String>,
        test_mode: bool,
        options: Option<ChatOptions>,
    ) -> Result<Option<ChatResponse>, RemoteError> {
        if let Some(model) = options.and_then(|o| o.model) {
            debug!("Requested model '{model}'; using the configured provider's model");
        }
        let messages = self.build_messages(prompt, image_url).await?;
        if test_mode {
            info!("Test mode: skipping provider call ({} messages)", messages.len());
            return Ok(Some(ChatResponse::text("")));
        }
        let content = self.complete(&messages).await?;
        if content.trim().is_empty() {
            warn!("AI provider returned an empty response");
            return Ok(None);
        }
        Ok(Some(ChatResponse::text(content)))
    }

    async fn img2txt(&self, image: ImageSource, test_mode: bool) -> Result<String, RemoteError> {
        let image = match image {
            ImageSource::Url(url) => image_from_url(&url)?,
            ImageSource::Bytes(bytes) => {
                let mime = image_mime(&bytes).ok_or_else(|| {
                    RemoteError::Rejected("Image must be PNG or JPEG".to_string())
                })?;
                encode::image_data(&bytes, mime)
            }
        };
        if test_mode {
            return Ok(String::new());
        }
        let messages = vec![
            ChatMessage::system(OCR_PROMPT),
            ChatMessage::user_with_images("", vec![image]),
        ];
        self.complete(&messages).await
    }
}

/// Image data from a `data:` URL; remote URLs are not fetched.
fn image_from_url(url: &str) -> Result<ImageData, RemoteError> {
    let (mime, payload) = encode::parse_data_url(url).ok_or_else(|| {
        RemoteError::Rejected("Only base64 data: image URLs are supported".to_string())
    })?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| RemoteError::Rejected(format!("Invalid base64 image data: {e}")))?;
    Ok(encode::image_data(&bytes, mime))
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, RemoteError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        RemoteError::Provider(format!(
            "LLM provider '{provider_name}' is not configured: {e}"
        ))
    })
}

/// Resolve the provider, from most-specific to least-specific.
///
/// 1. a pre-built provider
/// 2. a provider name plus optional model
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. OpenAI when `OPENAI_API_KEY` is set
/// 5. whatever `ProviderFactory::from_env` detects
fn resolve_provider(settings: &ProviderSettings) -> Result<Arc<dyn LLMProvider>, RemoteError> {
    if let Some(ref provider) = settings.provider {
        return Ok(Arc::clone(provider));
    }

    let model = settings.model.as_deref().unwrap_or(DEFAULT_LOCAL_MODEL);
    if let Some(ref name) = settings.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| {
        RemoteError::Provider(format!(
            "No LLM provider could be auto-detected from environment. \
             Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider. Error: {e}"
        ))
    })?;
    Ok(llm_provider)
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, saturating.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fs::LocalFs;
    use crate::pipeline::render::PageRenderer;
    use image::{DynamicImage, Rgba, RgbaImage};

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1000);
        assert_eq!(backoff_ms(500, 4), 4000);
        assert_eq!(backoff_ms(500, 60), u64::MAX);
        assert_eq!(backoff_ms(500, u32::MAX), u64::MAX);
    }

    struct WhitePage;

    impl PageRenderer for WhitePage {
        fn render_first_page(&self, _: &[u8], _: f32) -> Result<DynamicImage, String> {
            Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                4,
                4,
                Rgba([255, 255, 255, 255]),
            )))
        }
    }

    async fn ai() -> (tempfile::TempDir, Arc<LocalFs>, LlmAi) {
        let dir = tempfile::tempdir().unwrap();
        let fs = Arc::new(LocalFs::open(dir.path()).await.unwrap());
        let rasterizer = Arc::new(Rasterizer::with_renderer(1.0, Arc::new(WhitePage)));
        let ai = LlmAi::new(ProviderSettings::default(), fs.clone(), rasterizer);
        (dir, fs, ai)
    }

    #[tokio::test]
    async fn pdf_files_are_attached_as_rendered_png() {
        let (_dir, fs, ai) = ai().await;
        fs.write("/cv.pdf", b"%PDF-1.7".to_vec()).await.unwrap();
        match ai.attachment("/cv.pdf").await.unwrap() {
            Attachment::Image { bytes, mime_type } => {
                assert_eq!(mime_type, "image/png");
                assert_eq!(image_mime(&bytes), Some("image/png"));
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn text_files_are_inlined() {
        let (_dir, fs, ai) = ai().await;
        fs.write("/notes.txt", b"plain words".to_vec()).await.unwrap();
        assert_eq!(
            ai.attachment("/notes.txt").await.unwrap(),
            Attachment::Text("plain words".into())
        );
        assert!(matches!(
            ai.attachment("/missing").await,
            Err(RemoteError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mode_skips_the_provider() {
        let (_dir, _fs, ai) = ai().await;
        let resp = ai
            .chat(ChatPrompt::Text("hi".into()), None, true, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.message.content.to_text(), "");
    }

    #[test]
    fn only_data_urls_are_accepted() {
        let url = encode::data_url(b"\x89PNG\r\n\x1a\nrest", "image/png");
        assert!(image_from_url(&url).is_ok());
        assert!(matches!(
            image_from_url("https://example.com/a.png"),
            Err(RemoteError::Rejected(_))
        ));
    }
}
