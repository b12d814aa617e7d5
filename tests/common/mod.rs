//! Shared fixtures for the integration tests.
//!
//! Files and records go through the real local backends in a temp
//! directory; the AI capability and the PDF engine are scripted fakes.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use resumind::backend::{LocalAuth, LocalFs, MemoryKv};
use resumind::client::{AiApi, ChatPrompt, FsApi, FsItem, ImageSource};
use resumind::{
    AppConfig, Capabilities, ChatOptions, ChatResponse, Environment, PageRenderer, Rasterizer,
    RemoteClient, RemoteError, UploadFile, UploadProgressCallback, UploadStage,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const REPORT_JSON: &str = r#"{
  "overallScore": 78,
  "ATS": { "score": 80, "tips": [{ "type": "good", "tip": "Clear headings" }] },
  "toneAndStyle": { "score": 75, "tips": [] },
  "content": { "score": 70, "tips": [{ "type": "improve", "tip": "Quantify results", "explanation": "Add numbers." }] },
  "structure": { "score": 85, "tips": [] },
  "skills": { "score": 72, "tips": [] }
}"#;

pub fn resume_pdf() -> UploadFile {
    UploadFile::pdf("resume.pdf", b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF".to_vec())
}

pub fn config(dir: &std::path::Path) -> AppConfig {
    AppConfig::builder()
        .client_name("Test client")
        .data_dir(dir)
        .init_poll_interval(Duration::from_millis(100))
        .init_timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

// ── PDF engine ───────────────────────────────────────────────────────────

/// Renders a white square for anything that starts with `%PDF`.
pub struct WhitePage;

impl PageRenderer for WhitePage {
    fn render_first_page(&self, pdf: &[u8], scale: f32) -> Result<DynamicImage, String> {
        if !pdf.starts_with(b"%PDF") {
            return Err("Invalid PDF structure".to_string());
        }
        let side = (8.0 * scale).max(1.0) as u32;
        Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            side,
            side,
            Rgba([255, 255, 255, 255]),
        )))
    }
}

pub fn rasterizer() -> Arc<Rasterizer> {
    Arc::new(Rasterizer::with_renderer(1.0, Arc::new(WhitePage)))
}

// ── Storage ──────────────────────────────────────────────────────────────

/// [`LocalFs`] whose uploads can be switched to "accepted, nothing stored".
pub struct SwitchableFs {
    pub inner: LocalFs,
    pub drop_uploads: AtomicBool,
}

#[async_trait]
impl FsApi for SwitchableFs {
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<FsItem, RemoteError> {
        self.inner.write(path, data).await
    }
    async fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.inner.read(path).await
    }
    async fn readdir(&self, path: &str) -> Result<Vec<FsItem>, RemoteError> {
        self.inner.readdir(path).await
    }
    async fn upload(&self, files: Vec<UploadFile>) -> Result<Option<FsItem>, RemoteError> {
        if self.drop_uploads.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.upload(files).await
    }
    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        self.inner.delete(path).await
    }
}

// ── AI ───────────────────────────────────────────────────────────────────

/// What the scripted AI answers to a chat call.
#[derive(Clone)]
pub enum Reply {
    Text(String),
    Nothing,
    Fail(String),
}

/// One recorded chat call.
#[derive(Debug, Clone)]
pub struct ChatCall {
    pub prompt: ChatPrompt,
    pub image_url: Option<String>,
    pub options: Option<ChatOptions>,
}

/// AI capability that answers from a script and records every call.
pub struct ScriptedAi {
    pub reply: Mutex<Reply>,
    pub calls: Mutex<Vec<ChatCall>>,
    /// When set, `chat` waits for a notification before answering.
    pub gate: Option<Arc<Notify>>,
}

impl ScriptedAi {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated(reply: Reply, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(reply)
        }
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiApi for ScriptedAi {
    async fn chat(
        &self,
        prompt: ChatPrompt,
        image_url: Option<String>,
        _test_mode: bool,
        options: Option<ChatOptions>,
    ) -> Result<Option<ChatResponse>, RemoteError> {
        self.calls.lock().unwrap().push(ChatCall {
            prompt,
            image_url,
            options,
        });
        if let Some(ref gate) = self.gate {
            gate.notified().await;
        }
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Text(text) => Ok(Some(ChatResponse::text(text))),
            Reply::Nothing => Ok(None),
            Reply::Fail(msg) => Err(RemoteError::Provider(msg)),
        }
    }

    async fn img2txt(&self, _image: ImageSource, _test_mode: bool) -> Result<String, RemoteError> {
        Ok(String::new())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub config: AppConfig,
    pub env: Environment,
    pub caps: Arc<Capabilities>,
    pub fs: Arc<SwitchableFs>,
    pub kv: Arc<MemoryKv>,
    pub ai: Arc<ScriptedAi>,
    pub client: RemoteClient,
}

impl Harness {
    pub async fn new(ai: ScriptedAi) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let fs = Arc::new(SwitchableFs {
            inner: LocalFs::open(dir.path().join("files")).await.unwrap(),
            drop_uploads: AtomicBool::new(false),
        });
        let kv = Arc::new(MemoryKv::new());
        let ai = Arc::new(ai);
        let client = RemoteClient {
            auth: Arc::new(LocalAuth::new("tester")),
            fs: fs.clone(),
            kv: kv.clone(),
            ai: ai.clone(),
        };
        let env = Environment::with_client(client.clone());
        let caps = Arc::new(Capabilities::new(env.clone(), &config));
        Self {
            dir,
            config,
            env,
            caps,
            fs,
            kv,
            ai,
            client,
        }
    }

    pub async fn answering(text: &str) -> Self {
        Self::new(ScriptedAi::new(Reply::Text(text.to_string()))).await
    }
}

// ── Progress ─────────────────────────────────────────────────────────────

/// Records every callback in order.
#[derive(Default)]
pub struct RecordingProgress {
    pub stages: Mutex<Vec<(UploadStage, String)>>,
    pub errors: Mutex<Vec<String>>,
    pub completed: Mutex<Vec<String>>,
}

impl UploadProgressCallback for RecordingProgress {
    fn on_stage(&self, stage: UploadStage, status: &str) {
        self.stages.lock().unwrap().push((stage, status.to_string()));
    }
    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
    fn on_complete(&self, id: &str) {
        self.completed.lock().unwrap().push(id.to_string());
    }
}
