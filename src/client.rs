//! The remote client boundary: capability traits and their wire types.
//!
//! All durable state lives behind a [`RemoteClient`], a bundle of four
//! capability groups (auth, file storage, key-value storage, AI inference).
//! The client is not constructed by the workflow; it is injected into an
//! [`Environment`] by whoever hosts the crate, possibly *after* the
//! workflow objects already exist. Every facade call re-checks the
//! environment.
//!
//! The traits are object-safe async traits so hosts can plug in a hosted
//! backend, the local backend from [`crate::backend`], or a test double.

use crate::error::RemoteError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

// ── Auth ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uuid: String,
    pub username: String,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn is_signed_in(&self) -> Result<bool, RemoteError>;
    async fn get_user(&self) -> Result<User, RemoteError>;
    async fn sign_in(&self) -> Result<(), RemoteError>;
    async fn sign_out(&self) -> Result<(), RemoteError>;
}

// ── File storage ─────────────────────────────────────────────────────────

/// A stored file or directory as reported by the storage capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsItem {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default)]
    pub size: u64,
}

/// An in-memory file selected for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn pdf(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, "application/pdf", bytes)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// True when the declared type or the magic bytes say PDF.
    pub fn looks_like_pdf(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case("application/pdf") || self.bytes.starts_with(b"%PDF")
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

#[async_trait]
pub trait FsApi: Send + Sync {
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<FsItem, RemoteError>;
    async fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError>;
    async fn readdir(&self, path: &str) -> Result<Vec<FsItem>, RemoteError>;
    /// Store the files; resolves to the item of the last stored file, or
    /// `None` when the provider accepted the call but stored nothing.
    async fn upload(&self, files: Vec<UploadFile>) -> Result<Option<FsItem>, RemoteError>;
    async fn delete(&self, path: &str) -> Result<(), RemoteError>;
}

// ── Key-value storage ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    /// Present only when the listing was asked to return values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[async_trait]
pub trait KvApi: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError>;
    async fn set(&self, key: &str, value: &str) -> Result<bool, RemoteError>;
    async fn delete(&self, key: &str) -> Result<bool, RemoteError>;
    /// Keys matching a `*` glob pattern, with values when `return_values`.
    async fn list(&self, pattern: &str, return_values: bool) -> Result<Vec<KvEntry>, RemoteError>;
    async fn flush(&self) -> Result<bool, RemoteError>;
}

// ── AI inference ─────────────────────────────────────────────────────────

/// A chat prompt: either bare text or a list of role-tagged messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatPrompt {
    Text(String),
    Messages(Vec<ChatMessage>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn user(content: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

/// One part of a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Reference to a file previously stored through the storage capability.
    File { path: String },
    Text { text: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatOptions {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: ResponseMessage,
}

impl ChatResponse {
    /// Response whose content is plain text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: ResponseMessage {
                role: "assistant".to_string(),
                content: ChatContent::PlainText(content.into()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: ChatContent,
}

/// The loosely-typed `message.content` of a chat response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatContent {
    PlainText(String),
    Segments(Vec<ContentSegment>),
    Unknown(Value),
}

impl Default for ChatContent {
    fn default() -> Self {
        ChatContent::Unknown(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSegment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ChatContent {
    /// Flatten the content to a single string.
    ///
    /// Segments are joined with newlines (segments without text contribute an
    /// empty line); anything else is rendered as JSON, with a missing value
    /// rendered as the empty JSON string.
    pub fn to_text(&self) -> String {
        match self {
            ChatContent::PlainText(s) => s.clone(),
            ChatContent::Segments(segments) => segments
                .iter()
                .map(|s| s.text.as_deref().unwrap_or(""))
                .collect::<Vec<_>>()
                .join("\n"),
            ChatContent::Unknown(Value::Null) => "\"\"".to_string(),
            ChatContent::Unknown(v) => v.to_string(),
        }
    }
}

/// Image handed to the OCR capability.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Url(String),
    Bytes(Vec<u8>),
}

#[async_trait]
pub trait AiApi: Send + Sync {
    /// Resolves to `None` when the provider produced no response at all.
    async fn chat(
        &self,
        prompt: ChatPrompt,
        image_url: Option<String>,
        test_mode: bool,
        options: Option<ChatOptions>,
    ) -> Result<Option<ChatResponse>, RemoteError>;

    async fn img2txt(&self, image: ImageSource, test_mode: bool) -> Result<String, RemoteError>;
}

// ── Client + environment ─────────────────────────────────────────────────

/// The four capability groups of one remote client.
#[derive(Clone)]
pub struct RemoteClient {
    pub auth: Arc<dyn AuthApi>,
    pub fs: Arc<dyn FsApi>,
    pub kv: Arc<dyn KvApi>,
    pub ai: Arc<dyn AiApi>,
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RemoteClient { .. }")
    }
}

/// Slot into which the host injects the remote client.
///
/// Cloning an `Environment` shares the slot.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    slot: Arc<RwLock<Option<RemoteClient>>>,
}

impl Environment {
    /// Empty environment; inject a client later.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: RemoteClient) -> Self {
        let env = Self::new();
        env.inject(client);
        env
    }

    pub fn inject(&self, client: RemoteClient) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(client);
    }

    pub fn eject(&self) -> Option<RemoteClient> {
        self.slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// The injected client, if any.
    pub fn client(&self) -> Option<RemoteClient> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_available(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_plain_text() {
        let r: ChatResponse =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"hello"}}"#).unwrap();
        assert_eq!(r.message.content, ChatContent::PlainText("hello".into()));
        assert_eq!(r.message.content.to_text(), "hello");
    }

    #[test]
    fn content_segments_join_with_newlines() {
        let r: ChatResponse = serde_json::from_str(
            r#"{"message":{"content":[{"type":"text","text":"{\"a\":"},{"type":"image"},{"text":"1}"}]}}"#,
        )
        .unwrap();
        assert!(matches!(r.message.content, ChatContent::Segments(_)));
        assert_eq!(r.message.content.to_text(), "{\"a\":\n\n1}");
    }

    #[test]
    fn content_unknown_is_stringified() {
        let r: ChatResponse =
            serde_json::from_str(r#"{"message":{"content":{"score":5}}}"#).unwrap();
        assert_eq!(r.message.content.to_text(), r#"{"score":5}"#);

        let r: ChatResponse = serde_json::from_str(r#"{"message":{}}"#).unwrap();
        assert_eq!(r.message.content.to_text(), "\"\"");
    }

    #[test]
    fn feedback_message_wire_shape() {
        let msg = ChatMessage::user(vec![
            ContentPart::File {
                path: "/files/cv.pdf".into(),
            },
            ContentPart::Text {
                text: "rate it".into(),
            },
        ]);
        let v = serde_json::to_value(ChatPrompt::Messages(vec![msg])).unwrap();
        assert_eq!(v[0]["role"], "user");
        assert_eq!(v[0]["content"][0]["type"], "file");
        assert_eq!(v[0]["content"][0]["path"], "/files/cv.pdf");
        assert_eq!(v[0]["content"][1]["type"], "text");
    }

    #[test]
    fn upload_file_pdf_detection() {
        assert!(UploadFile::pdf("a.pdf", vec![]).looks_like_pdf());
        assert!(UploadFile::new("a.bin", "application/octet-stream", b"%PDF-1.7".to_vec())
            .looks_like_pdf());
        assert!(!UploadFile::new("a.txt", "text/plain", b"hello".to_vec()).looks_like_pdf());
    }

    #[test]
    fn environment_slot_is_shared_between_clones() {
        let env = Environment::new();
        let other = env.clone();
        assert!(!other.is_available());
        assert!(env.eject().is_none());
    }
}
