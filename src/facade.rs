//! Remote capability facade: availability-gated access to the injected client.
//!
//! [`Capabilities`] owns the only shared mutable state of the crate, a
//! [`FacadeState`] held in a [`tokio::sync::watch`] channel. Observers read a
//! snapshot with [`Capabilities::state`] or follow changes with
//! [`Capabilities::subscribe`] / [`Capabilities::state_stream`].
//!
//! Every operation first looks the client up in the [`Environment`]. When no
//! client has been injected the call sets
//! `{ error: "<name> not available", is_loading: false }`, leaves the rest of
//! the state untouched and returns [`RemoteError::Unavailable`]. Repeating the
//! call yields the same error and the same state.
//!
//! Operations are grouped by capability:
//!
//! ```text
//! caps.auth().check_auth_status()      caps.fs().upload(files)
//! caps.kv().list("resume:*", Some(true)) caps.ai().feedback(path, text)
//! ```

use crate::client::{
    ChatMessage, ChatOptions, ChatPrompt, ChatResponse, ContentPart, Environment, FsItem,
    ImageSource, KvEntry, RemoteClient, UploadFile, User,
};
use crate::config::AppConfig;
use crate::error::RemoteError;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

/// Who is signed in, as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No auth check has completed yet.
    #[default]
    Unknown,
    Authenticated(User),
    Anonymous,
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

/// Readiness and auth state observed by the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacadeState {
    pub is_loading: bool,
    pub error: Option<String>,
    /// Set once `init` has seen the client in the environment.
    pub client_ready: bool,
    pub auth: AuthState,
}

impl Default for FacadeState {
    fn default() -> Self {
        Self {
            is_loading: true,
            error: None,
            client_ready: false,
            auth: AuthState::Unknown,
        }
    }
}

/// Availability-gated access to the remote client.
pub struct Capabilities {
    env: Environment,
    client_name: String,
    feedback_model: String,
    init_poll_interval: Duration,
    init_timeout: Duration,
    state: watch::Sender<FacadeState>,
}

impl Capabilities {
    pub fn new(env: Environment, config: &AppConfig) -> Self {
        let (state, _) = watch::channel(FacadeState::default());
        Self {
            env,
            client_name: config.client_name.clone(),
            feedback_model: config.feedback_model.clone(),
            init_poll_interval: config.init_poll_interval,
            init_timeout: config.init_timeout,
            state,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> FacadeState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FacadeState> {
        self.state.subscribe()
    }

    /// State changes as a `Stream`, starting with the current value.
    pub fn state_stream(&self) -> WatchStream<FacadeState> {
        WatchStream::new(self.subscribe())
    }

    /// Reset the error; the only way an error is cleared.
    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    pub fn auth(&self) -> AuthOps<'_> {
        AuthOps { caps: self }
    }

    pub fn fs(&self) -> FsOps<'_> {
        FsOps { caps: self }
    }

    pub fn kv(&self) -> KvOps<'_> {
        KvOps { caps: self }
    }

    pub fn ai(&self) -> AiOps<'_> {
        AiOps { caps: self }
    }

    /// Wait for the client to appear, then check who is signed in.
    ///
    /// Polls the environment every `init_poll_interval` for at most
    /// `init_timeout`. Returns whether the client became ready.
    pub async fn init(&self) -> bool {
        if !self.env.is_available() {
            debug!(
                "{} not injected yet; polling every {:?}",
                self.client_name, self.init_poll_interval
            );
            let poll = async {
                let mut ticker = tokio::time::interval(self.init_poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if self.env.is_available() {
                        break;
                    }
                }
            };
            if tokio::time::timeout(self.init_timeout, poll).await.is_err() {
                let msg = format!(
                    "{} failed to load within {} seconds",
                    self.client_name,
                    self.init_timeout.as_secs_f64()
                );
                warn!("{msg}");
                self.fail(msg);
                return false;
            }
        }

        info!("{} ready", self.client_name);
        self.state.send_modify(|s| s.client_ready = true);
        // Failures are recorded in the state.
        let _ = self.auth().check_auth_status().await;
        true
    }

    // ── internals ────────────────────────────────────────────────────────

    fn client(&self) -> Result<RemoteClient, RemoteError> {
        self.env.client().ok_or_else(|| {
            let err = RemoteError::Unavailable {
                capability: self.client_name.clone(),
            };
            let msg = err.to_string();
            self.state.send_modify(|s| {
                s.error = Some(msg);
                s.is_loading = false;
            });
            err
        })
    }

    /// Mark an auth call in flight. A recorded error stays until
    /// [`Capabilities::clear_error`].
    fn begin(&self) {
        self.state.send_modify(|s| s.is_loading = true);
    }

    fn settle(&self, auth: AuthState) {
        self.state.send_modify(|s| {
            s.auth = auth;
            s.is_loading = false;
        });
    }

    /// Terminal auth failure: record the message and fall back to anonymous.
    fn fail(&self, msg: String) {
        self.state.send_modify(|s| {
            s.error = Some(msg);
            s.is_loading = false;
            s.auth = AuthState::Anonymous;
        });
    }

    fn fail_with(&self, e: RemoteError) -> RemoteError {
        warn!("Auth call failed: {e}");
        self.fail(e.to_string());
        e
    }
}

// ── auth ─────────────────────────────────────────────────────────────────

/// Authentication operations.
pub struct AuthOps<'a> {
    caps: &'a Capabilities,
}

impl AuthOps<'_> {
    /// Ask the client whether a user is signed in and record the answer.
    pub async fn check_auth_status(&self) -> Result<bool, RemoteError> {
        let client = self.caps.client()?;
        self.caps.begin();

        let signed_in = client
            .auth
            .is_signed_in()
            .await
            .map_err(|e| self.caps.fail_with(e))?;
        if !signed_in {
            self.caps.settle(AuthState::Anonymous);
            return Ok(false);
        }

        let user = client
            .auth
            .get_user()
            .await
            .map_err(|e| self.caps.fail_with(e))?;
        debug!("Signed in as {}", user.username);
        self.caps.settle(AuthState::Authenticated(user));
        Ok(true)
    }

    pub async fn sign_in(&self) -> Result<(), RemoteError> {
        let client = self.caps.client()?;
        self.caps.begin();
        client
            .auth
            .sign_in()
            .await
            .map_err(|e| self.caps.fail_with(e))?;
        self.check_auth_status().await.map(|_| ())
    }

    pub async fn sign_out(&self) -> Result<(), RemoteError> {
        let client = self.caps.client()?;
        self.caps.begin();
        client
            .auth
            .sign_out()
            .await
            .map_err(|e| self.caps.fail_with(e))?;
        self.caps.settle(AuthState::Anonymous);
        Ok(())
    }

    /// Re-fetch the current user.
    pub async fn refresh_user(&self) -> Result<User, RemoteError> {
        let client = self.caps.client()?;
        self.caps.begin();
        let user = client
            .auth
            .get_user()
            .await
            .map_err(|e| self.caps.fail_with(e))?;
        self.caps.settle(AuthState::Authenticated(user.clone()));
        Ok(user)
    }

    /// The user recorded by the last auth check.
    pub fn get_user(&self) -> Option<User> {
        self.caps.state.borrow().auth.user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.caps.state.borrow().auth.is_authenticated()
    }
}

// ── fs ───────────────────────────────────────────────────────────────────

/// File storage pass-through.
pub struct FsOps<'a> {
    caps: &'a Capabilities,
}

impl FsOps<'_> {
    pub async fn write(&self, path: &str, data: Vec<u8>) -> Result<FsItem, RemoteError> {
        self.caps.client()?.fs.write(path, data).await
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.caps.client()?.fs.read(path).await
    }

    pub async fn read_dir(&self, path: &str) -> Result<Vec<FsItem>, RemoteError> {
        self.caps.client()?.fs.readdir(path).await
    }

    pub async fn upload(&self, files: Vec<UploadFile>) -> Result<Option<FsItem>, RemoteError> {
        self.caps.client()?.fs.upload(files).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        self.caps.client()?.fs.delete(path).await
    }
}

// ── kv ───────────────────────────────────────────────────────────────────

/// Key-value pass-through.
pub struct KvOps<'a> {
    caps: &'a Capabilities,
}

impl KvOps<'_> {
    pub async fn get(&self, key: &str) -> Result<Option<String>, RemoteError> {
        self.caps.client()?.kv.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<bool, RemoteError> {
        self.caps.client()?.kv.set(key, value).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, RemoteError> {
        self.caps.client()?.kv.delete(key).await
    }

    /// Keys matching `pattern`; values are included only when
    /// `return_values` is `Some(true)`.
    pub async fn list(
        &self,
        pattern: &str,
        return_values: Option<bool>,
    ) -> Result<Vec<KvEntry>, RemoteError> {
        self.caps
            .client()?
            .kv
            .list(pattern, return_values.unwrap_or(false))
            .await
    }

    pub async fn flush(&self) -> Result<bool, RemoteError> {
        self.caps.client()?.kv.flush().await
    }
}

// ── ai ───────────────────────────────────────────────────────────────────

/// AI inference pass-through plus the resume feedback request.
pub struct AiOps<'a> {
    caps: &'a Capabilities,
}

impl AiOps<'_> {
    pub async fn chat(
        &self,
        prompt: ChatPrompt,
        image_url: Option<String>,
        test_mode: bool,
        options: Option<ChatOptions>,
    ) -> Result<Option<ChatResponse>, RemoteError> {
        self.caps
            .client()?
            .ai
            .chat(prompt, image_url, test_mode, options)
            .await
    }

    /// Ask for feedback on a stored file.
    ///
    /// Sends one user message holding a reference to `path` followed by
    /// `message`, with the configured feedback model.
    pub async fn feedback(
        &self,
        path: &str,
        message: &str,
    ) -> Result<Option<ChatResponse>, RemoteError> {
        let client = self.caps.client()?;
        let prompt = ChatPrompt::Messages(vec![ChatMessage::user(vec![
            ContentPart::File {
                path: path.to_string(),
            },
            ContentPart::Text {
                text: message.to_string(),
            },
        ])]);
        debug!("Requesting feedback on {} with {}", path, self.caps.feedback_model);
        client
            .ai
            .chat(
                prompt,
                None,
                false,
                Some(ChatOptions::with_model(self.caps.feedback_model.clone())),
            )
            .await
    }

    pub async fn img2txt(&self, image: ImageSource, test_mode: bool) -> Result<String, RemoteError> {
        self.caps.client()?.ai.img2txt(image, test_mode).await
    }
}
