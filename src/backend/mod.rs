//! A remote client that runs entirely on this machine.
//!
//! Hosts without a hosted capability provider (the CLI, scripts, tests) can
//! inject this client instead:
//!
//! ```text
//! <data_dir>/files/   ← fs   (LocalFs)
//! <data_dir>/kv.json  ← kv   (MemoryKv snapshot)
//!                       auth (LocalAuth, one signed-in user)
//!                       ai   (LlmAi over an edgequake-llm provider)
//! ```

pub mod auth;
pub mod fs;
pub mod kv;
pub mod llm;

pub use auth::LocalAuth;
pub use fs::LocalFs;
pub use kv::MemoryKv;
pub use llm::{LlmAi, ProviderSettings};

use crate::client::RemoteClient;
use crate::config::AppConfig;
use crate::error::RemoteError;
use crate::pipeline::render::Rasterizer;
use std::sync::Arc;
use tracing::info;

/// Build the local client rooted in `config.data_dir`.
///
/// The AI capability shares `rasterizer` with the upload workflow so the PDF
/// engine is loaded once per process.
pub async fn local_client(
    config: &AppConfig,
    username: &str,
    settings: ProviderSettings,
    rasterizer: Arc<Rasterizer>,
) -> Result<RemoteClient, RemoteError> {
    let fs = Arc::new(LocalFs::open(config.data_dir.join("files")).await?);
    let kv = Arc::new(MemoryKv::open(config.data_dir.join("kv.json")).await?);
    info!("Local client ready in {}", config.data_dir.display());
    Ok(RemoteClient {
        auth: Arc::new(LocalAuth::new(username)),
        ai: Arc::new(LlmAi::new(settings, fs.clone(), rasterizer)),
        fs,
        kv,
    })
}
