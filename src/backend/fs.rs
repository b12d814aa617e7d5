//! File storage rooted in a local directory.
//!
//! Storage paths are virtual: `/resume.pdf`, `./resume.pdf` and `resume.pdf`
//! all name `<root>/resume.pdf`. Paths that climb out of the root are
//! rejected.

use crate::client::{FsApi, FsItem, UploadFile};
use crate::error::RemoteError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    /// Storage rooted at `root`; the directory is created when missing.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, RemoteError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, RemoteError> {
        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(RemoteError::Rejected(format!(
                        "Path '{path}' escapes the storage root"
                    )))
                }
            }
        }
        Ok(resolved)
    }

    fn virtual_path(&self, full: &Path) -> String {
        let rel = full.strip_prefix(&self.root).unwrap_or(full);
        let joined = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("/{joined}")
    }

    async fn item(&self, full: &Path) -> Result<FsItem, RemoteError> {
        let meta = tokio::fs::metadata(full).await?;
        let path = self.virtual_path(full);
        Ok(FsItem {
            id: path.clone(),
            name: full
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path,
            is_dir: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.len() },
        })
    }

    /// `name`, or `stem (n).ext` for the first `n` not already taken.
    async fn unique_target(&self, name: &str) -> Result<PathBuf, RemoteError> {
        let candidate = self.resolve(name)?;
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        let as_path = Path::new(name);
        let stem = as_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let ext = as_path.extension().map(|e| e.to_string_lossy().into_owned());
        let mut n = 1;
        loop {
            let next = match &ext {
                Some(ext) => format!("{stem} ({n}).{ext}"),
                None => format!("{stem} ({n})"),
            };
            let candidate = self.resolve(&next)?;
            if !tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

#[async_trait]
impl FsApi for LocalFs {
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<FsItem, RemoteError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, &data).await?;
        debug!("Wrote {} bytes to {}", data.len(), full.display());
        self.item(&full).await
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RemoteError::NotFound(path.to_string()),
            _ => e.into(),
        })
    }

    async fn readdir(&self, path: &str) -> Result<Vec<FsItem>, RemoteError> {
        let full = self.resolve(path)?;
        let mut dir = tokio::fs::read_dir(&full).await?;
        let mut items = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            items.push(self.item(&entry.path()).await?);
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn upload(&self, files: Vec<UploadFile>) -> Result<Option<FsItem>, RemoteError> {
        let mut last = None;
        for file in files {
            let name = Path::new(&file.name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .filter(|n| !n.is_empty())
                .ok_or_else(|| RemoteError::Rejected(format!("Invalid file name '{}'", file.name)))?;
            let target = self.unique_target(&name).await?;
            tokio::fs::write(&target, &file.bytes).await?;
            debug!("Uploaded '{}' → {}", file.name, target.display());
            last = Some(self.item(&target).await?);
        }
        Ok(last)
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let full = self.resolve(path)?;
        if full == self.root {
            return Err(RemoteError::Rejected("Refusing to delete the storage root".into()));
        }
        if tokio::fs::metadata(&full).await?.is_dir() {
            tokio::fs::remove_dir_all(&full).await?;
        } else {
            tokio::fs::remove_file(&full).await?;
        }
        Ok(())
    }
}
