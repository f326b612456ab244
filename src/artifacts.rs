use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

/// File-path-addressed artifact store. Keys are paths relative to the
/// configured root (`pv/<document-id>.docx`); the same key doubles as the
/// public URL suffix under `/public/`.
#[async_trait]
pub trait ArtifactStore: Send + Sync + 'static {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Absolute filesystem location of a key, for subprocess consumers.
    fn absolute_path(&self, key: &str) -> PathBuf;
}

pub struct DiskArtifactStore {
    root: PathBuf,
}

impl DiskArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for DiskArtifactStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.absolute_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create artifact directory {parent:?}"))?;
        }
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write artifact {path:?}"))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.absolute_path(key);
        fs::read(&path)
            .await
            .with_context(|| format!("failed to read artifact {path:?}"))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.absolute_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to delete artifact {path:?}")),
        }
    }

    fn absolute_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}
