use std::path::{Path, PathBuf};

use showsync_core::Show;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::StoreError;
use crate::codec::DecodeReport;
use crate::persistence::{decode_shows, encode_shows};

/// Where library blobs live.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn write(&self, blob: &[u8]) -> Result<(), StoreError>;

    /// `None` when nothing has been written yet.
    async fn read(&self) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Single file on disk, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl BlobStore for FileStore {
    async fn write(&self, blob: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, blob).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = blob.len(), "library written");
        Ok(())
    }

    async fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store, mostly for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: Mutex<Option<Vec<u8>>>,
}

#[async_trait::async_trait]
impl BlobStore for MemoryStore {
    async fn write(&self, blob: &[u8]) -> Result<(), StoreError> {
        *self.blob.lock().await = Some(blob.to_vec());
        Ok(())
    }

    async fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blob.lock().await.clone())
    }
}

/// Saves and loads the caller's shows through a [`BlobStore`].
pub struct Library<S> {
    store: S,
}

impl<S: BlobStore> Library<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn save(&self, shows: &[Show]) -> Result<(), StoreError> {
        let blob = encode_shows(shows)?;
        self.store.write(&blob).await?;
        info!(shows = shows.len(), "library saved");
        Ok(())
    }

    /// Load every show that decodes. A store that was never written yields an
    /// empty library.
    pub async fn load(&self) -> Result<DecodeReport<Show>, StoreError> {
        let Some(blob) = self.store.read().await? else {
            return Ok(DecodeReport::default());
        };
        let report = decode_shows(&blob)?;
        for (idx, err) in &report.errors {
            warn!(index = idx, error = %err, "skipping unreadable show");
        }
        info!(shows = report.entities.len(), failed = report.errors.len(), "library loaded");
        Ok(report)
    }
}
