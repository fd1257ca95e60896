//! Persistence of the in-progress booking.
//!
//! The wizard saves its flat [`BookingData`] after every accepted step so a
//! reload can resume where the customer left off.

use crate::error::SnapshotError;
use crate::wizard::BookingData;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Keyed storage for booking snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Overwrite the snapshot stored under `key`
    async fn save(&self, key: &str, data: &BookingData) -> Result<(), SnapshotError>;

    /// Read the snapshot under `key`, if any
    async fn load(&self, key: &str) -> Result<Option<BookingData>, SnapshotError>;

    /// Forget the snapshot under `key`; missing keys are not an error
    async fn clear(&self, key: &str) -> Result<(), SnapshotError>;
}

/// Snapshots held in process memory
///
/// Clones share storage.
#[derive(Clone, Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Arc<RwLock<HashMap<String, BookingData>>>,
}

impl MemorySnapshotStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, key: &str, data: &BookingData) -> Result<(), SnapshotError> {
        self.snapshots
            .write()
            .await
            .insert(key.to_string(), data.clone());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<BookingData>, SnapshotError> {
        Ok(self.snapshots.read().await.get(key).cloned())
    }

    async fn clear(&self, key: &str) -> Result<(), SnapshotError> {
        self.snapshots.write().await.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory
#[derive(Clone, Debug)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Store snapshots under `dir` (created on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the snapshots live in
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, key: &str, data: &BookingData) -> Result<(), SnapshotError> {
        let bytes = serde_json::to_vec_pretty(data)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write then rename so a crash never leaves half a snapshot
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(path = %path.display(), "Booking snapshot saved");
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<BookingData>, SnapshotError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self, key: &str) -> Result<(), SnapshotError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Ordered writer for one session's snapshot
///
/// Saves are issued from concurrently running effects, so each write carries
/// the revision of the state it was taken from. A write older than the last
/// one applied is dropped, which keeps the stored snapshot monotonic.
#[derive(Clone)]
pub struct SnapshotWriter {
    store: Arc<dyn SnapshotStore>,
    key: String,
    applied: Arc<Mutex<u64>>,
}

impl SnapshotWriter {
    /// Writer for the snapshot under `key`
    pub fn new(store: Arc<dyn SnapshotStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            applied: Arc::new(Mutex::new(0)),
        }
    }

    /// Session key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Save `data` (or clear the snapshot when `None`) as of `revision`
    ///
    /// Returns `false` if a newer revision was already applied.
    ///
    /// # Errors
    ///
    /// Propagates the underlying store's [`SnapshotError`].
    pub async fn write(
        &self,
        revision: u64,
        data: Option<&BookingData>,
    ) -> Result<bool, SnapshotError> {
        let mut applied = self.applied.lock().await;
        if revision <= *applied {
            tracing::trace!(revision, applied = *applied, "Skipping superseded snapshot");
            return Ok(false);
        }
        *applied = revision;

        match data {
            Some(data) => self.store.save(&self.key, data).await?,
            None => self.store.clear(&self.key).await?,
        }
        Ok(true)
    }

    /// Read the stored snapshot
    ///
    /// # Errors
    ///
    /// Propagates the underlying store's [`SnapshotError`].
    pub async fn load(&self) -> Result<Option<BookingData>, SnapshotError> {
        self.store.load(&self.key).await
    }
}

impl std::fmt::Debug for SnapshotWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotWriter")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
