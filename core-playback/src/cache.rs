//! Disk cache for resolved track bytes.
//!
//! One file per track under `<app-cache>/media/`, named by a caller-supplied
//! stable key (`resID_<id>.<ext>` — same URL, same file). A small JSON
//! sidecar maps URL strings to cache file names for hit lookups, mirroring
//! the persisted layout consumed by the host application.
//!
//! Validity = the file exists AND its size is greater than zero; a
//! zero-length file is reported as a miss so the resolver re-downloads
//! instead of returning empty bytes. Writes go straight to the final path;
//! a crash mid-write can leave a partial file behind. That partial file is
//! only served if it is non-empty, which is a known gap of this layout.

use bridge_traits::error::Result;
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Directory under the app cache root holding media payloads.
const MEDIA_DIR: &str = "media";
/// Sidecar file mapping URL -> cache file name.
const INDEX_FILE: &str = "media-index.json";

/// Content-addressed byte store backed by the host filesystem seam.
pub struct FileCache {
    fs: Arc<dyn FileSystemAccess>,
    base: PathBuf,
    index_path: PathBuf,
    /// URL string -> file name under `base`.
    index: Mutex<HashMap<String, String>>,
}

impl FileCache {
    /// Open (or create) the cache under the host's app-cache directory and
    /// load the sidecar index.
    ///
    /// # Errors
    ///
    /// Returns error when the cache directory cannot be created or read.
    pub async fn new(fs: Arc<dyn FileSystemAccess>) -> Result<Self> {
        let cache_dir = fs.get_cache_directory().await?;
        let base = cache_dir.join(MEDIA_DIR);
        fs.create_dir_all(&base).await?;

        let index_path = cache_dir.join(INDEX_FILE);
        let index = if fs.exists(&index_path).await? {
            let raw = fs.read_file(&index_path).await?;
            match serde_json::from_slice::<HashMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    // A corrupt sidecar only costs re-downloads.
                    warn!(error = %e, "cache index unreadable, starting empty");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        info!(path = ?base, entries = index.len(), "file cache opened");

        Ok(Self {
            fs,
            base,
            index_path,
            index: Mutex::new(index),
        })
    }

    /// Return the cached bytes for `url`, or `None` on a miss.
    ///
    /// An indexed entry whose file is missing or empty counts as a miss.
    pub async fn lookup(&self, url: &str) -> Option<Bytes> {
        let file_name = self.index.lock().await.get(url).cloned()?;
        let path = self.base.join(&file_name);

        let meta = self.fs.metadata(&path).await.ok()?;
        if meta.size == 0 {
            debug!(file = %file_name, "empty cache file treated as miss");
            return None;
        }

        match self.fs.read_file(&path).await {
            Ok(data) if !data.is_empty() => {
                debug!(file = %file_name, bytes = data.len(), "cache hit");
                Some(data)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(file = %file_name, error = %e, "cache read failed");
                None
            }
        }
    }

    /// Whether a valid (non-empty) entry exists for `url`.
    pub async fn is_cached(&self, url: &str) -> bool {
        let Some(file_name) = self.index.lock().await.get(url).cloned() else {
            return false;
        };
        let path = self.base.join(file_name);
        matches!(self.fs.metadata(&path).await, Ok(meta) if meta.size > 0)
    }

    /// Persist `data` under `file_name` and map `url` to it in the sidecar.
    ///
    /// Returns the absolute path of the stored file.
    pub async fn store(&self, url: &str, file_name: &str, data: Bytes) -> Result<PathBuf> {
        let path = self.base.join(file_name);
        self.fs.write_file(&path, data.clone()).await?;

        let mut index = self.index.lock().await;
        index.insert(url.to_string(), file_name.to_string());
        self.persist_index(&index).await?;
        drop(index);

        debug!(file = %file_name, bytes = data.len(), "stored cache entry");
        Ok(path)
    }

    /// Drop the entry for `url`, deleting its file when present.
    pub async fn invalidate(&self, url: &str) -> Result<()> {
        let mut index = self.index.lock().await;
        let Some(file_name) = index.remove(url) else {
            return Ok(());
        };
        self.persist_index(&index).await?;
        drop(index);

        let path = self.base.join(&file_name);
        if self.fs.exists(&path).await? {
            self.fs.delete_file(&path).await?;
        }
        debug!(file = %file_name, "invalidated cache entry");
        Ok(())
    }

    /// Number of indexed entries (valid or not).
    pub async fn entry_count(&self) -> usize {
        self.index.lock().await.len()
    }

    async fn persist_index(&self, index: &HashMap<String, String>) -> Result<()> {
        let raw = serde_json::to_vec(index).map_err(|e| {
            bridge_traits::BridgeError::OperationFailed(format!("cache index encode: {}", e))
        })?;
        self.fs.write_file(&self.index_path, Bytes::from(raw)).await
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}
