//! Durable subscription storage.
//!
//! The whole subscription collection is one JSON document, rewritten
//! wholesale on every mutation. There is no incremental log.
//!
//! # Storage structure
//!
//! ```text
//! ~/.local/share/eznotif/
//!     subscriptions.json       # { "version": 1, "subscriptions": [...] }
//!     subscriptions.json.tmp   # transient, only during a save
//! ```
//!
//! Writes go to the `.tmp` sibling, are fsynced, then renamed over the real
//! file. A crash mid-save leaves the previous snapshot intact.

// Rust guideline compliant 2026-02

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::STORE_FORMAT_VERSION;
use crate::notifications::push::SubscriptionRecord;

/// Failure reading or writing durable state.
#[derive(Debug)]
pub enum StoreError {
    /// Filesystem operation failed.
    Io {
        /// File the operation targeted.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The document could not be encoded or decoded.
    Serialization(serde_json::Error),
    /// The background save task panicked or was cancelled.
    Task(tokio::task::JoinError),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Subscription store I/O error at {}: {source}", path.display())
            }
            Self::Serialization(e) => write!(f, "Subscription store serialization error: {e}"),
            Self::Task(e) => write!(f, "Subscription store save task failed: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialization(e) => Some(e),
            Self::Task(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e)
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e)
    }
}

/// Durable container for the subscription collection.
///
/// `save` is all-or-nothing from the caller's point of view: either the full
/// collection is durably written or an error is returned and the previous
/// state is still what `load` will return. `save` may block; the registry
/// runs it on the blocking thread pool.
pub trait SubscriptionStore: Send + Sync + std::fmt::Debug {
    /// Read the persisted collection.
    ///
    /// Returns an empty collection when nothing has been saved yet.
    fn load(&self) -> Result<Vec<SubscriptionRecord>, StoreError>;

    /// Replace the persisted collection with `records`.
    fn save(&self, records: &[SubscriptionRecord]) -> Result<(), StoreError>;
}

/// On-disk document layout.
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    #[serde(default)]
    subscriptions: Vec<SubscriptionRecord>,
}

/// JSON file store with atomic replace.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by the file at `path`. Nothing is touched until `load`/`save`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_error(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl SubscriptionStore for JsonFileStore {
    fn load(&self) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("[Store] No subscription file at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(Self::io_error(&self.path, e)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let document: StoreDocument = serde_json::from_slice(&bytes)?;
        if document.version > STORE_FORMAT_VERSION {
            log::warn!(
                "[Store] {} has format version {} (newer than {}); reading anyway",
                self.path.display(),
                document.version,
                STORE_FORMAT_VERSION
            );
        }

        log::info!(
            "[Store] Loaded {} subscription(s) from {}",
            document.subscriptions.len(),
            self.path.display()
        );
        Ok(document.subscriptions)
    }

    fn save(&self, records: &[SubscriptionRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Self::io_error(parent, e))?;
            }
        }

        let document = StoreDocument {
            version: STORE_FORMAT_VERSION,
            subscriptions: records.to_vec(),
        };
        let content = serde_json::to_vec_pretty(&document)?;

        let tmp_path = self.tmp_path();
        let write_tmp = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&content)?;
            file.sync_all()?;
            Ok(())
        };
        if let Err(e) = write_tmp() {
            let _ = fs::remove_file(&tmp_path);
            return Err(Self::io_error(&tmp_path, e));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&tmp_path, perms).map_err(|e| Self::io_error(&tmp_path, e))?;
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            Self::io_error(&self.path, e)
        })?;

        log::debug!("[Store] Saved {} subscription(s) to {:?}", records.len(), self.path);
        Ok(())
    }
}
