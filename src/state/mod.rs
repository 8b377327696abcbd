//! Persisted harvest state
//!
//! All bookkeeping (seen identifiers, per-keyword pagination cursors and the
//! resume marker) goes through the [`KeyValueStore`] trait so the JSON-file
//! backend can be swapped for an embedded database without touching the
//! harvest loop or the scheduler.

pub mod cursors;
pub mod ids;
pub mod marker;

pub use cursors::CursorStore;
pub use ids::IdentifierStore;
pub use marker::{MarkerEntry, ResumeMarker};

use crate::config::{CorruptStatePolicy, StorageConfig};
use crate::error::{HarvestError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tracing::{debug, warn};

/// Minimal key-value capability set used by the state stores
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Returns whether an entry was removed
    async fn delete(&self, key: &str) -> Result<bool>;
    /// All keys, sorted
    async fn list(&self) -> Result<Vec<String>>;
}

/// Longest percent-encoded key used verbatim as a file stem
const MAX_PLAIN_STEM: usize = 200;

/// Encoded bytes of the key kept in front of the digest in a bounded stem
const HASHED_PREFIX_LEN: usize = 120;

/// Separates the prefix from the digest; `urlencoding` always escapes it
const DIGEST_SEPARATOR: char = '+';

/// File content for keys whose name had to be shortened
#[derive(Debug, Serialize, Deserialize)]
struct KeyedEntry {
    key: String,
    value: String,
}

/// Stores each key as `<dir>/<percent-encoded key>.json`
///
/// Keys whose encoded form would exceed the file-name limit are stored as
/// `<encoded prefix>+<md5 of key>.json`, and the file holds the full key next
/// to the value so [`KeyValueStore::list`] can still recover it.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File stem for a key, and whether it is the bounded (hashed) form
    fn stem_for(key: &str) -> (String, bool) {
        let encoded = urlencoding::encode(key);
        if encoded.len() <= MAX_PLAIN_STEM {
            return (encoded.into_owned(), false);
        }

        // Whole characters only, so the prefix never splits an escape sequence
        let mut prefix = String::new();
        let mut buf = [0u8; 4];
        for c in key.chars() {
            let piece = urlencoding::encode(c.encode_utf8(&mut buf));
            if prefix.len() + piece.len() > HASHED_PREFIX_LEN {
                break;
            }
            prefix.push_str(&piece);
        }

        let digest = md5::compute(key.as_bytes());
        (format!("{}{}{:x}", prefix, DIGEST_SEPARATOR, digest), true)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::stem_for(key).0))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", Self::stem_for(key).0))
    }

    async fn key_from_entry(&self, name: &str, stem: &str) -> Option<String> {
        if !stem.contains(DIGEST_SEPARATOR) {
            return match urlencoding::decode(stem) {
                Ok(key) => Some(key.into_owned()),
                Err(e) => {
                    warn!("Skipping state file with undecodable name {}: {}", name, e);
                    None
                }
            };
        }

        let content = match fs::read_to_string(self.dir.join(name)).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping unreadable state file {}: {}", name, e);
                return None;
            }
        };
        match serde_json::from_str::<KeyedEntry>(&content) {
            Ok(entry) => Some(entry.key),
            Err(e) => {
                warn!("Skipping state file {} without a stored key: {}", name, e);
                None
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let content = match fs::read_to_string(self.path_for(key)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if !Self::stem_for(key).1 {
            return Ok(Some(content));
        }
        let entry: KeyedEntry =
            serde_json::from_str(&content).map_err(|e| HarvestError::CorruptState {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(entry.value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let content = if Self::stem_for(key).1 {
            serde_json::to_string(&KeyedEntry {
                key: key.to_string(),
                value: value.to_string(),
            })?
        } else {
            value.to_string()
        };

        // Write-then-rename so a crash never leaves a half-written file behind
        let tmp = self.temp_path_for(key);
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, self.path_for(key)).await?;
        debug!("💾 Wrote state key: {}", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                debug!("🗑️ Removed state key: {}", key);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if let Some(key) = self.key_from_entry(name, stem).await {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// In-process store, mainly for tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| HarvestError::Io(std::io::Error::other("memory store lock poisoned")))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

/// Read and parse a JSON document, applying the corrupt-state policy on parse failure
pub(crate) async fn read_document<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
    policy: CorruptStatePolicy,
) -> Result<Option<T>> {
    let Some(content) = store.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str::<T>(&content) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => match policy {
            CorruptStatePolicy::Fail => Err(HarvestError::CorruptState {
                key: key.to_string(),
                reason: e.to_string(),
            }),
            CorruptStatePolicy::Reset => {
                warn!("Corrupt state for '{}' ({}), treating as empty", key, e);
                Ok(None)
            }
        },
    }
}

/// The three state stores a harvest run needs
#[derive(Clone)]
pub struct HarvestState {
    pub ids: IdentifierStore,
    pub cursors: CursorStore,
    pub marker: ResumeMarker,
}

impl HarvestState {
    /// File-backed state under the configured state directory
    pub async fn open(storage: &StorageConfig, policy: CorruptStatePolicy) -> Result<Self> {
        let root: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&storage.state_dir).await?);
        let tokens: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(storage.tokens_dir()).await?);

        Ok(Self::from_stores(root, tokens, policy))
    }

    /// Build from arbitrary backends; cursors get their own namespace
    pub fn from_stores(
        root: Arc<dyn KeyValueStore>,
        tokens: Arc<dyn KeyValueStore>,
        policy: CorruptStatePolicy,
    ) -> Self {
        Self {
            ids: IdentifierStore::new(Arc::clone(&root), policy),
            cursors: CursorStore::new(tokens, policy),
            marker: ResumeMarker::new(root, policy),
        }
    }

    pub fn in_memory(policy: CorruptStatePolicy) -> Self {
        Self::from_stores(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            policy,
        )
    }

    /// Drop the resume marker and every cursor, keeping collected ids.
    ///
    /// Returns the number of cursors removed.
    pub async fn reset_progress(&self) -> Result<usize> {
        self.marker.clear().await?;

        let mut removed = 0;
        for keyword in self.cursors.pending().await? {
            if self.cursors.clear(&keyword).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
