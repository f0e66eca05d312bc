//! File-backed storage tiers.
//!
//! The storage directory holds three independent stores:
//! - `tokens.json` - aggregate token map, rewritten whole on every put
//! - `debug-<token>.json` - one debug record per token
//! - `latest.json` / `realtime.json` - singleton snapshots, overwritten on every put
//!
//! Every write goes to a temp file that is renamed into place. Writers inside
//! this process are serialized per file (per token for debug records).
//! Separate processes sharing one directory still race on `tokens.json`.

use crate::error::StoreError;
use dashmap::DashMap;
use figment_bridge_types::{DebugRecord, LatestSnapshot, RealTimeSnapshot, TokenMap, TokenRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tokio::sync::Mutex;

pub const TOKENS_FILE: &str = "tokens.json";
pub const LATEST_FILE: &str = "latest.json";
pub const REALTIME_FILE: &str = "realtime.json";
const DEBUG_PREFIX: &str = "debug-";
const DEBUG_SUFFIX: &str = ".json";

/// The three tiers rooted at one storage directory.
pub struct BridgeStore {
    dir: PathBuf,
    pub tokens: TokenMapStore,
    pub debug: DebugStore,
    pub latest: SnapshotStore<LatestSnapshot>,
    pub real_time: SnapshotStore<RealTimeSnapshot>,
}

impl BridgeStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self {
            tokens: TokenMapStore::new(dir.join(TOKENS_FILE)),
            debug: DebugStore::new(dir.clone()),
            latest: SnapshotStore::new(dir.join(LATEST_FILE)),
            real_time: SnapshotStore::new(dir.join(REALTIME_FILE)),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

// =====================================================
// Token Map
// =====================================================

pub struct TokenMapStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TokenMapStore {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole map; a missing file is an empty map.
    pub async fn load(&self) -> Result<TokenMap, StoreError> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }

    pub async fn get(&self, token: &str) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.load().await?.remove(token))
    }

    /// Insert or overwrite the entry for `record.token`.
    pub async fn put(&self, record: TokenRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        map.insert(record.token.clone(), record);
        write_json(&self.path, &map).await
    }

    pub async fn delete(&self, token: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        if map.remove(token).is_none() {
            return Ok(false);
        }
        write_json(&self.path, &map).await?;
        Ok(true)
    }
}

// =====================================================
// Debug Records
// =====================================================

/// A debug record file as seen on disk.
#[derive(Debug, Clone)]
pub struct DebugFileInfo {
    pub token: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

pub struct DebugStore {
    dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DebugStore {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            locks: DashMap::new(),
        }
    }

    pub fn path_for(&self, token: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", DEBUG_PREFIX, token, DEBUG_SUFFIX))
    }

    fn lock_for(&self, token: &str) -> Arc<Mutex<()>> {
        self.locks.entry(token.to_string()).or_default().clone()
    }

    pub async fn get(&self, token: &str) -> Result<Option<DebugRecord>, StoreError> {
        read_json(&self.path_for(token)).await
    }

    /// Drop our handle on a token lock and forget the entry once nobody else holds it.
    fn release(&self, token: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(token, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub async fn put(&self, record: &DebugRecord) -> Result<PathBuf, StoreError> {
        let lock = self.lock_for(&record.token);
        let path = self.path_for(&record.token);
        let written = {
            let _guard = lock.lock().await;
            write_json(&path, record).await
        };
        self.release(&record.token, lock);
        written.map(|_| path)
    }

    pub async fn delete(&self, token: &str) -> Result<bool, StoreError> {
        let lock = self.lock_for(token);
        let removed = {
            let _guard = lock.lock().await;
            remove_file(&self.path_for(token)).await
        };
        self.release(token, lock);
        removed
    }

    /// Delete the record only if its file was last modified before `cutoff`.
    /// The timestamp is re-read under the token lock, so a record rewritten
    /// since it was listed survives.
    pub async fn delete_if_older(&self, token: &str, cutoff: SystemTime) -> Result<bool, StoreError> {
        let lock = self.lock_for(token);
        let path = self.path_for(token);
        let removed = {
            let _guard = lock.lock().await;
            match fs::metadata(&path).await {
                Ok(m) if m.modified().is_ok_and(|modified| modified < cutoff) => {
                    remove_file(&path).await
                }
                Ok(_) => Ok(false),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(StoreError::io(&path, e)),
            }
        };
        self.release(token, lock);
        removed
    }

    /// Every `debug-*.json` file in the directory, unordered.
    pub async fn list(&self) -> Result<Vec<DebugFileInfo>, StoreError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(token) = token_from_file_name(&name) else {
                continue;
            };
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("[STORE] Skipping unreadable debug file {}: {}", name, e);
                    continue;
                }
            };
            files.push(DebugFileInfo {
                token: token.to_string(),
                path: entry.path(),
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(files)
    }
}

fn token_from_file_name(name: &str) -> Option<&str> {
    name.strip_prefix(DEBUG_PREFIX)?
        .strip_suffix(DEBUG_SUFFIX)
        .filter(|t| !t.is_empty())
}

// =====================================================
// Snapshots
// =====================================================

/// Singleton JSON document, replaced whole on every put.
pub struct SnapshotStore<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> SnapshotStore<T> {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self) -> Result<Option<T>, StoreError> {
        read_json(&self.path).await
    }

    pub async fn put(&self, snapshot: &T) -> Result<PathBuf, StoreError> {
        let _guard = self.write_lock.lock().await;
        write_json(&self.path, snapshot).await?;
        Ok(self.path.clone())
    }

    pub async fn delete(&self) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        remove_file(&self.path).await
    }
}

// =====================================================
// File helpers
// =====================================================

pub async fn file_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(value)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(
        ".{}.{}.tmp",
        file_name,
        uuid::Uuid::new_v4().simple()
    ));

    if let Err(e) = fs::write(&tmp, &json).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(StoreError::io(&tmp, e));
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

async fn remove_file(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path, e)),
    }
}
