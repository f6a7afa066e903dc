//! Scrape-result caching: the domain-facing `ScrapeCache` policy layer over
//! a pluggable `CacheStore`, plus in-memory and filesystem stores.

use pagechat_core::{CacheStore, Error, Result, ScrapedContent};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Fixed retention window for cached scrape results.
pub const CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Serialized payloads above this size are never written.
pub const MAX_CACHE_PAYLOAD_BYTES: usize = 10_000_000;

const KEY_PREFIX: &str = "scrape:";
const KEY_MAX_URL_CHARS: usize = 200;

/// Cache key for a URL: namespace tag plus the first 200 characters.
///
/// Known limitation: URLs differing only past the 200-char prefix collide.
/// Accepted at this scale rather than silently re-keyed.
pub fn cache_key(url: &str) -> String {
    let truncated: String = url.chars().take(KEY_MAX_URL_CHARS).collect();
    format!("{KEY_PREFIX}{truncated}")
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

fn now_epoch_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

/// Policy layer for scraped content: key format, payload shape validation,
/// the TTL and size bounds, and self-healing eviction of bad entries.
///
/// Every failure here is absorbed: reads degrade to a miss, writes to a
/// no-op. Callers never see a cache error.
#[derive(Clone)]
pub struct ScrapeCache {
    store: Arc<dyn CacheStore>,
}

impl ScrapeCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, url: &str) -> Option<ScrapedContent> {
        let key = cache_key(url);
        let raw = match self.store.get(&key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%key, error = %e, "cache read failed; treating as miss");
                return None;
            }
        }?;

        match serde_json::from_str::<ScrapedContent>(&raw) {
            Ok(content) => {
                debug!(%key, "cache hit");
                Some(content)
            }
            Err(e) => {
                // Self-healing: a poisoned entry is deleted, not surfaced.
                warn!(%key, error = %e, "invalid cached payload; evicting");
                if let Err(e) = self.store.delete(&key).await {
                    warn!(%key, error = %e, "failed to evict invalid cache entry");
                }
                None
            }
        }
    }

    /// Stamps `cached_at` on `content`, then persists it under the URL's key
    /// with the fixed TTL. Oversized payloads and backend failures are
    /// logged and skipped; the stamped value stays usable by the caller.
    pub async fn put(&self, url: &str, content: &mut ScrapedContent) {
        let key = cache_key(url);
        content.cached_at = Some(now_epoch_ms());

        let payload = match serde_json::to_string(content) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%key, error = %e, "failed to serialize content for cache");
                return;
            }
        };
        if payload.len() > MAX_CACHE_PAYLOAD_BYTES {
            warn!(%key, bytes = payload.len(), "content too large to cache; skipping write");
            return;
        }

        match self.store.set(&key, payload, CACHE_TTL).await {
            Ok(()) => info!(%key, "cached scrape result"),
            Err(e) => warn!(%key, error = %e, "cache write failed"),
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    payload: String,
    expires_at: Instant,
}

/// Mutexed map store. Expired entries are dropped lazily on read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemoryEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.payload.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| Error::Cache(format!("ttl out of range: {ttl:?}")))?;
        self.lock().insert(
            key.to_string(),
            MemoryEntry {
                payload: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FsEntry {
    expires_at_epoch_s: u64,
    payload: String,
}

/// One JSON document per key under `root`, sharded by the first bytes of the
/// key's sha256 so no directory grows without bound. Expired or unreadable
/// documents count as absent and are removed on read.
#[derive(Debug, Clone)]
pub struct FsCache {
    root: PathBuf,
}

impl FsCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut h = Sha256::new();
        h.update(key.as_bytes());
        let digest = hex::encode(h.finalize());
        self.root
            .join(&digest[0..2])
            .join(&digest[2..4])
            .join(format!("{digest}.json"))
    }

    fn get_sync(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| Error::Cache(e.to_string()))?;
        let entry: FsEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(_) => {
                let _ = fs::remove_file(&path);
                return Ok(None);
            }
        };
        if now_epoch_s() >= entry.expires_at_epoch_s {
            let _ = fs::remove_file(&path);
            return Ok(None);
        }
        Ok(Some(entry.payload))
    }

    fn set_sync(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::Cache(e.to_string()))?;
        }
        let entry = FsEntry {
            expires_at_epoch_s: now_epoch_s().saturating_add(ttl.as_secs()),
            payload: value,
        };
        fs::write(
            &path,
            serde_json::to_vec(&entry).map_err(|e| Error::Cache(e.to_string()))?,
        )
        .map_err(|e| Error::Cache(e.to_string()))
    }

    fn delete_sync(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Cache(e.to_string())),
        }
    }
}

#[async_trait::async_trait]
impl CacheStore for FsCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let cache = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || cache.get_sync(&key))
            .await
            .map_err(|e| Error::Cache(format!("cache get join failed: {e}")))?
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let cache = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || cache.set_sync(&key, value, ttl))
            .await
            .map_err(|e| Error::Cache(format!("cache set join failed: {e}")))?
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let cache = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || cache.delete_sync(&key))
            .await
            .map_err(|e| Error::Cache(format!("cache delete join failed: {e}")))?
    }
}
