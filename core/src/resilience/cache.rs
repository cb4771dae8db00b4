use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// TTL used by the character-endpoint call sites.
pub const DEFAULT_CHARACTER_TTL: Duration = Duration::from_secs(30 * 60);
/// How often the background sweep reclaims expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Bytes,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Serialized form of one entry in the snapshot document. The expiry is
/// stored as an absolute timestamp; remaining TTL is recomputed on load.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Process-local store of raw remote-API payloads keyed by request URL.
///
/// One instance is constructed at startup and injected into every consumer.
/// Reads take the shared lock; writes and sweeps take the exclusive one.
/// Expired entries read as absent but stay in the map until a sweep.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        #[expect(clippy::unwrap_used)]
        let entries = self.entries.read().unwrap();
        let entry = entries.get(key)?;
        if entry.is_expired(Utc::now()) {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: Bytes, ttl: Duration) {
        let ttl = chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        #[expect(clippy::unwrap_used)]
        let mut entries = self.entries.write().unwrap();
        entries.insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Removes every key containing `pattern`. Returns how many were dropped.
    pub fn invalidate(&self, pattern: &str) -> usize {
        #[expect(clippy::unwrap_used)]
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !key.contains(pattern));
        before - entries.len()
    }

    pub fn clear(&self) {
        #[expect(clippy::unwrap_used)]
        self.entries.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        #[expect(clippy::unwrap_used)]
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops entries past expiry under the write lock. Returns how many were
    /// reclaimed.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        #[expect(clippy::unwrap_used)]
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Writes all non-expired entries to `path` as a point-in-time JSON
    /// snapshot. A crash between passes loses at most the latest pass.
    pub fn save_snapshot(&self, path: &Path) -> Result<usize, CacheError> {
        let now = Utc::now();
        let snapshot: HashMap<String, SnapshotEntry> = {
            #[expect(clippy::unwrap_used)]
            let entries = self.entries.read().unwrap();
            entries
                .iter()
                .filter(|(_, entry)| !entry.is_expired(now))
                .map(|(key, entry)| {
                    (
                        key.clone(),
                        SnapshotEntry {
                            value: BASE64.encode(&entry.value),
                            expires_at: entry.expires_at,
                        },
                    )
                })
                .collect()
        };
        let count = snapshot.len();
        std::fs::write(path, serde_json::to_vec_pretty(&snapshot)?)?;
        Ok(count)
    }

    /// Reloads a snapshot written by `save_snapshot`. Entries whose stored
    /// expiry has already passed are dropped; undecodable payloads are
    /// skipped with a warning rather than failing the load.
    pub fn load_snapshot(&self, path: &Path) -> Result<usize, CacheError> {
        let raw = std::fs::read(path)?;
        let snapshot: HashMap<String, SnapshotEntry> = serde_json::from_slice(&raw)?;
        let now = Utc::now();
        let mut loaded = 0usize;
        #[expect(clippy::unwrap_used)]
        let mut entries = self.entries.write().unwrap();
        for (key, entry) in snapshot {
            if entry.expires_at <= now {
                continue;
            }
            let value = match BASE64.decode(&entry.value) {
                Ok(bytes) => Bytes::from(bytes),
                Err(err) => {
                    tracing::warn!(%key, "skipping undecodable snapshot entry: {err}");
                    continue;
                }
            };
            entries.insert(
                key,
                CacheEntry {
                    value,
                    expires_at: entry.expires_at,
                },
            );
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Background sweep on a fixed interval. Best-effort: consumers never
    /// assume it has run, since `get` already treats expired entries as
    /// absent.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, "cache sweep reclaimed expired entries");
                        }
                    }
                }
            }
        })
    }
}
