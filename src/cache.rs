//! Content-addressed artifact cache with time-based expiry.
//!
//! Keys are fingerprints of (topic, audience, content type, outline), so two
//! writers of the same key always describe the same request; last write wins.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::content::{Audience, ContentType, GeneratedArtifact};
use crate::error::CacheError;

/// Hex SHA-256 fingerprint of one generation request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Fingerprint a request. `outline` is the outline text derivatives were
    /// generated from; the outline itself is keyed without one.
    pub fn fingerprint(
        topic: &str,
        audience: Audience,
        content_type: ContentType,
        outline: Option<&str>,
    ) -> Self {
        let topic = topic.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        let outline_hash = outline.map(|o| hex::encode(Sha256::digest(o.as_bytes())));

        let mut hasher = Sha256::new();
        hasher.update(b"lessonforge:v1\0");
        hasher.update(topic.as_bytes());
        hasher.update(b"\0");
        hasher.update(audience.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(content_type.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(outline_hash.as_deref().unwrap_or("-").as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait ContentCache: Send + Sync {
    /// Return the artifact stored under `key`, if present and unexpired.
    async fn get(&self, key: &CacheKey) -> Result<Option<GeneratedArtifact>, CacheError>;

    async fn put(
        &self,
        key: &CacheKey,
        artifact: &GeneratedArtifact,
        ttl: Duration,
    ) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    artifact: GeneratedArtifact,
    expires_at: Instant,
}

/// In-process cache. Expired entries are dropped lazily on read.
#[derive(Debug, Default)]
pub struct MemoryContentCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl ContentCache for MemoryContentCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<GeneratedArtifact>, CacheError> {
        let now = Instant::now();
        {
            let entries = self
                .entries
                .read()
                .map_err(|_| CacheError::Backend("cache lock poisoned".into()))?;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.artifact.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::Backend("cache lock poisoned".into()))?;
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn put(
        &self,
        key: &CacheKey,
        artifact: &GeneratedArtifact,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::Backend("cache lock poisoned".into()))?;
        entries.insert(
            key.clone(),
            CacheEntry {
                artifact: artifact.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}
