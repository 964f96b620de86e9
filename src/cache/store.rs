//! Link cache storage.
//!
//! A single entry holding the first page of links. Backends share one
//! contract: reads past `expires_at` behave as absent and drop the entry,
//! writes replace the entry wholesale.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use pockets_api_types::{CacheStats, LinksResponse};
use thiserror::Error;
use time::OffsetDateTime;

use super::clock::Clock;
use super::entry::{CacheEntry, CachePolicy, Freshness};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(#[from] redis::RedisError),
    #[error("cached record is unreadable: {0}")]
    Decode(String),
}

/// Storage for the link cache entry.
#[async_trait]
pub trait LinkCacheStore: Send + Sync {
    /// The current entry, or `None` when never written, cleared or expired.
    async fn get(&self) -> Result<Option<CacheEntry>, CacheError>;

    /// Replace the entry with `data`, written now.
    async fn set(&self, data: Arc<LinksResponse>) -> Result<CacheEntry, CacheError>;

    /// Drop the entry and bump [`generation`](Self::generation).
    async fn clear(&self) -> Result<(), CacheError>;

    /// Counter bumped by every `clear`.
    fn generation(&self) -> u64;

    /// Like `set`, but the write is dropped (`Ok(None)`) when a `clear` ran
    /// after `generation` was read. Background refreshes use this so a fetch
    /// that started before an invalidation cannot restore the old snapshot.
    async fn set_if_generation(
        &self,
        data: Arc<LinksResponse>,
        generation: u64,
    ) -> Result<Option<CacheEntry>, CacheError>;

    fn policy(&self) -> CachePolicy;

    fn now(&self) -> OffsetDateTime;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let entry = self.get().await?;
        Ok(self.policy().stats(entry.as_ref(), self.now()))
    }

    fn is_stale(&self, entry: &CacheEntry) -> bool {
        self.policy().is_stale(entry, self.now())
    }
}

/// Process-local link cache.
pub struct MemoryStore {
    entry: RwLock<Option<CacheEntry>>,
    // Only changed while `entry` is write-locked.
    generation: AtomicU64,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            entry: RwLock::new(None),
            generation: AtomicU64::new(0),
            policy,
            clock,
        }
    }
}

#[async_trait]
impl LinkCacheStore for MemoryStore {
    async fn get(&self) -> Result<Option<CacheEntry>, CacheError> {
        let now = self.clock.now();
        {
            let guard = rw_read(&self.entry, SOURCE, "get");
            match guard.as_ref() {
                None => return Ok(None),
                Some(entry) if self.policy.freshness(entry, now) != Freshness::Expired => {
                    return Ok(Some(entry.clone()));
                }
                Some(_) => {}
            }
        }

        // Re-check under the write lock: a refresh may have landed in between.
        let mut guard = rw_write(&self.entry, SOURCE, "get.expire");
        if let Some(entry) = guard.as_ref() {
            if self.policy.freshness(entry, now) != Freshness::Expired {
                return Ok(Some(entry.clone()));
            }
            *guard = None;
        }
        Ok(None)
    }

    async fn set(&self, data: Arc<LinksResponse>) -> Result<CacheEntry, CacheError> {
        let entry = self.policy.entry(data, self.clock.now());
        *rw_write(&self.entry, SOURCE, "set") = Some(entry.clone());
        Ok(entry)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut guard = rw_write(&self.entry, SOURCE, "clear");
        *guard = None;
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    async fn set_if_generation(
        &self,
        data: Arc<LinksResponse>,
        generation: u64,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let mut guard = rw_write(&self.entry, SOURCE, "set_if_generation");
        if self.generation.load(Ordering::Acquire) != generation {
            return Ok(None);
        }
        let entry = self.policy.entry(data, self.clock.now());
        *guard = Some(entry.clone());
        Ok(Some(entry))
    }

    fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
