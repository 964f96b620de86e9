//! Redis-backed link cache.
//!
//! One key holds the entry as JSON `{data, timestamp, expiresAt}` with
//! millisecond timestamps. The key carries a `PX` expiry equal to the TTL, so
//! Redis drops it even when nobody reads it; reads still check `expiresAt`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use pockets_api_types::LinksResponse;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::clock::Clock;
use super::entry::{CacheEntry, CachePolicy, Freshness};
use super::store::{CacheError, LinkCacheStore};

#[derive(Serialize)]
struct PersistedEntryRef<'a> {
    data: &'a LinksResponse,
    timestamp: i64,
    #[serde(rename = "expiresAt")]
    expires_at: i64,
}

#[derive(Deserialize)]
struct PersistedEntry {
    data: LinksResponse,
    timestamp: i64,
    #[serde(rename = "expiresAt")]
    expires_at: i64,
}

pub struct RedisStore {
    conn: ConnectionManager,
    key: String,
    // Process-local; clears issued by other processes are not observed.
    generation: AtomicU64,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
}

impl RedisStore {
    /// Open a managed connection to `url`. Fails fast when Redis is unreachable.
    pub async fn connect(
        url: &str,
        key: impl Into<String>,
        policy: CachePolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            key: key.into(),
            generation: AtomicU64::new(0),
            policy,
            clock,
        })
    }

    fn ttl_millis(&self) -> u64 {
        u64::try_from(self.policy.ttl().as_millis())
            .unwrap_or(u64::MAX)
            .max(1)
    }
}

#[async_trait]
impl LinkCacheStore for RedisStore {
    async fn get(&self) -> Result<Option<CacheEntry>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&self.key).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let entry = match decode_entry(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(key = %self.key, error = %err, "Dropping unreadable link cache record");
                conn.del::<_, ()>(&self.key).await?;
                return Ok(None);
            }
        };

        if self.policy.freshness(&entry, self.clock.now()) == Freshness::Expired {
            debug!(key = %self.key, "Link cache record expired");
            conn.del::<_, ()>(&self.key).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn set(&self, data: Arc<LinksResponse>) -> Result<CacheEntry, CacheError> {
        let entry = self.policy.entry(data, self.clock.now());
        let json = encode_entry(&entry)?;

        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(&self.key)
            .arg(json)
            .arg("PX")
            .arg(self.ttl_millis())
            .query_async::<()>(&mut conn)
            .await?;

        Ok(entry)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(&self.key).await?;
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
        if self.generation() != generation {
            return Ok(None);
        }
        let entry = self.set(data).await?;

        // A clear that landed while SET was in flight may have run its DEL
        // first; undo the write.
        if self.generation() != generation {
            debug!(key = %self.key, "Link cache cleared during write, dropping it");
            let mut conn = self.conn.clone();
            conn.del::<_, ()>(&self.key).await?;
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

fn unix_millis(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

fn from_unix_millis(ms: i64) -> Result<OffsetDateTime, CacheError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .map_err(|err| CacheError::Decode(err.to_string()))
}

fn encode_entry(entry: &CacheEntry) -> Result<String, CacheError> {
    serde_json::to_string(&PersistedEntryRef {
        data: &entry.data,
        timestamp: unix_millis(entry.created_at),
        expires_at: unix_millis(entry.expires_at),
    })
    .map_err(|err| CacheError::Decode(err.to_string()))
}

fn decode_entry(raw: &str) -> Result<CacheEntry, CacheError> {
    let persisted: PersistedEntry =
        serde_json::from_str(raw).map_err(|err| CacheError::Decode(err.to_string()))?;
    Ok(CacheEntry {
        data: Arc::new(persisted.data),
        created_at: from_unix_millis(persisted.timestamp)?,
        expires_at: from_unix_millis(persisted.expires_at)?,
    })
}
