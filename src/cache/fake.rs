//! Link cache double whose backend is always down.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use pockets_api_types::LinksResponse;
use time::OffsetDateTime;

use super::clock::Clock;
use super::entry::{CacheEntry, CachePolicy};
use super::store::{CacheError, LinkCacheStore};

pub(crate) struct FailingStore {
    pub policy: CachePolicy,
    pub clock: Arc<dyn Clock>,
}

fn unreachable_backend() -> CacheError {
    CacheError::Unavailable(redis::RedisError::from(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "connection refused",
    )))
}

#[async_trait]
impl LinkCacheStore for FailingStore {
    async fn get(&self) -> Result<Option<CacheEntry>, CacheError> {
        Err(CacheError::Decode("truncated record".to_string()))
    }

    async fn set(&self, _data: Arc<LinksResponse>) -> Result<CacheEntry, CacheError> {
        Err(unreachable_backend())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Err(unreachable_backend())
    }

    fn generation(&self) -> u64 {
        0
    }

    async fn set_if_generation(
        &self,
        _data: Arc<LinksResponse>,
        _generation: u64,
    ) -> Result<Option<CacheEntry>, CacheError> {
        Err(unreachable_backend())
    }

    fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}
