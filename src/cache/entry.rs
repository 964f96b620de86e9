//! Link cache entries and the staleness policy applied to them.

use std::sync::Arc;
use std::time::Duration;

use pockets_api_types::{CacheStats, LinksResponse};
use time::OffsetDateTime;

/// The cached first page of links.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub data: Arc<LinksResponse>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Where an entry sits in its lifetime at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Younger than the staleness threshold.
    Fresh,
    /// Past the staleness threshold but not yet expired: serve and refresh.
    Stale,
    /// Past `expires_at`: treated as absent.
    Expired,
}

/// TTL and staleness threshold of the link cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachePolicy {
    ttl: Duration,
    stale_fraction: f64,
}

impl CachePolicy {
    pub fn new(ttl: Duration, stale_fraction: f64) -> Self {
        Self {
            ttl,
            stale_fraction,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Age after which an entry counts as stale.
    pub fn stale_after(&self) -> Duration {
        self.ttl.mul_f64(self.stale_fraction)
    }

    /// Build an entry written at `now`.
    pub fn entry(&self, data: Arc<LinksResponse>, now: OffsetDateTime) -> CacheEntry {
        CacheEntry {
            data,
            created_at: now,
            expires_at: now + self.ttl,
        }
    }

    pub fn freshness(&self, entry: &CacheEntry, now: OffsetDateTime) -> Freshness {
        if now > entry.expires_at {
            Freshness::Expired
        } else if now - entry.created_at > self.stale_after() {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }

    /// Stale entries are still valid; expired ones are not stale, they are gone.
    pub fn is_stale(&self, entry: &CacheEntry, now: OffsetDateTime) -> bool {
        self.freshness(entry, now) == Freshness::Stale
    }

    pub fn stats(&self, entry: Option<&CacheEntry>, now: OffsetDateTime) -> CacheStats {
        match entry {
            Some(entry) if self.freshness(entry, now) != Freshness::Expired => CacheStats {
                has_cache: true,
                age: whole_seconds(now - entry.created_at),
                expires_in: whole_seconds(entry.expires_at - now),
                is_stale: self.is_stale(entry, now),
            },
            _ => CacheStats::default(),
        }
    }
}

fn whole_seconds(duration: time::Duration) -> u64 {
    u64::try_from(duration.whole_seconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CachePolicy {
        CachePolicy::new(Duration::from_secs(60), 0.83)
    }

    fn written_at(now: OffsetDateTime) -> CacheEntry {
        policy().entry(Arc::new(LinksResponse::default()), now)
    }

    #[test]
    fn fresh_immediately_after_write() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let entry = written_at(now);

        assert_eq!(policy().freshness(&entry, now), Freshness::Fresh);
        assert!(!policy().is_stale(&entry, now));
        assert_eq!(entry.expires_at, now + Duration::from_secs(60));
    }

    #[test]
    fn stale_once_past_the_threshold() {
        let start = OffsetDateTime::UNIX_EPOCH;
        let entry = written_at(start);

        assert!(!policy().is_stale(&entry, start + Duration::from_secs(40)));
        assert!(!policy().is_stale(&entry, start + Duration::from_secs(49)));
        assert!(policy().is_stale(&entry, start + Duration::from_secs(50)));
        assert!(policy().is_stale(&entry, start + Duration::from_secs(55)));
        assert!(policy().is_stale(&entry, start + Duration::from_secs(60)));
    }

    #[test]
    fn expired_entries_are_not_stale() {
        let start = OffsetDateTime::UNIX_EPOCH;
        let entry = written_at(start);
        let later = start + Duration::from_secs(61);

        assert_eq!(policy().freshness(&entry, later), Freshness::Expired);
        assert!(!policy().is_stale(&entry, later));
    }

    #[test]
    fn threshold_scales_with_ttl() {
        let hourly = CachePolicy::new(Duration::from_secs(3600), 0.83);
        assert_eq!(hourly.stale_after().as_secs(), 2988);

        let start = OffsetDateTime::UNIX_EPOCH;
        let entry = hourly.entry(Arc::new(LinksResponse::default()), start);
        assert!(!hourly.is_stale(&entry, start + Duration::from_secs(49 * 60)));
        assert!(hourly.is_stale(&entry, start + Duration::from_secs(50 * 60)));
    }

    #[test]
    fn stats_report_age_and_remaining_lifetime() {
        let start = OffsetDateTime::UNIX_EPOCH;
        let entry = written_at(start);

        let stats = policy().stats(Some(&entry), start + Duration::from_secs(55));
        assert!(stats.has_cache);
        assert_eq!(stats.age, 55);
        assert_eq!(stats.expires_in, 5);
        assert!(stats.is_stale);

        let gone = policy().stats(Some(&entry), start + Duration::from_secs(61));
        assert_eq!(gone, CacheStats::default());
        assert_eq!(policy().stats(None, start), CacheStats::default());
    }
}
