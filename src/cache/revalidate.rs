//! Single-flight background refresh of the link cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use metrics::counter;
use pockets_api_types::LinksResponse;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::LinkCacheStore;
use super::{METRIC_REVALIDATE_FAILED, METRIC_REVALIDATE_SKIPPED, METRIC_REVALIDATE_STARTED};
use crate::upstream::{LinkSource, ListQuery, UpstreamError};

/// Outcome of [`Revalidator::trigger_refresh`].
#[derive(Debug)]
pub enum RefreshTrigger {
    /// A refresh task was spawned.
    Started(JoinHandle<()>),
    /// Another refresh is in flight; nothing was spawned.
    AlreadyRunning,
}

/// Refreshes the link cache from upstream.
///
/// At most one background refresh runs per process. The in-flight flag is
/// claimed before the upstream call and released when the task ends,
/// whether it succeeded, failed or panicked.
#[derive(Clone)]
pub struct Revalidator {
    store: Arc<dyn LinkCacheStore>,
    source: Arc<dyn LinkSource>,
    in_flight: Arc<AtomicBool>,
}

/// Releases the in-flight flag on drop.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Revalidator {
    pub fn new(store: Arc<dyn LinkCacheStore>, source: Arc<dyn LinkSource>) -> Self {
        Self {
            store,
            source,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start a detached refresh unless one is already running. Never waits on
    /// the upstream; failures are logged and counted.
    pub fn trigger_refresh(&self, query: ListQuery) -> RefreshTrigger {
        let Some(guard) = InFlight::claim(&self.in_flight) else {
            debug!("Link cache refresh already in flight");
            counter!(METRIC_REVALIDATE_SKIPPED).increment(1);
            return RefreshTrigger::AlreadyRunning;
        };

        counter!(METRIC_REVALIDATE_STARTED).increment(1);
        let store = self.store.clone();
        let source = self.source.clone();
        let generation = store.generation();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            match source.list_links(&query).await {
                Ok(page) => {
                    let items = page.data.len();
                    match store.set_if_generation(Arc::new(page), generation).await {
                        Ok(Some(_)) => {
                            info!(items, backend = store.backend(), "Link cache refreshed");
                        }
                        Ok(None) => {
                            info!(
                                backend = store.backend(),
                                "Link cache invalidated during refresh, result discarded"
                            );
                        }
                        Err(err) => {
                            counter!(METRIC_REVALIDATE_FAILED).increment(1);
                            warn!(backend = store.backend(), error = %err, "Failed to store refreshed links");
                        }
                    }
                }
                Err(err) => {
                    counter!(METRIC_REVALIDATE_FAILED).increment(1);
                    warn!(error = %err, "Background link refresh failed");
                }
            }
        });

        RefreshTrigger::Started(handle)
    }

    /// Fetch and store synchronously, bypassing the in-flight flag. The write
    /// is unconditional.
    ///
    /// A failed store write is logged; the fetched page is still returned.
    pub async fn refresh_now(&self, query: &ListQuery) -> Result<Arc<LinksResponse>, UpstreamError> {
        let page = Arc::new(self.source.list_links(query).await?);
        if let Err(err) = self.store.set(page.clone()).await {
            warn!(backend = self.store.backend(), error = %err, "Failed to store refreshed links");
        }
        Ok(page)
    }
}
