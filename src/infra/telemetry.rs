use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_LINKS_BYPASS, METRIC_LINKS_HIT, METRIC_LINKS_MISS, METRIC_PAGE_HIT, METRIC_PAGE_MISS,
    METRIC_REVALIDATE_FAILED, METRIC_REVALIDATE_SKIPPED, METRIC_REVALIDATE_STARTED,
};
use crate::config::{LogFormat, LoggingSettings};
use crate::upstream::METRIC_UPSTREAM_REQUEST_MS;

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Counters for the link cache, in read-path order.
const LINK_CACHE_COUNTERS: &[(&str, &str)] = &[
    (METRIC_LINKS_HIT, "Listing requests answered from the link cache."),
    (METRIC_LINKS_MISS, "Cacheable listing requests that had to fetch upstream."),
    (METRIC_LINKS_BYPASS, "Listing requests that never consult the link cache."),
    (METRIC_REVALIDATE_STARTED, "Background link cache refreshes started."),
    (
        METRIC_REVALIDATE_SKIPPED,
        "Refresh triggers ignored because a refresh was already in flight.",
    ),
    (METRIC_REVALIDATE_FAILED, "Background link cache refreshes that failed."),
];

const PAGE_CACHE_COUNTERS: &[(&str, &str)] = &[
    (METRIC_PAGE_HIT, "Rendered pages served from the page cache."),
    (METRIC_PAGE_MISS, "Rendered pages that had to be built."),
];

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        for &(name, description) in LINK_CACHE_COUNTERS.iter().chain(PAGE_CACHE_COUNTERS) {
            describe_counter!(name, Unit::Count, description);
        }
        describe_histogram!(
            METRIC_UPSTREAM_REQUEST_MS,
            Unit::Milliseconds,
            "Upstream API request latency in milliseconds."
        );
    });
}
