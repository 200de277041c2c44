use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level_filter().into())
        .from_env_lossy();

    let fmt_layer = match logging.format() {
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "campanile_cache_hit_total",
            Unit::Count,
            "Total number of cache hits, labeled by layer."
        );
        describe_counter!(
            "campanile_cache_miss_total",
            Unit::Count,
            "Total number of cache misses."
        );
        describe_counter!(
            "campanile_cache_stale_served_total",
            Unit::Count,
            "Total number of reads answered with a stale entry while revalidating."
        );
        describe_counter!(
            "campanile_cache_entry_dropped_total",
            Unit::Count,
            "Total number of stored entries dropped as unreadable."
        );
        describe_counter!(
            "campanile_cache_invalidated_total",
            Unit::Count,
            "Total number of cache entries cleared by invalidation."
        );
        describe_counter!(
            "campanile_revalidate_success_total",
            Unit::Count,
            "Total number of fetches that settled into the cache."
        );
        describe_counter!(
            "campanile_revalidate_failure_total",
            Unit::Count,
            "Total number of fetches that failed and left the cache untouched."
        );
        describe_counter!(
            "campanile_flight_joined_total",
            Unit::Count,
            "Total number of callers that joined an existing in-flight fetch."
        );
        describe_counter!(
            "campanile_placement_dropped_total",
            Unit::Count,
            "Total number of sponsor placements dropped during insertion, labeled by reason."
        );
        describe_histogram!(
            "campanile_fetch_ms",
            Unit::Milliseconds,
            "Content fetch latency in milliseconds, labeled by outcome."
        );
    });
}
