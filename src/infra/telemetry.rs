use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global tracing subscriber and register metric descriptions.
///
/// Logs go to stderr; stdout is reserved for command output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("tracing subscriber already set: {err}")))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "tategaki_render_total",
            Unit::Count,
            "Total number of render attempts, labelled by result."
        );
        describe_histogram!(
            "tategaki_render_ms",
            Unit::Milliseconds,
            "End-to-end render latency in milliseconds."
        );
        describe_gauge!(
            "tategaki_pool_in_use",
            Unit::Count,
            "Render handles currently checked out of the pool."
        );
        describe_counter!(
            "tategaki_pool_acquire_timeout_total",
            Unit::Count,
            "Total number of pool acquisitions that timed out."
        );
        describe_counter!(
            "tategaki_pool_replace_total",
            Unit::Count,
            "Total number of render handles replaced after a failure or cancellation."
        );
        describe_histogram!(
            "tategaki_pool_acquire_wait_ms",
            Unit::Milliseconds,
            "Time spent waiting for a render handle in milliseconds."
        );
    });
}
