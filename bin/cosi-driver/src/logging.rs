//! Tracing setup

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Targets raised to `debug` by the debug toggle, SDK request logging included
const DEBUG_TARGETS: &[&str] = &[
    "cosi_driver",
    "cosi_s3",
    "aws_sdk_s3",
    "aws_smithy_runtime",
];

/// Filter used when `RUST_LOG` is unset
#[must_use]
pub fn default_filter(level: &str, debug: bool) -> String {
    if !debug {
        return level.to_string();
    }
    std::iter::once(level.to_string())
        .chain(DEBUG_TARGETS.iter().map(|target| format!("{target}=debug")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. `RUST_LOG` wins when set.
pub fn init(level: &str, debug: bool) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(level, debug).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
