//! Tracing subscriber setup for binaries and tests that embed the compiler

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a JSON `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (usually
/// [`CompilerConfig::log_filter`](crate::config::CompilerConfig)) is used.
/// Returns `false` when a global subscriber was already installed.
pub fn init(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().json())
        .try_init()
        .is_ok()
}
