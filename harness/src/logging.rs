//! Development-time tracing for the harness.
//!
//! Tracing goes to stderr and is controlled by `RUST_LOG`. Check results and
//! reports are product output: the `smoke` binary prints them to stdout and
//! persists them under the results directory regardless of the filter.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn";

/// Install the global tracing subscriber (stderr, compact format).
///
/// Fails if a subscriber is already installed.
///
/// # Example
/// ```bash
/// RUST_LOG=harness=debug,smoke=info cargo run -p smoke -- run talos
/// ```
pub fn init() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .context("install tracing subscriber")
}
