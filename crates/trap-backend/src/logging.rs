//! Tracing setup for processes embedding the backend.
//!
//! The host stats engine's single-argument log sink maps onto `tracing`
//! events throughout the crate; this helper installs a subscriber for
//! standalone use. Engines with their own subscriber skip it.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Install a stderr subscriber, INFO by default, overridable via `RUST_LOG`.
pub fn init() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
