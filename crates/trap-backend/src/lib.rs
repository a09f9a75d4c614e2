//! statsd backend forwarding aggregated metrics to an httptrap endpoint.
//!
//! On each flush cycle the host stats engine hands over a snapshot of
//! aggregated counters, gauges, timers and sets. The backend flattens it
//! into a namespaced key/value payload (see `trap-codec`), then submits it
//! as JSON over an authenticated PUT whose TLS trust is pinned to a broker
//! CA certificate fetched once at startup. Delivery is best effort: there
//! is no retry, no persistence, and a failed cycle is simply dropped.
//!
//! # Examples
//!
//! ```no_run
//! # use trap_backend::{BackendOptions, HttptrapBackend, MetricSnapshot};
//! # use trap_backend::health::unix_seconds;
//! # async fn run() -> trap_backend::BackendResult<()> {
//! let options = BackendOptions {
//!     check_url: Some("https://broker.example/module/httptrap/<id>/<secret>".into()),
//!     ..BackendOptions::default()
//! };
//! let backend = HttptrapBackend::init(unix_seconds(), options).await?;
//!
//! // Driven by the engine's flush event:
//! let snapshot = MetricSnapshot::default();
//! backend.flush(&snapshot).await;
//!
//! // Driven by the engine's status event:
//! backend.each_status(|component, stat, value| {
//!     println!("{component}.{stat} = {value}");
//! });
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod memory;
pub mod transport;

use tracing::info;
pub use trap_codec::flatten;
pub use trap_codec::FlatStats;
pub use trap_codec::FlatValue;
pub use trap_codec::FlattenOptions;
pub use trap_codec::MetricSnapshot;
pub use trap_codec::Namespaces;
pub use trap_codec::BACKEND_NAME;

pub use config::BackendConfig;
pub use config::BackendOptions;
pub use config::DEFAULT_CERT_URL;
pub use error::BackendError;
pub use error::BackendResult;
pub use health::BackendHealth;
pub use transport::TransportClient;

/// Reported alongside [`BACKEND_NAME`] when the backend loads.
pub const BACKEND_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The backend: one instance per process, driven by the engine's flush and
/// status events.
pub struct HttptrapBackend {
    flatten_options: FlattenOptions,
    namespaces: Namespaces,
    send_memory_stats: bool,
    transport: TransportClient,
}

impl HttptrapBackend {
    /// One-time setup from raw options: validates configuration, seeds the
    /// health counters with the engine's startup time, and bootstraps the
    /// transport (fetching and pinning the broker CA certificate).
    pub async fn init(startup_time: u64, options: BackendOptions) -> BackendResult<Self> {
        Ok(Self::with_config(startup_time, options.resolve()?).await)
    }

    /// Setup from an already-resolved configuration.
    pub async fn with_config(startup_time: u64, config: BackendConfig) -> Self {
        let health = BackendHealth::new(startup_time);
        let transport = TransportClient::bootstrap(&config, health).await;
        info!(
            backend = BACKEND_NAME,
            version = BACKEND_VERSION,
            "backend loaded"
        );
        Self {
            flatten_options: config.flatten_options(),
            namespaces: config.namespaces(),
            send_memory_stats: config.send_memory_stats,
            transport,
        }
    }

    /// One flush cycle: flatten the snapshot (injecting the prior cycle's
    /// health counters and an optional memory sample) and submit it.
    /// Never fails outward; a disabled transport makes this a no-op send.
    pub async fn flush(&self, snapshot: &MetricSnapshot) {
        let health = self.transport.health().snapshot();
        let memory = if self.send_memory_stats {
            memory::sample()
        } else {
            None
        };
        let stats = flatten(
            snapshot,
            &self.flatten_options,
            &self.namespaces,
            &health,
            memory,
        );
        self.transport.submit(&stats).await;
    }

    /// Status event: visit every health counter with
    /// `(component, stat, value)`.
    pub fn each_status<F>(&self, report: F)
    where
        F: FnMut(&str, &str, u64),
    {
        self.transport.health().for_each_stat(report);
    }

    /// Whether the transport bootstrap succeeded.
    pub fn is_ready(&self) -> bool {
        self.transport.is_ready()
    }
}
