//! Pure encoding pipeline for the httptrap statsd backend.
//!
//! This crate turns one flush cycle's aggregated metrics into the flat,
//! namespaced key/value mapping the ingestion endpoint expects. It has no
//! I/O: the transport side lives in `trap-backend`.
//!
//! - [`Namespace`]: composes ordered path segments into composite keys.
//! - [`histogram`]: compresses timer samples into log-scale buckets.
//! - [`flatten`]: the per-cycle orchestration producing [`FlatStats`].

pub mod flatten;
pub mod histogram;
pub mod namespace;
pub mod types;

pub use flatten::flatten;
pub use flatten::FlattenOptions;
pub use namespace::sanitize_name;
pub use namespace::Namespace;
pub use namespace::Namespaces;
pub use namespace::DELIMITER;
pub use types::DerivedValue;
pub use types::FlatStats;
pub use types::FlatValue;
pub use types::HealthState;
pub use types::MemoryUsage;
pub use types::MetricSnapshot;

/// Product-identifying segment for self-metrics, and the component name
/// reported on the status interface.
pub const BACKEND_NAME: &str = "httptrap";
