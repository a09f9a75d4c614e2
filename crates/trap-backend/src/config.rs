//! Backend configuration.
//!
//! Options arrive as an all-optional bag ([`BackendOptions`]) so presence is
//! explicit: an option that was set to `false` stays `false` instead of
//! falling back to its default. `resolve()` validates once at startup and
//! produces the concrete [`BackendConfig`] everything else reads.

use std::time::Duration;

use error_stack::ResultExt;
use serde::Deserialize;
use trap_codec::FlattenOptions;
use trap_codec::Namespaces;
use url::Url;

use crate::error::BackendError;
use crate::error::BackendResult;
use crate::transport::REQUEST_TIMEOUT;

/// Public broker CA certificate used when no `cert_url` is configured.
pub const DEFAULT_CERT_URL: &str = "http://login.circonus.com/pki/ca.crt";

/// Raw options as supplied by the host engine's configuration.
///
/// Every field is optional; unset fields take the documented default during
/// [`BackendOptions::resolve`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendOptions {
    /// Submission endpoint URL for the flush PUT. Absent disables transport.
    pub check_url: Option<String>,
    /// Source URL for the pinned broker CA certificate.
    pub cert_url: Option<String>,
    /// Prefix prepended to every namespace. Default empty.
    pub global_prefix: Option<String>,
    pub prefix_counter: Option<String>,
    pub prefix_timer: Option<String>,
    pub prefix_gauge: Option<String>,
    pub prefix_set: Option<String>,
    /// Namespace segment for engine/self metrics. Default `statsd`.
    pub prefix_internal: Option<String>,
    /// Forward timer derivative statistics. Default true.
    pub send_timer_derivatives: Option<bool>,
    /// Send raw timer sample arrays instead of histograms. Default false.
    pub send_raw_timers: Option<bool>,
    /// Include a process memory snapshot. Default true.
    pub send_memory_stats: Option<bool>,
    /// Hint the allocator to release memory after a successful send.
    /// Default false.
    pub force_reclaim: Option<bool>,
    /// Also emit raw counter totals. Default true.
    pub flush_counts: Option<bool>,
    /// The engine already sanitized metric names. Default false, meaning
    /// names are sanitized locally.
    pub key_sanitized_upstream: Option<bool>,
}

impl BackendOptions {
    /// Validate and fill in defaults.
    pub fn resolve(self) -> BackendResult<BackendConfig> {
        let check_url = match self.check_url {
            Some(raw) => Some(Url::parse(&raw).change_context(BackendError::Configuration {
                message: format!("invalid submission endpoint URL: {raw}"),
            })?),
            None => None,
        };
        let cert_raw = self.cert_url.unwrap_or_else(|| DEFAULT_CERT_URL.to_string());
        let cert_url = Url::parse(&cert_raw).change_context(BackendError::Configuration {
            message: format!("invalid CA certificate URL: {cert_raw}"),
        })?;

        Ok(BackendConfig {
            check_url,
            cert_url,
            global_prefix: self.global_prefix.unwrap_or_default(),
            prefix_counter: self.prefix_counter.unwrap_or_else(|| "counters".to_string()),
            prefix_timer: self.prefix_timer.unwrap_or_else(|| "timers".to_string()),
            prefix_gauge: self.prefix_gauge.unwrap_or_else(|| "gauges".to_string()),
            prefix_set: self.prefix_set.unwrap_or_else(|| "sets".to_string()),
            prefix_internal: self.prefix_internal.unwrap_or_else(|| "statsd".to_string()),
            send_timer_derivatives: self.send_timer_derivatives.unwrap_or(true),
            send_raw_timers: self.send_raw_timers.unwrap_or(false),
            send_memory_stats: self.send_memory_stats.unwrap_or(true),
            force_reclaim: self.force_reclaim.unwrap_or(false),
            flush_counts: self.flush_counts.unwrap_or(true),
            key_sanitized_upstream: self.key_sanitized_upstream.unwrap_or(false),
            request_timeout: REQUEST_TIMEOUT,
        })
    }
}

/// Resolved backend configuration, immutable after startup.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub check_url: Option<Url>,
    pub cert_url: Url,
    pub global_prefix: String,
    pub prefix_counter: String,
    pub prefix_timer: String,
    pub prefix_gauge: String,
    pub prefix_set: String,
    pub prefix_internal: String,
    pub send_timer_derivatives: bool,
    pub send_raw_timers: bool,
    pub send_memory_stats: bool,
    pub force_reclaim: bool,
    pub flush_counts: bool,
    pub key_sanitized_upstream: bool,
    /// Bound on the cert fetch and on each submission.
    pub request_timeout: Duration,
}

impl BackendConfig {
    /// Build the per-class namespaces once.
    pub fn namespaces(&self) -> Namespaces {
        Namespaces::new(
            &self.global_prefix,
            &self.prefix_counter,
            &self.prefix_timer,
            &self.prefix_gauge,
            &self.prefix_set,
            &self.prefix_internal,
        )
    }

    /// Flattening switches derived from this configuration.
    pub fn flatten_options(&self) -> FlattenOptions {
        FlattenOptions {
            flush_counts: self.flush_counts,
            send_timer_derivatives: self.send_timer_derivatives,
            send_raw_timers: self.send_raw_timers,
            sanitize_keys: !self.key_sanitized_upstream,
        }
    }
}
