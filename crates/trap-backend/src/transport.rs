//! Transport to the ingestion endpoint.
//!
//! At startup the broker CA certificate is fetched once and pinned; from
//! then on each flush cycle performs a single timeout-bounded PUT. There is
//! no retry at either stage: a failed bootstrap disables the transport for
//! the process lifetime, a failed submission drops that cycle's data.

use std::time::Duration;
use std::time::Instant;

use error_stack::Report;
use error_stack::ResultExt;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use reqwest::Certificate;
use reqwest::Client;
use reqwest::StatusCode;
use tracing::debug;
use tracing::info;
use tracing::warn;
use trap_codec::FlatStats;
use url::Url;

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::error::BackendResult;
use crate::health::unix_seconds;
use crate::health::BackendHealth;

/// Bound on the cert fetch and on each submission. The request and its
/// timer are mutually cancelling inside reqwest: whichever fires first
/// aborts the other, and the completion is observed exactly once.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

enum TransportState {
    /// Pinned certificate loaded, submission endpoint derived.
    Ready { http: Client, endpoint: Url },
    /// Terminal: flushes are silently dropped for the process lifetime.
    Disabled,
}

/// Stateful submission client owning the transport health counters.
pub struct TransportClient {
    state: TransportState,
    force_reclaim: bool,
    health: BackendHealth,
}

impl TransportClient {
    /// One-time bootstrap. Fetches and pins the broker CA certificate when
    /// a submission endpoint is configured; any failure disables the
    /// transport permanently.
    pub async fn bootstrap(config: &BackendConfig, health: BackendHealth) -> Self {
        let Some(endpoint) = config.check_url.clone() else {
            info!("no submission endpoint configured, transport disabled");
            return Self::disabled(config, health);
        };

        match Self::pinned_client(&config.cert_url, config.request_timeout).await {
            Ok(http) => {
                info!(cert_url = %config.cert_url, "loaded broker CA certificate");
                Self {
                    state: TransportState::Ready { http, endpoint },
                    force_reclaim: config.force_reclaim,
                    health,
                }
            }
            Err(report) => {
                warn!(error = ?report, "broker CA bootstrap failed, transport disabled");
                Self::disabled(config, health)
            }
        }
    }

    fn disabled(config: &BackendConfig, health: BackendHealth) -> Self {
        Self {
            state: TransportState::Disabled,
            force_reclaim: config.force_reclaim,
            health,
        }
    }

    /// Fetch the CA document (http or https per its scheme) and build the
    /// submission client trusting only that certificate.
    async fn pinned_client(cert_url: &Url, timeout: Duration) -> BackendResult<Client> {
        let fetcher = Client::builder()
            .timeout(timeout)
            .build()
            .change_context(BackendError::CertFetch)?;
        let response = fetcher
            .get(cert_url.clone())
            .send()
            .await
            .change_context(BackendError::CertFetch)?;
        if response.status() != StatusCode::OK {
            return Err(Report::new(BackendError::CertFetch)
                .attach_printable(format!("unexpected status {}", response.status())));
        }
        let pem = response
            .bytes()
            .await
            .change_context(BackendError::CertFetch)?;
        let cert = Certificate::from_pem(&pem).change_context(BackendError::CertFetch)?;

        Client::builder()
            .timeout(timeout)
            .add_root_certificate(cert)
            .build()
            .change_context(BackendError::CertFetch)
    }

    /// Whether the bootstrap succeeded and flushes will be submitted.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, TransportState::Ready { .. })
    }

    /// Health counters owned by this transport.
    pub fn health(&self) -> &BackendHealth {
        &self.health
    }

    /// Submit one cycle's flattened payload. Never fails outward: failures
    /// are logged and the cycle's data is dropped. Health is updated only
    /// on a successful send, except that a payload-encoding failure records
    /// the exception timestamp.
    pub async fn submit(&self, stats: &FlatStats) {
        let TransportState::Ready { http, endpoint } = &self.state else {
            return;
        };

        let started = Instant::now();
        let payload = match serde_json::to_vec(stats) {
            Ok(payload) => payload,
            Err(err) => {
                let report = Report::new(err).change_context(BackendError::Encoding);
                warn!(error = ?report, "failed to encode payload, skipping this cycle");
                self.health.record_exception(unix_seconds());
                return;
            }
        };
        let payload_len = payload.len() as u64;

        let response = http
            .put(endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(payload)
            .send()
            .await;

        match response {
            Ok(response) if response.status() == StatusCode::OK => {
                self.health.record_flush(
                    started.elapsed().as_millis() as u64,
                    payload_len,
                    unix_seconds(),
                );
                debug!(bytes = payload_len, "metrics submitted");
                if self.force_reclaim {
                    reclaim_hint();
                }
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let report = Report::new(BackendError::Submission {
                    message: format!("unexpected status {status}"),
                })
                .attach_printable(body);
                warn!(error = ?report, "ingestion endpoint rejected metrics, dropping this cycle");
            }
            Err(err) if err.is_timeout() => {
                warn!("submission timed out, dropping this cycle");
            }
            Err(err) => {
                let report = Report::new(err).change_context(BackendError::Submission {
                    message: "transport error".to_string(),
                });
                warn!(error = ?report, "failed to submit metrics, dropping this cycle");
            }
        }
    }
}

/// Best-effort allocator release after a send; no observable contract.
#[cfg(target_os = "linux")]
fn reclaim_hint() {
    unsafe {
        libc::malloc_trim(0);
    }
}

#[cfg(not(target_os = "linux"))]
fn reclaim_hint() {}
