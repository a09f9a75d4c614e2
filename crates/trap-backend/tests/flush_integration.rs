//! End-to-end flush tests against a mock broker.
//!
//! The broker serves the CA certificate fixture over plain HTTP and captures
//! submitted payloads, which keeps the full bootstrap-then-PUT path honest
//! without real TLS.

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use poem::get;
use poem::handler;
use poem::http::StatusCode;
use poem::listener::Acceptor;
use poem::listener::Listener;
use poem::listener::TcpListener;
use poem::put;
use poem::web::Data;
use poem::web::Json;
use poem::EndpointExt;
use poem::IntoResponse;
use poem::Response;
use poem::Route;
use poem::Server;
use serde_json::Value;
use similar_asserts::assert_eq;
use test_log::test;
use trap_backend::health::unix_seconds;
use trap_backend::BackendOptions;
use trap_backend::HttptrapBackend;
use trap_codec::HealthState;
use trap_codec::MetricSnapshot;

const BROKER_CA_PEM: &str = include_str!("fixtures/broker-ca.pem");
const CHECK_PATH: &str = "/module/httptrap/check-id/secret";

#[derive(Default)]
struct BrokerState {
    payloads: Mutex<Vec<Value>>,
    delay: Mutex<Option<Duration>>,
    reject: AtomicBool,
}

#[handler]
fn serve_cert() -> &'static str {
    BROKER_CA_PEM
}

#[handler]
async fn ingest(Data(state): Data<&Arc<BrokerState>>, body: String) -> Response {
    let delay = *state.delay.lock().expect("should not be poisoned");
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if state.reject.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let parsed: Value = serde_json::from_str(&body).expect("payload should be JSON");
    let num_metrics = parsed.as_object().map(|o| o.len()).unwrap_or(0);
    state
        .payloads
        .lock()
        .expect("should not be poisoned")
        .push(parsed);
    Json(serde_json::json!({ "stats": num_metrics })).into_response()
}

async fn spawn_broker(state: Arc<BrokerState>) -> SocketAddr {
    let app = Route::new()
        .at("/pki/ca.crt", get(serve_cert))
        .at(CHECK_PATH, put(ingest))
        .data(state);
    let acceptor = TcpListener::bind("127.0.0.1:0")
        .into_acceptor()
        .await
        .expect("should bind");
    let addr = *acceptor.local_addr()[0]
        .as_socket_addr()
        .expect("should have a socket address");
    tokio::spawn(async move {
        let _ = Server::new_with_acceptor(acceptor).run(app).await;
    });
    addr
}

fn broker_options(addr: SocketAddr) -> BackendOptions {
    BackendOptions {
        check_url: Some(format!("http://{addr}{CHECK_PATH}")),
        cert_url: Some(format!("http://{addr}/pki/ca.crt")),
        ..BackendOptions::default()
    }
}

fn sample_snapshot() -> MetricSnapshot {
    let mut snapshot = MetricSnapshot::default();
    snapshot.counters.insert("foo".to_string(), 5.0);
    snapshot.counter_rates.insert("foo".to_string(), 0.5);
    snapshot.timers.insert("req".to_string(), vec![12.3, 12.9]);
    snapshot
}

fn health_of(backend: &HttptrapBackend) -> HealthState {
    let mut state = HealthState::default();
    backend.each_status(|component, stat, value| {
        assert_eq!(component, "httptrap");
        match stat {
            "last_flush" => state.last_flush = value,
            "last_exception" => state.last_exception = value,
            "flush_time" => state.flush_time = value,
            "flush_length" => state.flush_length = value,
            other => panic!("unexpected stat {other}"),
        }
    });
    state
}

#[test(tokio::test)]
async fn flush_delivers_payload_and_updates_health() {
    let state = Arc::new(BrokerState::default());
    let addr = spawn_broker(state.clone()).await;

    let startup = unix_seconds();
    let backend = HttptrapBackend::init(startup, broker_options(addr))
        .await
        .expect("should init");
    assert!(backend.is_ready());

    backend.flush(&sample_snapshot()).await;

    let payloads = state.payloads.lock().expect("should not be poisoned");
    assert_eq!(payloads.len(), 1);
    let payload = payloads[0].as_object().expect("payload should be an object");
    assert_eq!(payload.get("counters`foo`rate"), Some(&Value::from(0.5)));
    assert_eq!(payload.get("counters`foo`count"), Some(&Value::from(5.0)));
    assert_eq!(
        payload
            .get("timers`req")
            .and_then(|v| v.get("_type"))
            .and_then(Value::as_str),
        Some("n")
    );
    assert_eq!(
        payload.get("statsd`num_stats").and_then(Value::as_u64),
        Some(payload.len() as u64)
    );
    assert!(payload.contains_key("statsd`httptrap`last_flush"));
    drop(payloads);

    let health = health_of(&backend);
    assert!(health.last_flush >= startup);
    assert!(health.flush_length > 0);
    // Seeded exception timestamp is untouched by a clean cycle.
    assert_eq!(health.last_exception, startup);
}

#[test(tokio::test)]
async fn cert_fetch_failure_disables_the_transport_for_good() {
    let state = Arc::new(BrokerState::default());
    let addr = spawn_broker(state.clone()).await;

    let options = BackendOptions {
        cert_url: Some(format!("http://{addr}/not-the-cert")),
        ..broker_options(addr)
    };
    let backend = HttptrapBackend::init(100, options)
        .await
        .expect("should init despite failed bootstrap");
    assert!(!backend.is_ready());

    backend.flush(&sample_snapshot()).await;
    assert!(state
        .payloads
        .lock()
        .expect("should not be poisoned")
        .is_empty());
    assert_eq!(
        health_of(&backend),
        HealthState {
            last_flush: 100,
            last_exception: 100,
            flush_time: 0,
            flush_length: 0,
        }
    );
}

#[test(tokio::test)]
async fn rejected_submission_drops_the_cycle_and_keeps_health() {
    let state = Arc::new(BrokerState::default());
    let addr = spawn_broker(state.clone()).await;

    let backend = HttptrapBackend::init(100, broker_options(addr))
        .await
        .expect("should init");
    assert!(backend.is_ready());

    state.reject.store(true, Ordering::SeqCst);
    backend.flush(&sample_snapshot()).await;
    assert_eq!(health_of(&backend).last_flush, 100);

    // The next cycle proceeds independently.
    state.reject.store(false, Ordering::SeqCst);
    backend.flush(&sample_snapshot()).await;
    assert!(health_of(&backend).last_flush >= unix_seconds() - 5);
}

#[test(tokio::test)]
async fn timed_out_submission_leaves_health_untouched() {
    let state = Arc::new(BrokerState::default());
    let addr = spawn_broker(state.clone()).await;

    let mut config = broker_options(addr).resolve().expect("should resolve");
    config.request_timeout = Duration::from_millis(100);
    let backend = HttptrapBackend::with_config(100, config).await;
    assert!(backend.is_ready());

    *state.delay.lock().expect("should not be poisoned") = Some(Duration::from_millis(500));
    backend.flush(&sample_snapshot()).await;
    assert_eq!(health_of(&backend).last_flush, 100);

    // No residual state from the aborted attempt: the next cycle succeeds.
    *state.delay.lock().expect("should not be poisoned") = None;
    backend.flush(&sample_snapshot()).await;
    let health = health_of(&backend);
    assert!(health.last_flush > 100);
    assert!(health.flush_length > 0);
}
