//! Transport health counters and the status reporting surface.

use std::sync::Arc;
use std::sync::RwLock;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use trap_codec::HealthState;
use trap_codec::BACKEND_NAME;

/// Shared handle to the process-wide [`HealthState`].
///
/// Seeded once at startup and mutated only from submission completions;
/// concurrent flushes (a scheduler misuse) degrade to last-writer-wins.
#[derive(Debug, Clone)]
pub struct BackendHealth {
    inner: Arc<RwLock<HealthState>>,
}

impl BackendHealth {
    /// Seed the counters: both timestamps start at the engine's startup
    /// time, durations and lengths at zero.
    pub fn new(startup_time: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HealthState {
                last_flush: startup_time,
                last_exception: startup_time,
                flush_time: 0,
                flush_length: 0,
            })),
        }
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> HealthState {
        *self.inner.read().expect("should not be poisoned")
    }

    /// Record a successful submission.
    pub(crate) fn record_flush(&self, flush_time_ms: u64, flush_length: u64, now: u64) {
        let mut state = self.inner.write().expect("should not be poisoned");
        state.flush_time = flush_time_ms;
        state.flush_length = flush_length;
        state.last_flush = now;
    }

    /// Record a payload-building failure; everything else is untouched.
    pub(crate) fn record_exception(&self, now: u64) {
        self.inner.write().expect("should not be poisoned").last_exception = now;
    }

    /// Visit every health counter with `(component, stat, value)`.
    /// Read-only; backs the engine's status event.
    pub fn for_each_stat<F>(&self, mut report: F)
    where
        F: FnMut(&str, &str, u64),
    {
        let state = self.snapshot();
        report(BACKEND_NAME, "last_flush", state.last_flush);
        report(BACKEND_NAME, "last_exception", state.last_exception);
        report(BACKEND_NAME, "flush_time", state.flush_time);
        report(BACKEND_NAME, "flush_length", state.flush_length);
    }
}

/// Current wall clock as epoch seconds.
pub fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("should compute duration since UNIX_EPOCH")
        .as_secs()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn seeded_with_startup_time() {
        let health = BackendHealth::new(1234);
        let state = health.snapshot();
        assert_eq!(state.last_flush, 1234);
        assert_eq!(state.last_exception, 1234);
        assert_eq!(state.flush_time, 0);
        assert_eq!(state.flush_length, 0);
    }

    #[test]
    fn record_flush_updates_only_flush_fields() {
        let health = BackendHealth::new(1000);
        health.record_flush(25, 4096, 2000);
        let state = health.snapshot();
        assert_eq!(state.flush_time, 25);
        assert_eq!(state.flush_length, 4096);
        assert_eq!(state.last_flush, 2000);
        assert_eq!(state.last_exception, 1000);
    }

    #[test]
    fn record_exception_updates_only_the_exception_timestamp() {
        let health = BackendHealth::new(1000);
        health.record_exception(3000);
        let state = health.snapshot();
        assert_eq!(state.last_exception, 3000);
        assert_eq!(state.last_flush, 1000);
    }

    #[test]
    fn status_visits_every_counter_once() {
        let health = BackendHealth::new(1000);
        health.record_flush(5, 100, 1500);
        let mut seen = BTreeMap::new();
        health.for_each_stat(|component, stat, value| {
            assert_eq!(component, BACKEND_NAME);
            seen.insert(stat.to_string(), value);
        });
        assert_eq!(seen.len(), 4);
        assert_eq!(seen.get("last_flush"), Some(&1500));
        assert_eq!(seen.get("flush_length"), Some(&100));
    }
}
