//! Per-cycle flattening: snapshot in, flat namespaced key/value payload out.

use std::time::Instant;

use crate::histogram;
use crate::namespace::sanitize_name;
use crate::namespace::Namespaces;
use crate::namespace::DELIMITER;
use crate::types::DerivedValue;
use crate::types::FlatStats;
use crate::types::FlatValue;
use crate::types::HealthState;
use crate::types::MemoryUsage;
use crate::types::MetricSnapshot;
use crate::BACKEND_NAME;

/// Behavioral switches for one flattening pass, resolved from the backend
/// configuration at startup.
#[derive(Debug, Clone, Copy)]
pub struct FlattenOptions {
    /// Also emit raw counter totals alongside per-second rates.
    pub flush_counts: bool,
    /// Emit the engine's derivative statistics for timers.
    pub send_timer_derivatives: bool,
    /// Emit raw timer sample arrays instead of bucket histograms.
    pub send_raw_timers: bool,
    /// Sanitize metric names locally (the engine did not already).
    pub sanitize_keys: bool,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            flush_counts: true,
            send_timer_derivatives: true,
            send_raw_timers: false,
            sanitize_keys: true,
        }
    }
}

/// Flatten one cycle's snapshot into the submission payload.
///
/// `health` carries the transport counters from before this cycle; `memory`
/// is the optional process memory sample. This never fails: malformed
/// pieces of the snapshot are skipped so a partial report still goes out.
pub fn flatten(
    snapshot: &MetricSnapshot,
    options: &FlattenOptions,
    namespaces: &Namespaces,
    health: &HealthState,
    memory: Option<MemoryUsage>,
) -> FlatStats {
    let start = Instant::now();
    let mut stats = FlatStats::new();

    let clean = |name: &str| {
        if options.sanitize_keys {
            sanitize_name(name)
        } else {
            name.to_string()
        }
    };

    for (name, &total) in &snapshot.counters {
        // Rates are keyed by the raw name; only the emitted key is cleaned.
        let clean_name = clean(name);
        match snapshot.counter_rates.get(name) {
            Some(&rate) => {
                stats.insert(
                    namespaces.counters.key(&[clean_name.as_str(), "rate"]),
                    FlatValue::Value(rate),
                );
            }
            None => tracing::debug!(counter = %name, "no precomputed rate, skipping rate field"),
        }
        if options.flush_counts {
            stats.insert(
                namespaces.counters.key(&[clean_name.as_str(), "count"]),
                FlatValue::Value(total),
            );
        }
    }

    for (name, samples) in &snapshot.timers {
        if samples.is_empty() {
            continue;
        }
        let key = namespaces.timers.key(&[clean(name).as_str()]);
        let value = if options.send_raw_timers {
            FlatValue::RawTimer(samples.clone())
        } else {
            FlatValue::Histogram(histogram::encode(samples))
        };
        stats.insert(key, value);
    }

    if options.send_timer_derivatives {
        for (name, fields) in &snapshot.timer_data {
            let timer_key = namespaces.timers.key(&[clean(name).as_str()]);
            for (field, value) in fields {
                match value {
                    DerivedValue::Scalar(v) => {
                        stats.insert(
                            format!("{timer_key}{DELIMITER}{field}"),
                            FlatValue::Value(*v),
                        );
                    }
                    DerivedValue::Nested(sub_fields) => {
                        for (sub_field, v) in sub_fields {
                            stats.insert(
                                format!("{timer_key}{DELIMITER}{field}{DELIMITER}{sub_field}"),
                                FlatValue::Value(*v),
                            );
                        }
                    }
                }
            }
        }
    }

    for (name, &value) in &snapshot.gauges {
        stats.insert(
            namespaces.gauges.key(&[clean(name).as_str()]),
            FlatValue::Value(value),
        );
    }

    for (name, members) in &snapshot.sets {
        stats.insert(
            namespaces.sets.key(&[clean(name).as_str(), "count"]),
            FlatValue::Count(members.len() as u64),
        );
    }

    // Self-observability: transport health from before this cycle, the cost
    // of this pass, engine internals forwarded verbatim, memory when enabled.
    let internal = &namespaces.internal;
    stats.insert(
        internal.key(&[BACKEND_NAME, "last_exception"]),
        FlatValue::Count(health.last_exception),
    );
    stats.insert(
        internal.key(&[BACKEND_NAME, "last_flush"]),
        FlatValue::Count(health.last_flush),
    );
    stats.insert(
        internal.key(&[BACKEND_NAME, "flush_time"]),
        FlatValue::Count(health.flush_time),
    );
    stats.insert(
        internal.key(&[BACKEND_NAME, "flush_length"]),
        FlatValue::Count(health.flush_length),
    );

    for (name, &value) in &snapshot.internal {
        stats.insert(internal.key(&[name.as_str()]), FlatValue::Value(value));
    }

    if let Some(usage) = memory {
        stats.insert(internal.key(&["memory"]), FlatValue::Memory(usage));
    }

    stats.insert(
        internal.key(&[BACKEND_NAME, "calculation_time"]),
        FlatValue::Count(start.elapsed().as_millis() as u64),
    );

    // Counts itself: size before insertion plus one.
    let num_stats = stats.len() as u64 + 1;
    stats.insert(internal.key(&["num_stats"]), FlatValue::Count(num_stats));

    stats
}
