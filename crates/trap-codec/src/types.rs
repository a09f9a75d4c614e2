//! Data shapes crossing the codec boundary: the per-cycle snapshot coming
//! in from the stats engine, and the flat key/value payload going out.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::ser::SerializeMap;
use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;

/// Aggregated metrics handed over by the stats engine for one flush cycle.
///
/// Counters arrive with their precomputed per-second rates in
/// `counter_rates`; only the cardinality of each set is consumed; `internal`
/// holds engine self-counters that are forwarded verbatim.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricSnapshot {
    pub counters: BTreeMap<String, f64>,
    pub counter_rates: BTreeMap<String, f64>,
    pub gauges: BTreeMap<String, f64>,
    pub timers: BTreeMap<String, Vec<f64>>,
    pub sets: BTreeMap<String, BTreeSet<String>>,
    pub timer_data: BTreeMap<String, BTreeMap<String, DerivedValue>>,
    pub internal: BTreeMap<String, f64>,
}

/// A derivative statistic for a timer: either a plain scalar (mean, upper,
/// lower, ...) or one level of named scalars (percentile sub-aggregates).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DerivedValue {
    Scalar(f64),
    Nested(BTreeMap<String, f64>),
}

/// One value in the flattened payload.
///
/// Timer payloads carry the endpoint's tagged wire form: raw samples
/// serialize as `{"_type":"i","_value":[...]}` and histogram buckets as
/// `{"_type":"n","_value":[...]}`.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatValue {
    Value(f64),
    Count(u64),
    Text(String),
    RawTimer(Vec<f64>),
    Histogram(Vec<String>),
    Memory(MemoryUsage),
}

impl Serialize for FlatValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FlatValue::Value(v) => serializer.serialize_f64(*v),
            FlatValue::Count(n) => serializer.serialize_u64(*n),
            FlatValue::Text(t) => serializer.serialize_str(t),
            FlatValue::RawTimer(samples) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("_type", "i")?;
                map.serialize_entry("_value", samples)?;
                map.end()
            }
            FlatValue::Histogram(buckets) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("_type", "n")?;
                map.serialize_entry("_value", buckets)?;
                map.end()
            }
            FlatValue::Memory(usage) => usage.serialize(serializer),
        }
    }
}

/// The flattened payload for one cycle: composite key to value.
///
/// A `BTreeMap` keeps iteration deterministic and makes key collisions
/// (e.g. two names sanitizing to the same key) resolve last-write-wins.
pub type FlatStats = BTreeMap<String, FlatValue>;

/// Transport health counters, mutated only after a cycle attempt and never
/// reset for the process lifetime. Timestamps are epoch seconds; `flush_time`
/// is the last submission duration in milliseconds; `flush_length` the last
/// payload byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthState {
    pub last_flush: u64,
    pub last_exception: u64,
    pub flush_time: u64,
    pub flush_length: u64,
}

/// Process memory usage reported under the internal namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    pub rss_bytes: u64,
    pub vm_bytes: u64,
    pub shared_bytes: u64,
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn raw_timer_serializes_as_tagged_value() {
        let value = FlatValue::RawTimer(vec![1.0, 2.5]);
        let json = serde_json::to_string(&value).expect("should serialize");
        assert_eq!(json, r#"{"_type":"i","_value":[1.0,2.5]}"#);
    }

    #[test]
    fn histogram_serializes_as_tagged_value() {
        let value = FlatValue::Histogram(vec!["H[1.2e1]=3".to_string()]);
        let json = serde_json::to_string(&value).expect("should serialize");
        assert_eq!(json, r#"{"_type":"n","_value":["H[1.2e1]=3"]}"#);
    }

    #[test]
    fn scalar_values_serialize_bare() {
        assert_eq!(
            serde_json::to_string(&FlatValue::Value(0.5)).expect("should serialize"),
            "0.5"
        );
        assert_eq!(
            serde_json::to_string(&FlatValue::Count(7)).expect("should serialize"),
            "7"
        );
    }

    #[test]
    fn derived_value_deserializes_both_shapes() {
        let scalar: DerivedValue = serde_json::from_str("12.5").expect("should deserialize");
        assert_eq!(scalar, DerivedValue::Scalar(12.5));

        let nested: DerivedValue =
            serde_json::from_str(r#"{"mean":4.0,"upper":9.0}"#).expect("should deserialize");
        match nested {
            DerivedValue::Nested(fields) => {
                assert_eq!(fields.get("mean"), Some(&4.0));
                assert_eq!(fields.get("upper"), Some(&9.0));
            }
            DerivedValue::Scalar(_) => panic!("expected nested variant"),
        }
    }

    #[test]
    fn snapshot_deserializes_with_missing_sections() {
        let snapshot: MetricSnapshot =
            serde_json::from_str(r#"{"counters":{"hits":5.0}}"#).expect("should deserialize");
        assert_eq!(snapshot.counters.get("hits"), Some(&5.0));
        assert!(snapshot.timers.is_empty());
    }
}
