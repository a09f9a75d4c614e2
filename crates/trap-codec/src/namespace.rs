//! Composite key construction.
//!
//! Every metric key is an ordered list of path segments (global prefix,
//! per-class prefix, metric name, sub-fields) joined by a fixed delimiter.

/// Separator joining path segments into one composite key.
pub const DELIMITER: char = '`';

/// An ordered list of namespace segments for one metric class.
///
/// Built once at startup; empty prefixes are omitted rather than producing
/// empty segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    segments: Vec<String>,
}

impl Namespace {
    /// Build a namespace from prefix candidates, skipping empty ones.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Join the namespace segments and the given leaf parts into one key.
    pub fn key<S: AsRef<str>>(&self, leaf: &[S]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            if !out.is_empty() {
                out.push(DELIMITER);
            }
            out.push_str(segment);
        }
        for part in leaf {
            if !out.is_empty() {
                out.push(DELIMITER);
            }
            out.push_str(part.as_ref());
        }
        out
    }
}

/// Per-class namespaces, derived once from the configured prefixes.
#[derive(Debug, Clone, Default)]
pub struct Namespaces {
    pub counters: Namespace,
    pub timers: Namespace,
    pub gauges: Namespace,
    pub sets: Namespace,
    pub internal: Namespace,
}

impl Namespaces {
    pub fn new(
        global: &str,
        counters: &str,
        timers: &str,
        gauges: &str,
        sets: &str,
        internal: &str,
    ) -> Self {
        Self {
            counters: Namespace::new([global, counters]),
            timers: Namespace::new([global, timers]),
            gauges: Namespace::new([global, gauges]),
            sets: Namespace::new([global, sets]),
            internal: Namespace::new([global, internal]),
        }
    }
}

/// Locally sanitize a raw metric name when the engine has not already done
/// so: whitespace runs become `_`, `/` becomes `-`, and anything outside
/// `[A-Za-z0-9_.-]` plus the delimiter is stripped.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;
        if c == '/' {
            out.push('-');
        } else if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | DELIMITER) {
            out.push(c);
        }
    }
    out
}
