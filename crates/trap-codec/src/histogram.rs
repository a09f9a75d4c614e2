//! Log-scale bucket histogram for timer samples.
//!
//! The ingestion endpoint reconstructs distributions from buckets of the
//! form `H[<sign><digit>.<digit>e<exp>]`, one significant digit at one
//! decimal of precision per decade. The bucketing below must match the
//! endpoint's decoder exactly, so the normalization mirrors the reference
//! implementation step for step.

/// Bucket label for a single sample, or `None` for non-finite input.
///
/// The magnitude is scaled into `[10, 100)` while tracking the decade
/// exponent, floored, then shifted down one decade so the label carries a
/// value in `[1.0, 10.0)`. Zero cannot leave the scaling loop and gets its
/// own fixed bucket.
fn bucket_label(sample: f64) -> Option<String> {
    if !sample.is_finite() {
        return None;
    }
    if sample == 0.0 {
        // Covers negative zero as well.
        return Some("H[0]".to_string());
    }

    let sign = if sample < 0.0 { "-" } else { "" };
    let mut v = sample.abs();
    let mut exp: i32 = 0;
    while v < 10.0 {
        v *= 10.0;
        exp -= 1;
    }
    while v >= 100.0 {
        v /= 10.0;
        exp += 1;
    }
    v = v.floor() / 10.0;
    exp += 1;

    Some(format!("H[{sign}{v}e{exp}]"))
}

/// Compress timer samples into `label=count` bucket strings.
///
/// Bucket order follows first occurrence in the input, so output is stable
/// for a given sample sequence; the consumer treats it as an unordered set.
/// Non-finite samples are skipped.
pub fn encode(samples: &[f64]) -> Vec<String> {
    let mut buckets: Vec<(String, u64)> = Vec::new();
    for &sample in samples {
        let Some(label) = bucket_label(sample) else {
            continue;
        };
        match buckets.iter_mut().find(|(existing, _)| *existing == label) {
            Some((_, count)) => *count += 1,
            None => buckets.push((label, 1)),
        }
    }
    buckets
        .into_iter()
        .map(|(label, count)| format!("{label}={count}"))
        .collect()
}
