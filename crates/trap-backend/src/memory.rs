//! Process memory sampling for the internal `memory` metric.

use trap_codec::MemoryUsage;

/// Current process memory usage, or `None` when unavailable; the metric is
/// then simply omitted from the cycle.
pub fn sample() -> Option<MemoryUsage> {
    sample_impl()
}

#[cfg(target_os = "linux")]
fn sample_impl() -> Option<MemoryUsage> {
    // /proc/self/statm: size resident shared ... in pages.
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let mut fields = statm.split_whitespace();
    let vm_pages: u64 = fields.next()?.parse().ok()?;
    let rss_pages: u64 = fields.next()?.parse().ok()?;
    let shared_pages: u64 = fields.next()?.parse().ok()?;

    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        return None;
    }
    let page_size = page_size as u64;

    Some(MemoryUsage {
        rss_bytes: rss_pages * page_size,
        vm_bytes: vm_pages * page_size,
        shared_bytes: shared_pages * page_size,
    })
}

#[cfg(not(target_os = "linux"))]
fn sample_impl() -> Option<MemoryUsage> {
    None
}
