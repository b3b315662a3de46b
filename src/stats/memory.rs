//! Memory usage derived from a stats frame.
//!
//! On Linux the reported usage includes the page cache. The cache is excluded by
//! subtracting the inactive file-backed memory, which is what other runtimes and
//! cAdvisor report as the working set:
//!
//! - cgroup v1: `usage - stats["total_inactive_file"]`
//! - cgroup v2: `usage - stats["inactive_file"]`
//!
//! The subtraction only happens if the subtrahend is strictly less than the usage, so an
//! inconsistent kernel snapshot never underflows.
//!
//! Windows reports the private working set directly and has no usable limit.

use super::frame::MemoryStats;

const CGROUP1_INACTIVE_FILE: &str = "total_inactive_file";
const CGROUP2_INACTIVE_FILE: &str = "inactive_file";

/// Returns the memory used by a Linux container without the page cache.
///
/// # Examples
///
/// ```
/// # use creo_stats::stats::{mem_usage_unix_no_cache, MemoryStats};
/// let mut mem = MemoryStats::default();
/// mem.usage = 4096;
/// mem.stats.insert("inactive_file".to_owned(), 1024);
/// assert_eq!(mem_usage_unix_no_cache(&mem), 3072);
/// ```
pub fn mem_usage_unix_no_cache(mem: &MemoryStats) -> u64 {
    [CGROUP1_INACTIVE_FILE, CGROUP2_INACTIVE_FILE]
        .iter()
        .filter_map(|key| mem.stats.get(*key).copied())
        .find(|&inactive| inactive < mem.usage)
        .map_or(mem.usage, |inactive| mem.usage - inactive)
}

/// Returns `used / limit` as a percentage, or `0.0` if there is no limit yet.
///
/// The limit is only ever zero when the container is not running and the daemon has no
/// cgroup data for it.
pub fn mem_percent_unix(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    used as f64 / limit as f64 * 100.0
}

/// Returns the private working set of a Windows container.
pub fn mem_usage_windows(mem: &MemoryStats) -> u64 {
    mem.private_working_set
}
