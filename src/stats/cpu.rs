//! CPU utilisation derived from the cumulative counters of a stats frame.
//!
//! Every frame carries both the current counters (`cpu_stats`) and the counters of the
//! previous sample (`precpu_stats`), so the percentage is computed from a single frame
//! without remembering anything between frames.
//!
//! # Platforms
//!
//! - **Linux**: the container's CPU time delta relative to the host's CPU time delta,
//!   scaled by the number of online CPUs.
//! - **Windows**: consumed 100ns intervals relative to the number of intervals that
//!   were available to all processors between the two sample timestamps.
//!
//! Both functions return `0.0` for degenerate input instead of failing.

use super::frame::{CpuStats, StatsFrame};

/// Computes the CPU percentage of a Linux container.
///
/// `online_cpus` falls back to the number of per-CPU entries when the daemon does not
/// report it. If either delta is not positive the result is `0.0`. The result is
/// capped at `online_cpus × 100`.
///
/// # Examples
///
/// ```
/// # use creo_stats::stats::{cpu_percent_unix, StatsFrame};
/// let mut frame = StatsFrame::default();
/// frame.cpu_stats.cpu_usage.total_usage = 200;
/// frame.cpu_stats.system_cpu_usage = 1000;
/// frame.cpu_stats.online_cpus = 1;
/// assert_eq!(cpu_percent_unix(&frame.cpu_stats, &frame.precpu_stats), 20.0);
/// ```
pub fn cpu_percent_unix(current: &CpuStats, previous: &CpuStats) -> f64 {
    let cpu_delta = current.cpu_usage.total_usage as f64 - previous.cpu_usage.total_usage as f64;
    let system_delta = current.system_cpu_usage as f64 - previous.system_cpu_usage as f64;
    let online_cpus = match current.online_cpus {
        0 => current.cpu_usage.percpu_usage.len() as f64,
        n => f64::from(n),
    };

    if cpu_delta > 0.0 && system_delta > 0.0 {
        ((cpu_delta / system_delta) * online_cpus * 100.0).min(online_cpus * 100.0)
    } else {
        0.0
    }
}

/// Computes the CPU percentage of a Windows container.
pub fn cpu_percent_windows(frame: &StatsFrame) -> f64 {
    let elapsed_nanos = match (frame.read, frame.preread) {
        (Some(read), Some(preread)) => (read - preread)
            .num_nanoseconds()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0),
        _ => 0,
    };
    // 100ns intervals available to all processors in the sampling window
    let possible_intervals = (elapsed_nanos / 100).saturating_mul(u64::from(frame.num_procs));
    let used_intervals = frame
        .cpu_stats
        .cpu_usage
        .total_usage
        .saturating_sub(frame.precpu_stats.cpu_usage.total_usage);

    if possible_intervals > 0 {
        used_intervals as f64 / possible_intervals as f64 * 100.0
    } else {
        0.0
    }
}
