//! Wire model of one frame of the daemon's per-container stats stream.
//!
//! Every field defaults, since the daemon omits (or sends `null` for) whole sections
//! depending on platform, cgroup version and whether the container is running.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatsFrame {
    pub id: String,
    pub name: String,
    /// Time at which this frame was sampled.
    pub read: Option<DateTime<Utc>>,
    /// Time at which the previous frame (`precpu_stats`) was sampled.
    pub preread: Option<DateTime<Utc>>,
    pub cpu_stats: CpuStats,
    pub precpu_stats: CpuStats,
    pub memory_stats: MemoryStats,
    pub blkio_stats: BlkioStats,
    pub pids_stats: PidsStats,
    #[serde(deserialize_with = "null_as_default")]
    pub networks: HashMap<String, NetworkStats>,
    /// Number of processors (Windows only).
    pub num_procs: u32,
    /// Storage counters (Windows only).
    pub storage_stats: StorageStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CpuStats {
    pub cpu_usage: CpuUsage,
    /// Cumulative system CPU time in nanoseconds (Linux only).
    pub system_cpu_usage: u64,
    /// Number of online CPUs (Linux only). Zero when the daemon did not report it.
    pub online_cpus: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CpuUsage {
    /// Cumulative CPU time consumed, in nanoseconds on Linux and in 100ns
    /// intervals on Windows.
    pub total_usage: u64,
    /// Per-core CPU time (cgroup v1 only).
    #[serde(deserialize_with = "null_as_default")]
    pub percpu_usage: Vec<u64>,
    pub usage_in_kernelmode: u64,
    pub usage_in_usermode: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemoryStats {
    pub usage: u64,
    pub max_usage: u64,
    pub limit: u64,
    /// Raw `memory.stat` breakdown, keys differ between cgroup v1 and v2.
    #[serde(deserialize_with = "null_as_default")]
    pub stats: HashMap<String, u64>,
    /// Private working set in bytes (Windows only).
    #[serde(rename = "privateworkingset")]
    pub private_working_set: u64,
    #[serde(rename = "commitbytes")]
    pub commit_bytes: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlkioStats {
    #[serde(deserialize_with = "null_as_default")]
    pub io_service_bytes_recursive: Vec<BlkioStatEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlkioStatEntry {
    pub major: u64,
    pub minor: u64,
    pub op: String,
    pub value: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PidsStats {
    pub current: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkStats {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errors: u64,
    pub rx_dropped: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
    pub tx_dropped: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageStats {
    pub read_count_normalized: u64,
    pub read_size_bytes: u64,
    pub write_count_normalized: u64,
    pub write_size_bytes: u64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
