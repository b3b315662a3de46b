use crate::workload::OsFamily;

use super::frame::StatsFrame;
use super::{cpu, io, memory, net};

/// A normalized snapshot of one workload's resource usage.
///
/// When `is_invalid` is set none of the numeric fields may be displayed, the renderer
/// prints a placeholder instead. A freshly admitted workload starts out invalid until
/// its first frame arrives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSample {
    /// The identifier the workload was admitted with (a name or a short id).
    pub container: String,
    /// The daemon-reported name, with its leading `/`.
    pub name: String,
    /// The full daemon-reported id.
    pub id: String,
    pub cpu_percentage: f64,
    pub memory: u64,
    pub memory_limit: u64,
    pub memory_percentage: f64,
    pub network_rx: u64,
    pub network_tx: u64,
    pub block_read: u64,
    pub block_write: u64,
    pub pids_current: u64,
    pub is_invalid: bool,
}

impl MetricSample {
    /// Creates the invalid sample a workload shows before its first frame.
    pub fn placeholder(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            is_invalid: true,
            ..Self::default()
        }
    }

    /// Computes a sample from a raw frame using the calculation path of `os`.
    pub fn from_frame(container: impl Into<String>, frame: &StatsFrame, os: OsFamily) -> Self {
        let (network_rx, network_tx) = net::network_io(&frame.networks);
        let mut sample = Self {
            container: container.into(),
            name: frame.name.clone(),
            id: frame.id.clone(),
            network_rx,
            network_tx,
            ..Self::default()
        };

        match os {
            OsFamily::Linux => {
                let used = memory::mem_usage_unix_no_cache(&frame.memory_stats);
                let limit = frame.memory_stats.limit;
                (sample.block_read, sample.block_write) = io::block_io(&frame.blkio_stats);
                sample.cpu_percentage = cpu::cpu_percent_unix(&frame.cpu_stats, &frame.precpu_stats);
                sample.memory = used;
                sample.memory_limit = limit;
                sample.memory_percentage = memory::mem_percent_unix(used, limit);
                sample.pids_current = frame.pids_stats.current;
            }
            OsFamily::Windows => {
                (sample.block_read, sample.block_write) =
                    io::block_io_windows(&frame.storage_stats);
                sample.cpu_percentage = cpu::cpu_percent_windows(frame);
                sample.memory = memory::mem_usage_windows(&frame.memory_stats);
            }
        }

        sample
    }

    /// Marks the numeric fields as untrustworthy, keeping the identity fields.
    pub fn invalidate(&mut self) {
        self.is_invalid = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_frame() -> StatsFrame {
        serde_json::from_str(
            r#"{
                "id": "b95a83497c9161c9b444e3d70e1a9dfba0c1840d41720e146a95a08ebf938afc",
                "name": "/web",
                "pids_stats": {"current": 7},
                "blkio_stats": {"io_service_bytes_recursive": [
                    {"op": "read", "value": 4096}, {"op": "write", "value": 512}
                ]},
                "cpu_stats": {"cpu_usage": {"total_usage": 200}, "system_cpu_usage": 1000, "online_cpus": 1},
                "memory_stats": {"usage": 2048, "limit": 4096, "stats": {"inactive_file": 1024}},
                "networks": {"eth0": {"rx_bytes": 10, "tx_bytes": 20}},
                "storage_stats": {"read_size_bytes": 1, "write_size_bytes": 1}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_linux_sample() {
        let sample = MetricSample::from_frame("web", &linux_frame(), OsFamily::Linux);
        assert_eq!(sample.container, "web");
        assert_eq!(sample.name, "/web");
        assert_eq!(sample.cpu_percentage, 20.0);
        assert_eq!(sample.memory, 1024);
        assert_eq!(sample.memory_limit, 4096);
        assert_eq!(sample.memory_percentage, 25.0);
        assert_eq!((sample.network_rx, sample.network_tx), (10, 20));
        assert_eq!((sample.block_read, sample.block_write), (4096, 512));
        assert_eq!(sample.pids_current, 7);
        assert!(!sample.is_invalid);
    }

    #[test]
    fn test_windows_sample() {
        let mut frame = linux_frame();
        frame.memory_stats.private_working_set = 8192;
        let sample = MetricSample::from_frame("web", &frame, OsFamily::Windows);
        assert_eq!(sample.memory, 8192);
        assert_eq!(sample.memory_limit, 0);
        assert_eq!(sample.memory_percentage, 0.0);
        assert_eq!((sample.block_read, sample.block_write), (1, 1));
        assert_eq!(sample.pids_current, 0);
        assert_eq!((sample.network_rx, sample.network_tx), (10, 20));
    }

    #[test]
    fn test_placeholder_is_invalid() {
        let sample = MetricSample::placeholder("web");
        assert!(sample.is_invalid);
        assert_eq!(sample.container, "web");
    }
}
