//! Per-workload collectors and the registry they publish into.
//!
//! [`Monitor`] admits workloads, spawns one collector task per workload and hands out
//! snapshots for rendering. Collector faults stay local to their workload: they are
//! recorded as a sticky [`CollectorError`] and the workload renders as unknown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::runtime::{self, RuntimeClient};
use crate::stats::MetricSample;
use crate::workload::{OsFamily, WorkloadID};

mod barrier;
mod collector;
mod registry;
mod state;

pub use barrier::{FirstSample, StartupBarrier};
pub use registry::Registry;
pub use state::CollectorState;

use collector::Collector;

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("{id}: {source}")]
    Runtime {
        id: WorkloadID,
        #[source]
        source: runtime::Error,
    },
    #[error("{0}: timeout waiting for stats")]
    Timeout(WorkloadID),
}

/// Owns the registry and the collectors of one stats session.
#[derive(Debug)]
pub struct Monitor<C> {
    client: Arc<C>,
    registry: Registry,
    barrier: StartupBarrier,
    os: OsFamily,
    stream: bool,
    cancel: CancellationToken,
    admitted: AtomicBool,
}

impl<C> Monitor<C>
where
    C: RuntimeClient,
{
    /// Creates an empty monitor. Every collector stops when `cancel` fires.
    pub fn new(client: Arc<C>, os: OsFamily, stream: bool, cancel: CancellationToken) -> Self {
        Self {
            client,
            registry: Registry::default(),
            barrier: StartupBarrier::default(),
            os,
            stream,
            cancel,
            admitted: AtomicBool::new(false),
        }
    }

    /// Starts monitoring `id` unless it is monitored already. Returns whether a
    /// collector was spawned.
    pub fn admit(&self, id: WorkloadID) -> bool {
        let state = Arc::new(CollectorState::new(id, self.cancel.child_token()));
        // Counted before it becomes visible, so a concurrent `wait_first` includes it.
        let first = self.barrier.register();
        if !self.registry.add(Arc::clone(&state)) {
            return false;
        }

        self.admitted.store(true, Ordering::Release);
        log::debug!(target: "monitor", "admitted {}", state.id());
        let collector = Collector {
            client: Arc::clone(&self.client),
            state,
            os: self.os,
            stream: self.stream,
        };
        tokio::spawn(collector.run(first));
        true
    }

    /// Stops monitoring `id`.
    pub fn remove(&self, id: &WorkloadID) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            log::debug!(target: "monitor", "removed {id}");
        }
        removed
    }

    pub fn snapshot(&self) -> Vec<MetricSample> {
        self.registry.snapshot()
    }

    /// Waits until every admitted workload has produced a first sample or failed.
    pub async fn wait_first(&self) {
        self.barrier.wait().await;
    }

    pub fn errors(&self) -> Vec<Arc<CollectorError>> {
        self.registry.errors()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Whether any workload was ever admitted.
    pub fn has_admitted(&self) -> bool {
        self.admitted.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::testutil::{FakeRuntime, frame_json};

    fn id(s: &str) -> WorkloadID {
        WorkloadID::new(s).unwrap()
    }

    fn monitor(client: FakeRuntime, stream: bool) -> Monitor<FakeRuntime> {
        Monitor::new(
            Arc::new(client),
            OsFamily::Linux,
            stream,
            CancellationToken::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_frame_is_published() {
        let client = FakeRuntime::default();
        client.stream_data("web", frame_json("/web", 20));
        let monitor = monitor(client, false);

        assert!(monitor.admit(id("web")));
        assert!(!monitor.admit(id("web")));
        monitor.wait_first().await;

        let samples = monitor.snapshot();
        assert_eq!(samples.len(), 1);
        assert!(!samples[0].is_invalid);
        assert_eq!(samples[0].container, "web");
        assert_eq!(samples[0].name, "/web");
        assert_eq!(samples[0].cpu_percentage, 20.0);
        assert!(monitor.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_stream_times_out_with_placeholder() {
        let client = FakeRuntime::default();
        client.stream_hang("stuck");
        let monitor = monitor(client, true);

        monitor.admit(id("stuck"));
        monitor.wait_first().await;

        let samples = monitor.snapshot();
        assert!(samples[0].is_invalid);
        let errors = monitor.errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(*errors[0], CollectorError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_is_sticky() {
        let client = FakeRuntime::default();
        client.stream_error("gone", 404, "No such container: gone");
        let monitor = monitor(client, true);

        monitor.admit(id("gone"));
        monitor.wait_first().await;

        assert!(monitor.snapshot()[0].is_invalid);
        assert_eq!(
            monitor.errors()[0].to_string(),
            "gone: error response from daemon: No such container: gone"
        );
        // Errors do not remove a workload.
        assert_eq!(monitor.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_stream_is_invalidated_and_recovers() {
        let client = FakeRuntime::default();
        let mut writer = client.stream_live("web");
        let monitor = monitor(client, true);

        monitor.admit(id("web"));
        writer.write_all(frame_json("/web", 10).as_bytes()).await.unwrap();
        monitor.wait_first().await;
        assert!(!monitor.snapshot()[0].is_invalid);

        tokio::time::sleep(LIVENESS + Duration::from_millis(100)).await;
        assert!(monitor.snapshot()[0].is_invalid);

        writer.write_all(frame_json("/web", 30).as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let sample = &monitor.snapshot()[0];
        assert!(!sample.is_invalid);
        assert_eq!(sample.cpu_percentage, 30.0);
        // A stall after the first sample is not an error.
        assert!(monitor.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_keeps_stream() {
        let client = FakeRuntime::default();
        let mut writer = client.stream_live("web");
        let monitor = monitor(client, true);

        monitor.admit(id("web"));
        writer.write_all(b"{\"cpu_stats\": nope}\n").await.unwrap();
        writer.write_all(frame_json("/web", 40).as_bytes()).await.unwrap();
        monitor.wait_first().await;

        let sample = &monitor.snapshot()[0];
        assert!(!sample.is_invalid);
        assert_eq!(sample.cpu_percentage, 40.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cut_off_stream_records_error() {
        let client = FakeRuntime::default();
        client.stream_data("web", "{\"name\": \"/web\", \"cpu_".to_owned());
        let monitor = monitor(client, true);

        monitor.admit(id("web"));
        monitor.wait_first().await;

        assert!(monitor.snapshot()[0].is_invalid);
        assert_eq!(monitor.errors().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_stops_collector() {
        let client = FakeRuntime::default();
        let _writer = client.stream_live("web");
        let monitor = monitor(client, true);

        monitor.admit(id("web"));
        assert!(monitor.remove(&id("web")));
        assert!(monitor.is_empty());
        // The removed collector fires its startup signal when it stops.
        monitor.wait_first().await;
        assert!(!monitor.remove(&id("web")));
    }

    const LIVENESS: Duration = collector::LIVENESS_TIMEOUT;
}
