//! A scripted [`RuntimeClient`] for collector, watcher and engine tests.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use crate::runtime::{
    Error, EventStream, Filters, LifecycleEvent, ListOptions, MetricsStream, Result,
    RuntimeClient, WorkloadSummary,
};
use crate::workload::{OsFamily, WorkloadID};

const DUPLEX_CAPACITY: usize = 64 * 1024;

enum FakeStream {
    Reader(DuplexStream),
    Fail { status: u16, message: String },
}

/// Fake runtime whose listing, events and per-workload streams are set up by the test.
///
/// Opening a stream that was not scripted fails like the daemon does for an unknown
/// container.
#[derive(Default)]
pub struct FakeRuntime {
    os: OsFamily,
    listing: Mutex<Vec<String>>,
    listing_error: Mutex<Option<Error>>,
    events: Mutex<Option<EventStream>>,
    streams: Mutex<HashMap<String, FakeStream>>,
    held: Mutex<Vec<DuplexStream>>,
    opened: Mutex<Vec<(String, bool)>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeRuntime {
    pub fn with_os(os: OsFamily) -> Self {
        Self {
            os,
            ..Self::default()
        }
    }

    pub fn listing(&self, ids: &[&str]) {
        *self.listing.lock().unwrap() = ids.iter().map(|id| (*id).to_owned()).collect();
    }

    /// Makes the next listing fail with a daemon error.
    pub fn listing_error(&self, status: u16, message: &str) {
        *self.listing_error.lock().unwrap() = Some(Error::Api {
            status,
            message: message.to_owned(),
        });
    }

    /// Scripts the event subscription; the returned sender feeds it.
    pub fn events(&self) -> mpsc::Sender<Result<LifecycleEvent>> {
        let (tx, rx) = mpsc::channel(16);
        *self.events.lock().unwrap() = Some(rx);
        tx
    }

    /// A stream that yields `data` and then ends.
    pub fn stream_data(&self, id: &str, data: String) {
        let (reader, writer) = tokio::io::duplex(DUPLEX_CAPACITY.max(data.len()));
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let mut writer = writer;
            let _ = writer.write_all(data.as_bytes()).await;
        });
        self.insert(id, FakeStream::Reader(reader));
    }

    /// A stream that stays open without ever sending anything.
    pub fn stream_hang(&self, id: &str) {
        let (reader, writer) = tokio::io::duplex(DUPLEX_CAPACITY);
        self.held.lock().unwrap().push(writer);
        self.insert(id, FakeStream::Reader(reader));
    }

    /// A stream the test writes to.
    pub fn stream_live(&self, id: &str) -> DuplexStream {
        let (reader, writer) = tokio::io::duplex(DUPLEX_CAPACITY);
        self.insert(id, FakeStream::Reader(reader));
        writer
    }

    /// Opening the stream fails with a daemon error.
    pub fn stream_error(&self, id: &str, status: u16, message: &str) {
        self.insert(
            id,
            FakeStream::Fail {
                status,
                message: message.to_owned(),
            },
        );
    }

    /// The `(id, stream)` arguments of every `open_metrics_stream` call so far.
    pub fn opened(&self) -> Vec<(String, bool)> {
        self.opened.lock().unwrap().clone()
    }

    /// The names of the listing and subscription calls, in call order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn insert(&self, id: &str, stream: FakeStream) {
        self.streams.lock().unwrap().insert(id.to_owned(), stream);
    }
}

impl RuntimeClient for FakeRuntime {
    async fn server_os(&self) -> Result<OsFamily> {
        Ok(self.os)
    }

    async fn list_workloads(&self, _options: &ListOptions) -> Result<Vec<WorkloadSummary>> {
        self.calls.lock().unwrap().push("list");
        if let Some(err) = self.listing_error.lock().unwrap().take() {
            return Err(err);
        }
        self.listing
            .lock()
            .unwrap()
            .iter()
            .map(|id| {
                Ok(WorkloadSummary {
                    id: WorkloadID::new(id)?,
                })
            })
            .collect()
    }

    async fn subscribe_events(&self, _filters: &Filters) -> Result<EventStream> {
        self.calls.lock().unwrap().push("subscribe");
        self.events.lock().unwrap().take().ok_or(Error::Api {
            status: 500,
            message: "events are not scripted".to_owned(),
        })
    }

    async fn open_metrics_stream(&self, id: &WorkloadID, stream: bool) -> Result<MetricsStream> {
        self.opened
            .lock()
            .unwrap()
            .push((id.as_str().to_owned(), stream));
        match self.streams.lock().unwrap().remove(id.as_str()) {
            Some(FakeStream::Reader(reader)) => Ok(MetricsStream {
                os: Some(self.os),
                body: Box::pin(reader),
            }),
            Some(FakeStream::Fail { status, message }) => Err(Error::Api { status, message }),
            None => Err(Error::Api {
                status: 404,
                message: format!("No such container: {id}"),
            }),
        }
    }
}

/// A Linux stats frame whose CPU usage computes to `cpu_percent`.
pub fn frame_json(name: &str, cpu_percent: u64) -> String {
    let frame = serde_json::json!({
        "id": format!("{}0123456789abcdef", name.trim_start_matches('/')),
        "name": name,
        "read": "2024-05-01T10:00:01Z",
        "preread": "2024-05-01T10:00:00Z",
        "cpu_stats": {
            "cpu_usage": { "total_usage": 1000 + cpu_percent },
            "system_cpu_usage": 10_100,
            "online_cpus": 1
        },
        "precpu_stats": {
            "cpu_usage": { "total_usage": 1000 },
            "system_cpu_usage": 10_000,
            "online_cpus": 1
        },
        "memory_stats": {
            "usage": 2048,
            "limit": 8192,
            "stats": { "inactive_file": 1024 }
        },
        "pids_stats": { "current": 3 },
        "networks": {
            "eth0": { "rx_bytes": 1000, "tx_bytes": 2000 }
        }
    });
    format!("{frame}\n")
}
