//! The container runtime capability consumed by the stats engine.
//!
//! The engine needs exactly four things from a runtime: the platform family of the
//! daemon, a listing of existing workloads, a subscription to lifecycle events and a
//! per-workload stream of raw stats frames. [`RuntimeClient`] captures these;
//! [`docker::DockerClient`] implements them against the Docker Engine API.

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use tokio::io::AsyncRead;

use crate::workload::{OsFamily, WorkloadID};

mod connector;
pub mod docker;
mod error;

pub use error::{Error, Result};

/// A workload returned by [`RuntimeClient::list_workloads`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSummary {
    pub id: WorkloadID,
}

/// The lifecycle transitions the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Start,
    Die,
    Other,
}

impl From<&str> for Action {
    fn from(action: &str) -> Self {
        match action {
            "create" => Action::Create,
            "start" => Action::Start,
            "die" => Action::Die,
            _ => Action::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub action: Action,
    pub workload_id: WorkloadID,
}

/// Receiving side of a lifecycle event subscription.
///
/// An `Err` item is terminal; the sender closes the channel right after it.
pub type EventStream = tokio::sync::mpsc::Receiver<Result<LifecycleEvent>>;

/// An open stats stream for one workload.
pub struct MetricsStream {
    /// The platform family the daemon tagged the response with, if any.
    pub os: Option<OsFamily>,
    /// Consecutive JSON stats frames.
    pub body: Pin<Box<dyn AsyncRead + Send>>,
}

impl fmt::Debug for MetricsStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsStream")
            .field("os", &self.os)
            .finish_non_exhaustive()
    }
}

/// `key=value` filters forwarded to listings and event subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(Vec<(String, String)>);

impl Filters {
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push((key.into(), value.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single `key=value` filter as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub key: String,
    pub value: String,
}

#[derive(Debug, thiserror::Error)]
#[error("bad format of filter (expected name=value): {0}")]
pub struct FilterParseError(String);

impl FromStr for Filter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok(Filter {
                key: key.trim().to_lowercase(),
                value: value.trim().to_owned(),
            }),
            _ => Err(FilterParseError(s.to_owned())),
        }
    }
}

impl FromIterator<Filter> for Filters {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Filters(iter.into_iter().map(|f| (f.key, f.value)).collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Include workloads that are not running.
    pub all: bool,
    pub filters: Filters,
}

/// Access to a container runtime.
pub trait RuntimeClient: Send + Sync + 'static {
    /// Returns the platform family of the daemon.
    fn server_os(&self) -> impl Future<Output = Result<OsFamily>> + Send;

    /// Lists the workloads matching `options`.
    fn list_workloads(
        &self,
        options: &ListOptions,
    ) -> impl Future<Output = Result<Vec<WorkloadSummary>>> + Send;

    /// Subscribes to workload lifecycle events matching `filters`.
    ///
    /// The subscription is active once the returned future resolves.
    fn subscribe_events(
        &self,
        filters: &Filters,
    ) -> impl Future<Output = Result<EventStream>> + Send;

    /// Opens the stats stream of `id`. With `stream == false` the daemon sends a single
    /// frame and closes the stream.
    fn open_metrics_stream(
        &self,
        id: &WorkloadID,
        stream: bool,
    ) -> impl Future<Output = Result<MetricsStream>> + Send;
}
