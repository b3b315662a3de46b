use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::monitor::Monitor;
use crate::runtime::{self, Action, EventStream, LifecycleEvent, ListOptions, RuntimeClient};

/// Progress of a [`MembershipWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Not subscribed yet.
    Starting,
    /// The event subscription is open; existing workloads are being listed.
    Subscribed,
    /// Reacting to lifecycle events.
    Watching,
    /// Terminal, no further membership changes.
    Stopped,
}

/// Admits and removes workloads as they start and die.
///
/// The event subscription is opened before the existing workloads are listed, so a
/// workload started in between shows up either in the listing or as an event. The
/// registry drops the duplicate when it shows up in both.
pub struct MembershipWatcher<C> {
    client: Arc<C>,
    monitor: Arc<Monitor<C>>,
    options: ListOptions,
    state: WatcherState,
}

impl<C> MembershipWatcher<C>
where
    C: RuntimeClient,
{
    pub fn new(client: Arc<C>, monitor: Arc<Monitor<C>>, options: ListOptions) -> Self {
        Self {
            client,
            monitor,
            options,
            state: WatcherState::Starting,
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Subscribes to lifecycle events and admits every workload that already exists.
    ///
    /// A failed listing is reported on `fatal`; the subscription stays usable.
    ///
    /// # Errors
    ///
    /// Returns the subscription error, leaving the watcher stopped.
    pub async fn start(
        &mut self,
        fatal: &mpsc::Sender<runtime::Error>,
    ) -> runtime::Result<EventStream> {
        let events = match self.client.subscribe_events(&self.options.filters).await {
            Ok(events) => events,
            Err(err) => {
                self.transition(WatcherState::Stopped);
                return Err(err);
            }
        };
        self.transition(WatcherState::Subscribed);

        match self.client.list_workloads(&self.options).await {
            Ok(workloads) => {
                for workload in workloads {
                    self.monitor.admit(workload.id.short());
                }
            }
            Err(err) => {
                log::error!(target: "watcher", "failed to list workloads: {err}");
                let _ = fatal.try_send(err);
            }
        }

        self.transition(WatcherState::Watching);
        Ok(events)
    }

    /// Applies lifecycle events until the subscription fails or `cancel` fires.
    ///
    /// A subscription error is forwarded on `fatal`.
    pub async fn watch(
        mut self,
        mut events: EventStream,
        fatal: mpsc::Sender<runtime::Error>,
        cancel: CancellationToken,
    ) {
        while self.state == WatcherState::Watching {
            let event = tokio::select! {
                () = cancel.cancelled() => None,
                event = events.recv() => Some(event.unwrap_or_else(|| Err(runtime::Error::StreamClosed))),
            };
            match event {
                None => self.transition(WatcherState::Stopped),
                Some(Ok(event)) => self.apply(event),
                Some(Err(err)) => {
                    log::debug!(target: "watcher", "event subscription ended: {err}");
                    let _ = fatal.send(err).await;
                    self.transition(WatcherState::Stopped);
                }
            }
        }
    }

    fn apply(&self, event: LifecycleEvent) {
        let id = event.workload_id.short();
        log::trace!(target: "watcher", "{:?} {id}", event.action);
        match event.action {
            Action::Create if self.options.all => {
                self.monitor.admit(id);
            }
            Action::Start => {
                self.monitor.admit(id);
            }
            Action::Die if !self.options.all => {
                self.monitor.remove(&id);
            }
            _ => {}
        }
    }

    fn transition(&mut self, next: WatcherState) {
        log::debug!(target: "watcher", "{:?} -> {next:?}", self.state);
        self.state = next;
    }
}
