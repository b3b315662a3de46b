use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::runtime::{self, RuntimeClient};
use crate::stats::{FrameDecoder, MetricSample, StatsFrame};
use crate::workload::{OsFamily, WorkloadID};

use super::barrier::FirstSample;
use super::{CollectorError, CollectorState};

/// Without any update for this long the current sample is shown as unknown.
pub(super) const LIVENESS_TIMEOUT: Duration = Duration::from_secs(2);
/// Pause before decoding again after a malformed frame.
pub(super) const RESYNC_BACKOFF: Duration = Duration::from_millis(100);

const UPDATE_CHANNEL_CAPACITY: usize = 4;

#[derive(Debug)]
enum Update {
    Sample(MetricSample),
    Malformed,
    Failed(runtime::Error),
}

/// Streams the stats of one workload into its [`CollectorState`].
///
/// A reader task decodes frames and forwards them; the supervising loop publishes them
/// and enforces liveness.
pub(super) struct Collector<C> {
    pub(super) client: Arc<C>,
    pub(super) state: Arc<CollectorState>,
    pub(super) os: OsFamily,
    pub(super) stream: bool,
}

impl<C> Collector<C>
where
    C: RuntimeClient,
{
    pub(super) async fn run(self, first: FirstSample) {
        let id = self.state.id().clone();
        let cancel = self.state.cancellation().clone();
        log::debug!(target: "collector", "collecting stats for {id}");

        let (tx, mut rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let reader = tokio::spawn(read_frames(
            Arc::clone(&self.client),
            id.clone(),
            self.os,
            self.stream,
            tx,
        ));

        let mut first = Some(first);
        let mut sampled = false;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                update = rx.recv() => match update {
                    Some(Update::Sample(sample)) => {
                        self.state.set_sample(sample);
                        sampled = true;
                        fire(&mut first);
                        if !self.stream {
                            break;
                        }
                    }
                    Some(Update::Malformed) => {}
                    Some(Update::Failed(err)) => {
                        let clean = err.is_unexpected_eof()
                            && (cancel.is_cancelled() || (!self.stream && sampled));
                        if clean {
                            log::debug!(target: "collector", "stats stream of {id} cut off: {err}");
                        } else {
                            log::warn!(target: "collector", "collecting stats for {id} failed: {err}");
                            self.state.set_error(CollectorError::Runtime {
                                id: id.clone(),
                                source: err,
                            });
                        }
                        self.state.invalidate();
                        fire(&mut first);
                        break;
                    }
                    None => {
                        log::debug!(target: "collector", "stats stream of {id} ended");
                        if self.stream {
                            self.state.invalidate();
                        }
                        fire(&mut first);
                        break;
                    }
                },
                () = tokio::time::sleep(LIVENESS_TIMEOUT) => {
                    log::debug!(
                        target: "collector",
                        "no stats from {id} within {}s",
                        LIVENESS_TIMEOUT.as_secs()
                    );
                    self.state.invalidate();
                    if first.is_some() {
                        self.state.set_error(CollectorError::Timeout(id.clone()));
                        fire(&mut first);
                    }
                    if !self.stream {
                        break;
                    }
                }
            }
        }

        reader.abort();
        log::trace!(target: "collector", "stopped collecting stats for {id}");
    }
}

fn fire(first: &mut Option<FirstSample>) {
    if let Some(first) = first.take() {
        first.fire();
    }
}

async fn read_frames<C>(
    client: Arc<C>,
    id: WorkloadID,
    os: OsFamily,
    stream: bool,
    tx: mpsc::Sender<Update>,
) where
    C: RuntimeClient,
{
    let metrics = match client.open_metrics_stream(&id, stream).await {
        Ok(metrics) => metrics,
        Err(err) => {
            let _ = tx.send(Update::Failed(err)).await;
            return;
        }
    };
    if let Some(reported) = metrics.os.filter(|reported| *reported != os) {
        log::debug!(target: "collector", "{id} reports {reported}, accounting as {os}");
    }

    let mut decoder = FrameDecoder::new(metrics.body);
    loop {
        let update = match decoder.next_frame::<StatsFrame>().await {
            None => return,
            Some(Ok(frame)) => Update::Sample(MetricSample::from_frame(id.as_str(), &frame, os)),
            Some(Err(err)) if err.is_recoverable() => {
                log::debug!(target: "collector", "skipping malformed frame of {id}: {err}");
                Update::Malformed
            }
            Some(Err(err)) => {
                let _ = tx.send(Update::Failed(err.into())).await;
                return;
            }
        };

        let resync = matches!(update, Update::Malformed);
        if tx.send(update).await.is_err() {
            return;
        }
        if resync {
            tokio::time::sleep(RESYNC_BACKOFF).await;
        } else if !stream {
            return;
        }
    }
}
