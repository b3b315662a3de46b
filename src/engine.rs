//! Wires the runtime, monitor, watcher and renderer into one stats session.

use std::io::Write;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::StatsOptions;
use crate::discovery::MembershipWatcher;
use crate::error::{Error, Result, WorkloadFailures};
use crate::format::{StatsFormat, TABLE_FORMAT_KEY};
use crate::monitor::Monitor;
use crate::render::{RenderMode, Renderer};
use crate::runtime::RuntimeClient;
use crate::workload::WorkloadID;

const FATAL_CHANNEL_CAPACITY: usize = 2;

/// Runs a stats session until it ends on its own or `cancel` fires.
///
/// With named workloads, collector failures are reported together: before rendering
/// if every workload failed, after the session otherwise. With discovered workloads,
/// only a failing event subscription is an error.
///
/// # Errors
///
/// See [`Error`].
pub async fn run_stats<C, W>(
    client: Arc<C>,
    options: &StatsOptions,
    out: W,
    cancel: CancellationToken,
) -> Result<()>
where
    C: RuntimeClient,
    W: Write,
{
    let os = client.server_os().await?;
    log::debug!("Daemon platform: {os}");

    let format = match options.format.as_str() {
        "" => TABLE_FORMAT_KEY,
        format => format,
    };
    let format = StatsFormat::new(format, os, !options.no_trunc)?;

    let mode = RenderMode {
        stream: !options.no_stream,
        auto: options.is_auto(),
    };
    let session = cancel.child_token();
    let monitor = Arc::new(Monitor::new(
        Arc::clone(&client),
        os,
        mode.stream,
        session.clone(),
    ));

    let result = run_session(client, &monitor, options, format, mode, out, &cancel).await;
    session.cancel();
    result
}

async fn run_session<C, W>(
    client: Arc<C>,
    monitor: &Arc<Monitor<C>>,
    options: &StatsOptions,
    format: StatsFormat,
    mode: RenderMode,
    out: W,
    cancel: &CancellationToken,
) -> Result<()>
where
    C: RuntimeClient,
    W: Write,
{
    let (fatal_tx, mut fatal_rx) = mpsc::channel(FATAL_CHANNEL_CAPACITY);
    if mode.auto {
        let mut watcher =
            MembershipWatcher::new(client, Arc::clone(monitor), options.list_options());
        let events = watcher.start(&fatal_tx).await?;
        tokio::spawn(watcher.watch(events, fatal_tx, cancel.child_token()));
    } else {
        for name in &options.containers {
            monitor.admit(WorkloadID::new(name)?);
        }
        drop(fatal_tx);
    }

    tokio::select! {
        () = monitor.wait_first() => {}
        () = cancel.cancelled() => return Ok(()),
    }

    if !mode.auto {
        let errors = monitor.errors();
        if !errors.is_empty() && errors.len() == monitor.len() {
            return Err(Error::Workloads(WorkloadFailures(errors)));
        }
    }

    Renderer::new(out, format, mode)
        .run(monitor, &mut fatal_rx, cancel)
        .await?;

    if !mode.auto {
        let errors = monitor.errors();
        if !errors.is_empty() {
            return Err(Error::Workloads(WorkloadFailures(errors)));
        }
    }
    Ok(())
}
