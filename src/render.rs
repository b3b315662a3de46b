use std::io::Write;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::format::StatsFormat;
use crate::monitor::Monitor;
use crate::runtime::{self, RuntimeClient};
use crate::stats::MetricSample;

pub const REFRESH_INTERVAL: Duration = Duration::from_millis(500);

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderMode {
    /// Keep refreshing instead of rendering once.
    pub stream: bool,
    /// Workloads are discovered, so an emptied registry ends the session.
    pub auto: bool,
}

/// Periodically writes the monitored samples to `out`.
pub struct Renderer<W> {
    out: W,
    format: StatsFormat,
    mode: RenderMode,
}

impl<W> Renderer<W>
where
    W: Write,
{
    pub fn new(out: W, format: StatsFormat, mode: RenderMode) -> Self {
        Self { out, format, mode }
    }

    /// Renders every [`REFRESH_INTERVAL`] until the session ends.
    ///
    /// The session ends after the first render when not streaming, once every
    /// discovered workload is gone, on cancellation, or when `fatal` reports an error.
    /// `fatal` is checked after every render, including the only one of a one-shot
    /// session. An error that only means the daemon went away ends the session cleanly.
    ///
    /// # Errors
    ///
    /// Returns the fatal error, or a failure to write the output.
    pub async fn run<C>(
        &mut self,
        monitor: &Monitor<C>,
        fatal: &mut mpsc::Receiver<runtime::Error>,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        C: RuntimeClient,
    {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + REFRESH_INTERVAL, REFRESH_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    log::debug!(target: "renderer", "cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            self.render(&monitor.snapshot())?;

            if let Ok(err) = fatal.try_recv() {
                if err.is_unexpected_eof() {
                    log::debug!(target: "renderer", "daemon went away: {err}");
                    return Ok(());
                }
                return Err(err.into());
            }
            if !self.mode.stream {
                return Ok(());
            }
            if self.mode.auto && monitor.is_empty() && monitor.has_admitted() {
                log::debug!(target: "renderer", "no workloads left");
                return Ok(());
            }
        }
    }

    /// Writes one frame of output.
    pub fn render(&mut self, samples: &[MetricSample]) -> Result<()> {
        let mut text = String::new();
        if self.mode.stream {
            text.push_str(CLEAR_SCREEN);
        }
        text.push_str(&self.format.render(samples));
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::OsFamily;

    fn renderer(stream: bool) -> Renderer<Vec<u8>> {
        let format = StatsFormat::new("table {{.Container}}\t{{.CPUPerc}}", OsFamily::Linux, true)
            .unwrap();
        Renderer::new(Vec::new(), format, RenderMode { stream, auto: false })
    }

    #[test]
    fn test_render_once_without_clearing() {
        let mut renderer = renderer(false);
        renderer
            .render(&[MetricSample {
                container: "web".to_owned(),
                cpu_percentage: 1.0,
                ..MetricSample::default()
            }])
            .unwrap();
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(out, "CONTAINER   CPU %\nweb         1.00%\n");
    }

    #[test]
    fn test_streaming_clears_screen() {
        let mut renderer = renderer(true);
        renderer.render(&[]).unwrap();
        renderer.render(&[]).unwrap();
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(
            out,
            "\x1b[2J\x1b[HCONTAINER   CPU %\n\x1b[2J\x1b[HCONTAINER   CPU %\n"
        );
    }
}
