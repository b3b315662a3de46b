use std::sync::Arc;

use tokio::sync::watch;

/// Counts collectors that have not yet produced their first sample or error.
#[derive(Debug, Clone)]
pub struct StartupBarrier {
    pending: Arc<watch::Sender<usize>>,
}

impl Default for StartupBarrier {
    fn default() -> Self {
        Self {
            pending: Arc::new(watch::Sender::new(0)),
        }
    }
}

impl StartupBarrier {
    /// Adds one pending collector. The returned guard releases it when fired or dropped.
    pub fn register(&self) -> FirstSample {
        self.pending.send_modify(|n| *n += 1);
        FirstSample {
            pending: Some(Arc::clone(&self.pending)),
        }
    }

    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Waits until every registered collector has fired.
    pub async fn wait(&self) {
        let mut rx = self.pending.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// Fires at most once per collector, on its first sample or terminal failure.
#[derive(Debug)]
pub struct FirstSample {
    pending: Option<Arc<watch::Sender<usize>>>,
}

impl FirstSample {
    pub fn fire(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.send_modify(|n| *n = n.saturating_sub(1));
        }
    }
}

impl Drop for FirstSample {
    fn drop(&mut self) {
        self.release();
    }
}
