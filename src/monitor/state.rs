use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::stats::MetricSample;
use crate::workload::WorkloadID;

use super::CollectorError;

/// The shared slot a collector publishes into.
///
/// Only the owning collector writes the sample; the renderer reads copies of it.
#[derive(Debug)]
pub struct CollectorState {
    id: WorkloadID,
    sample: Mutex<MetricSample>,
    error: OnceLock<Arc<CollectorError>>,
    cancel: CancellationToken,
}

impl CollectorState {
    /// Creates the state of a newly admitted workload. Its sample is invalid until the
    /// first frame arrives.
    pub fn new(id: WorkloadID, cancel: CancellationToken) -> Self {
        Self {
            sample: Mutex::new(MetricSample::placeholder(id.as_str())),
            id,
            error: OnceLock::new(),
            cancel,
        }
    }

    pub fn id(&self) -> &WorkloadID {
        &self.id
    }

    pub fn sample(&self) -> MetricSample {
        self.sample
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_sample(&self, sample: MetricSample) {
        *self.sample.lock().unwrap_or_else(PoisonError::into_inner) = sample;
    }

    pub fn invalidate(&self) {
        self.sample
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .invalidate();
    }

    /// Records the terminal error. Only the first error sticks; returns whether this
    /// call set it.
    pub fn set_error(&self, err: CollectorError) -> bool {
        self.error.set(Arc::new(err)).is_ok()
    }

    pub fn error(&self) -> Option<Arc<CollectorError>> {
        self.error.get().cloned()
    }

    /// The token that stops this workload's collector.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}
