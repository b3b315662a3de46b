use std::sync::{Arc, PoisonError, RwLock};

use crate::stats::MetricSample;
use crate::workload::WorkloadID;

use super::{CollectorError, CollectorState};

/// The ordered set of monitored workloads.
///
/// Entries are unique by id and kept in admission order, which is also the display
/// order.
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<Vec<Arc<CollectorState>>>,
}

impl Registry {
    /// Inserts `state` unless an entry with the same id exists. Returns whether it was
    /// inserted.
    pub fn add(&self, state: Arc<CollectorState>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|e| e.id() == state.id()) {
            return false;
        }
        entries.push(state);
        true
    }

    /// Removes the entry for `id` and stops its collector. Returns whether an entry was
    /// removed.
    pub fn remove(&self, id: &WorkloadID) -> bool {
        let removed = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            entries
                .iter()
                .position(|e| e.id() == id)
                .map(|idx| entries.remove(idx))
        };
        match removed {
            Some(state) => {
                state.cancellation().cancel();
                true
            }
            None => false,
        }
    }

    /// Returns a point-in-time copy of every sample, in admission order.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.sample())
            .collect()
    }

    /// Returns the sticky errors recorded so far, in admission order.
    pub fn errors(&self) -> Vec<Arc<CollectorError>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|e| e.error())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
