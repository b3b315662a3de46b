//! Keeps the monitored set in sync with the runtime when no workloads were named.

mod watcher;

pub use watcher::{MembershipWatcher, WatcherState};
