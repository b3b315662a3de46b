//! Raw stats frames and the pure calculations that turn them into [`MetricSample`]s.
//!
//! The daemon streams one JSON document per sampling interval for every container.
//! Each document carries cumulative counters, both current and from the previous
//! interval, which the calculation functions convert into display values.
//!
//! # Main types
//!
//! - [`StatsFrame`]: the decoded wire document.
//! - [`FrameDecoder`]: pulls consecutive frames out of a byte stream and resynchronizes
//!   after malformed input.
//! - [`MetricSample`]: a normalized, platform independent snapshot of one workload.
//!
//! # Calculations
//!
//! | Concern  | Linux                           | Windows                       |
//! |----------|---------------------------------|-------------------------------|
//! | CPU %    | [`cpu_percent_unix`]            | [`cpu_percent_windows`]       |
//! | Memory   | [`mem_usage_unix_no_cache`]     | [`mem_usage_windows`]         |
//! | Memory % | [`mem_percent_unix`]            | not available                 |
//! | Block IO | [`block_io`]                    | [`block_io_windows`]          |
//! | Net IO   | [`network_io`]                  | [`network_io`]                |
//!
//! None of the calculations fail; degenerate input yields zero.

mod cpu;
mod decoder;
mod error;
mod frame;
mod io;
mod memory;
mod net;
mod sample;

pub use cpu::{cpu_percent_unix, cpu_percent_windows};
pub use decoder::FrameDecoder;
pub use error::DecodeError;
pub use frame::{
    BlkioStatEntry, BlkioStats, CpuStats, CpuUsage, MemoryStats, NetworkStats, PidsStats,
    StatsFrame, StorageStats,
};
pub use io::{block_io, block_io_windows};
pub use memory::{mem_percent_unix, mem_usage_unix_no_cache, mem_usage_windows};
pub use net::network_io;
pub use sample::MetricSample;
