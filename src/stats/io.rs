//! Block I/O totals aggregated across all devices.
//!
//! The daemon reports one entry per device and operation. Entries are bucketed by the
//! first character of the operation label, case-insensitively: `r` for reads and `w`
//! for writes. Entries with an empty or unrecognized label (`sync`, `async`, `total`,
//! `discard`, ...) are ignored.
//!
//! # Example
//!
//! ```rust
//! use creo_stats::stats::{block_io, BlkioStats, BlkioStatEntry};
//!
//! let blkio = BlkioStats {
//!     io_service_bytes_recursive: vec![
//!         BlkioStatEntry { major: 8, minor: 0, op: "Read".to_owned(), value: 1024 },
//!         BlkioStatEntry { major: 8, minor: 0, op: "Write".to_owned(), value: 2048 },
//!         BlkioStatEntry { major: 254, minor: 0, op: "read".to_owned(), value: 1024 },
//!     ],
//! };
//!
//! assert_eq!(block_io(&blkio), (2048, 2048));
//! ```

use super::frame::{BlkioStats, StorageStats};

/// Returns the total bytes read and written across all devices.
pub fn block_io(blkio: &BlkioStats) -> (u64, u64) {
    let mut read = 0u64;
    let mut write = 0u64;
    for entry in &blkio.io_service_bytes_recursive {
        match entry.op.bytes().next() {
            Some(b'r' | b'R') => read = read.saturating_add(entry.value),
            Some(b'w' | b'W') => write = write.saturating_add(entry.value),
            _ => {}
        }
    }
    (read, write)
}

/// Returns the bytes read and written by a Windows container.
pub fn block_io_windows(storage: &StorageStats) -> (u64, u64) {
    (storage.read_size_bytes, storage.write_size_bytes)
}
