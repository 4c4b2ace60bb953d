//! Command implementations behind the `ceremony` binary.

/// Flip payload encoding and decoding between files and hex.
pub mod codec;
/// Flip store listing and epoch maintenance.
pub mod flips;
/// Session deadline reporting.
pub mod timer;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
