// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::StorageError;
use thiserror::Error;

/// Error types for raw block I/O
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Backend error: {0}")]
    Backend(#[from] StorageError),

    #[error("{0} has not been opened")]
    NotOpen(String),

    #[error("{what}: {length} bytes at offset {offset} lie outside the {size} byte range")]
    OutOfRange {
        what: String,
        offset: u64,
        length: u64,
        size: u64,
    },

    #[error("Target {target} holds {capacity} bytes but {needed} are to be copied")]
    TargetTooSmall {
        target: String,
        capacity: u64,
        needed: u64,
    },
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
