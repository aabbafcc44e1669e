// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use storage_types::{ModelError, PartitionRef};
use thiserror::Error;

/// Errors raised while building, previewing or queueing operations
///
/// Execution failures never surface here: jobs report them as report lines and a
/// `false` return.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("No partition or free space at sector {sector} on {device}")]
    NoDestination { device: String, sector: u64 },

    #[error("{partition} is not allowed here: {reason}")]
    NotAllowed {
        partition: PartitionRef,
        reason: String,
    },

    #[error("{0} is not a volume group")]
    NotVolumeGroup(String),

    #[error("Volume group {device} has {allocated} extents in use but would only keep {available}")]
    InsufficientExtents {
        device: String,
        allocated: u64,
        available: u64,
    },

    #[error("Cannot read image file {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The operation stack is empty")]
    EmptyStack,
}

/// Result type alias for operation building and stack edits
pub type Result<T> = std::result::Result<T, OperationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_device() {
        assert_eq!(
            OperationError::NotVolumeGroup("/dev/sda".into()).to_string(),
            "/dev/sda is not a volume group"
        );
        let extents = OperationError::InsufficientExtents {
            device: "/dev/vg0".into(),
            allocated: 300,
            available: 200,
        };
        assert_eq!(
            extents.to_string(),
            "Volume group /dev/vg0 has 300 extents in use but would only keep 200"
        );
    }
}
