// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

use crate::partition::{PartitionId, PartitionRef};

/// Errors raised while navigating or editing the partition model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device {0} has no partition table")]
    NoPartitionTable(String),

    #[error("Partition not found: {0}")]
    PartitionNotFound(PartitionRef),

    #[error("Partition {0} is not part of this table")]
    UnknownPartition(PartitionId),

    #[error("Parent node {parent} of partition {id} is not part of this table")]
    ParentNotFound { id: PartitionId, parent: PartitionId },
}

/// Result type alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
