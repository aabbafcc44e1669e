// SPDX-License-Identifier: GPL-3.0-only

//! Operations: user-level changes, each a fixed sequence of jobs
//!
//! An operation is queued long before it runs. While queued it edits the preview
//! model through [`Operation::preview`] and can take that edit back again with
//! [`Operation::undo`]. Whichever state is not installed in the model (a deleted
//! partition, the previous file system, the old partition table) is owned by the
//! operation itself.

mod backup;
mod check;
mod copy;
mod create_file_system;
mod create_partition_table;
mod delete;
mod new;
mod resize;
mod resize_volume_group;
mod restore;
mod set_file_system_label;
mod set_partition_flags;

pub use backup::BackupOperation;
pub use check::CheckOperation;
pub use copy::CopyOperation;
pub use create_file_system::CreateFileSystemOperation;
pub use create_partition_table::CreatePartitionTableOperation;
pub use delete::{DeleteOperation, ShredAction};
pub use new::NewOperation;
pub use resize::{ResizeAction, ResizeActions, ResizeOperation};
pub use resize_volume_group::ResizeVolumeGroupOperation;
pub use restore::RestoreOperation;
pub use set_file_system_label::SetFileSystemLabelOperation;
pub use set_partition_flags::SetPartFlagsOperation;

use std::fmt;

use serde::{Deserialize, Serialize};
use storage_contracts::Report;
use storage_types::{
    DetachedPartition, DeviceSet, ModelError, NodeRef, Partition, PartitionId, PartitionRef,
    PartitionRole,
};

use crate::error::{OperationError, Result};
use crate::jobs::{Job, JobContext, run_job};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Pending,
    Running,
    FinishedSuccess,
    FinishedWarning,
    Error,
}

impl OperationStatus {
    pub fn text(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::FinishedSuccess => "Success",
            Self::FinishedWarning => "Warning",
            Self::Error => "Error",
        }
    }

    /// Ran to completion, possibly with warnings
    pub fn succeeded(self) -> bool {
        matches!(self, Self::FinishedSuccess | Self::FinishedWarning)
    }

    pub fn is_finished(self) -> bool {
        matches!(
            self,
            Self::FinishedSuccess | Self::FinishedWarning | Self::Error
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

pub trait Operation {
    fn description(&self) -> String;

    fn status(&self) -> OperationStatus;

    fn set_status(&mut self, status: OperationStatus);

    /// Apply this operation's effect to the preview model
    ///
    /// Calling it again without an [`undo`](Self::undo) in between changes nothing.
    fn preview(&mut self, devices: &mut DeviceSet) -> Result<()>;

    /// Exact inverse of [`preview`](Self::preview)
    fn undo(&mut self, devices: &mut DeviceSet) -> Result<()>;

    fn targets_device(&self, device_node: &str) -> bool;

    fn targets_partition(&self, partition: &PartitionRef) -> bool;

    fn jobs(&self) -> Vec<&dyn Job>;

    fn jobs_mut(&mut self) -> Vec<&mut dyn Job>;

    fn execute(&mut self, ctx: &mut JobContext<'_>, parent: &mut Report) -> bool {
        execute_jobs(self, ctx, parent)
    }
}

macro_rules! operation_status {
    () => {
        fn status(&self) -> $crate::operations::OperationStatus {
            self.status
        }

        fn set_status(&mut self, status: $crate::operations::OperationStatus) {
            self.status = status;
        }
    };
}
pub(crate) use operation_status;

/// Run every job in order, stopping at the first failure
pub fn execute_jobs<O: Operation + ?Sized>(
    operation: &mut O,
    ctx: &mut JobContext<'_>,
    parent: &mut Report,
) -> bool {
    let description = operation.description();
    let report = parent.child(description.clone());
    let ok = operation
        .jobs_mut()
        .into_iter()
        .all(|job| run_job(job, ctx, report));
    let status = if ok {
        OperationStatus::FinishedSuccess
    } else {
        OperationStatus::Error
    };
    finish(operation, report, &description, status);
    ok
}

pub(crate) fn finish<O: Operation + ?Sized>(
    operation: &mut O,
    report: &mut Report,
    description: &str,
    status: OperationStatus,
) {
    operation.set_status(status);
    report.set_status(format!("{description}: {status}"));
}

/// Put a detached partition back into the preview
///
/// Does nothing when `slot` is empty, i.e. the partition is already there.
pub(crate) fn insert_preview_partition(
    devices: &mut DeviceSet,
    device_node: &str,
    slot: &mut Option<DetachedPartition>,
) -> Result<()> {
    let device = devices.device_mut(device_node)?;
    let table = device.table_mut()?;
    if let Some(detached) = slot.as_ref()
        && let NodeRef::Partition(parent) = detached.partition.parent()
        && !table.contains(parent)
    {
        return Err(ModelError::ParentNotFound {
            id: detached.id(),
            parent,
        }
        .into());
    }
    let Some(detached) = slot.take() else {
        return Ok(());
    };

    table.remove_unallocated();
    table.restore(detached)?;
    device.update_unallocated();
    Ok(())
}

/// Take a partition out of the preview and keep it in `slot`
///
/// Does nothing when `slot` already holds it.
pub(crate) fn remove_preview_partition(
    devices: &mut DeviceSet,
    device_node: &str,
    id: PartitionId,
    slot: &mut Option<DetachedPartition>,
) -> Result<()> {
    if slot.is_some() {
        return Ok(());
    }
    let device = devices.device_mut(device_node)?;
    let detached = device
        .table_mut()?
        .take(id)
        .ok_or(ModelError::UnknownPartition(id))?;
    *slot = Some(detached);
    device.update_unallocated();
    Ok(())
}

/// The partition or free region a paste or restore at `sector` lands on
pub(crate) fn find_destination(devices: &DeviceSet, device_node: &str, sector: u64) -> Result<Partition> {
    let table = devices.device(device_node)?.table()?;
    let roles = PartitionRole::Primary | PartitionRole::Logical | PartitionRole::Unallocated;
    table
        .find_partition_by_sector(sector, roles)
        .and_then(|id| table.partition(id))
        .cloned()
        .ok_or_else(|| OperationError::NoDestination {
            device: device_node.to_string(),
            sector,
        })
}

/// Re-sort a node after a geometry change and rebuild the free space
pub(crate) fn refresh_preview(devices: &mut DeviceSet, device_node: &str, node: NodeRef) -> Result<()> {
    let device = devices.device_mut(device_node)?;
    device.table_mut()?.resort(node);
    device.update_unallocated();
    Ok(())
}

/// Every kind of operation the stack can hold
#[derive(Debug, Clone)]
pub enum PendingOperation {
    New(NewOperation),
    Delete(DeleteOperation),
    Resize(ResizeOperation),
    Copy(CopyOperation),
    Restore(RestoreOperation),
    Backup(BackupOperation),
    Check(CheckOperation),
    CreateFileSystem(CreateFileSystemOperation),
    SetFileSystemLabel(SetFileSystemLabelOperation),
    SetPartFlags(SetPartFlagsOperation),
    CreatePartitionTable(CreatePartitionTableOperation),
    ResizeVolumeGroup(ResizeVolumeGroupOperation),
}

macro_rules! pending_operation {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        impl PendingOperation {
            pub fn as_operation(&self) -> &dyn Operation {
                match self {
                    $(Self::$variant(op) => op,)*
                }
            }

            pub fn as_operation_mut(&mut self) -> &mut dyn Operation {
                match self {
                    $(Self::$variant(op) => op,)*
                }
            }
        }

        $(
            impl From<$ty> for PendingOperation {
                fn from(op: $ty) -> Self {
                    Self::$variant(op)
                }
            }
        )*
    };
}

pending_operation!(
    New(NewOperation),
    Delete(DeleteOperation),
    Resize(ResizeOperation),
    Copy(CopyOperation),
    Restore(RestoreOperation),
    Backup(BackupOperation),
    Check(CheckOperation),
    CreateFileSystem(CreateFileSystemOperation),
    SetFileSystemLabel(SetFileSystemLabelOperation),
    SetPartFlags(SetPartFlagsOperation),
    CreatePartitionTable(CreatePartitionTableOperation),
    ResizeVolumeGroup(ResizeVolumeGroupOperation),
);

impl PendingOperation {
    pub fn description(&self) -> String {
        self.as_operation().description()
    }

    pub fn status(&self) -> OperationStatus {
        self.as_operation().status()
    }
}

#[cfg(test)]
pub(crate) mod fixtures;
