// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use storage_sys::ShredPattern;
use storage_types::{
    DetachedPartition, DeviceSet, NodeRef, Partition, PartitionRef, PartitionTable,
};

use super::{
    Operation, OperationStatus, insert_preview_partition, operation_status,
    remove_preview_partition,
};
use crate::error::Result;
use crate::jobs::{DeleteFileSystemJob, DeletePartitionJob, Job, ShredFileSystemJob};

/// What happens to the file system's data before the partition goes away
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShredAction {
    /// Only the file system signature is removed
    #[default]
    None,
    Zeros,
    Random,
}

#[derive(Debug, Clone)]
enum FileSystemStep {
    Delete(DeleteFileSystemJob),
    Shred(ShredFileSystemJob),
}

impl FileSystemStep {
    fn new(partition: &Partition, shred: ShredAction) -> Self {
        match shred {
            ShredAction::None => Self::Delete(DeleteFileSystemJob::new(partition.clone())),
            ShredAction::Zeros => {
                Self::Shred(ShredFileSystemJob::new(partition.clone(), ShredPattern::Zeros))
            }
            ShredAction::Random => {
                Self::Shred(ShredFileSystemJob::new(partition.clone(), ShredPattern::Random))
            }
        }
    }

    fn job(&self) -> &dyn Job {
        match self {
            Self::Delete(job) => job,
            Self::Shred(job) => job,
        }
    }

    fn job_mut(&mut self) -> &mut dyn Job {
        match self {
            Self::Delete(job) => job,
            Self::Shred(job) => job,
        }
    }
}

/// Remove a partition, wiping or shredding its file system first
#[derive(Debug, Clone)]
pub struct DeleteOperation {
    device_node: String,
    partition: Partition,
    shred: ShredAction,
    /// The deleted partition while the preview does not show it
    detached: Option<DetachedPartition>,
    file_system: FileSystemStep,
    delete_partition: DeletePartitionJob,
    status: OperationStatus,
}

impl DeleteOperation {
    pub fn new(devices: &DeviceSet, target: &PartitionRef, shred: ShredAction) -> Result<Self> {
        Ok(Self::from_partition(devices.partition(target)?.clone(), shred))
    }

    pub fn from_partition(partition: Partition, shred: ShredAction) -> Self {
        Self {
            device_node: partition.device_path.clone(),
            file_system: FileSystemStep::new(&partition, shred),
            delete_partition: DeletePartitionJob::new(partition.clone()),
            partition,
            shred,
            detached: None,
            status: OperationStatus::Pending,
        }
    }

    /// Point the operation at another partition, rebuilding its jobs
    pub fn retarget(&mut self, partition: Partition) {
        *self = Self::from_partition(partition, self.shred);
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn partition_ref(&self) -> PartitionRef {
        self.partition.reference()
    }

    pub fn shred(&self) -> ShredAction {
        self.shred
    }

    pub fn is_extended(&self) -> bool {
        self.partition.is_extended()
    }

    /// Mounted partitions and extended partitions that still hold logicals stay
    pub fn can_delete(table: &PartitionTable, partition: &Partition) -> bool {
        if partition.is_unallocated() || partition.is_mounted() {
            return false;
        }
        if partition.is_extended() {
            return table
                .children(NodeRef::Partition(partition.id()))
                .iter()
                .filter_map(|id| table.partition(*id))
                .all(Partition::is_unallocated);
        }
        true
    }

    fn extended_parent(&self) -> Option<storage_types::PartitionId> {
        match self.partition.parent() {
            NodeRef::Partition(parent) => Some(parent),
            NodeRef::Root => None,
        }
    }
}

impl Operation for DeleteOperation {
    fn description(&self) -> String {
        match self.shred {
            ShredAction::None => format!(
                "Delete partition {} ({}, {})",
                self.partition.partition_path(),
                self.partition.capacity(),
                self.partition.file_system.name()
            ),
            _ => format!(
                "Shred partition {} ({}, {})",
                self.partition.partition_path(),
                self.partition.capacity(),
                self.partition.file_system.name()
            ),
        }
    }

    operation_status!();

    fn preview(&mut self, devices: &mut DeviceSet) -> Result<()> {
        if self.detached.is_some() {
            return Ok(());
        }
        remove_preview_partition(
            devices,
            &self.device_node,
            self.partition.id(),
            &mut self.detached,
        )?;
        if let Some(extended) = self.extended_parent() {
            devices
                .device_mut(&self.device_node)?
                .table_mut()?
                .adjust_logical_numbers(extended, self.partition.number, None);
        }
        Ok(())
    }

    fn undo(&mut self, devices: &mut DeviceSet) -> Result<()> {
        if self.detached.is_none() {
            return Ok(());
        }
        if let Some(extended) = self.extended_parent() {
            devices
                .device_mut(&self.device_node)?
                .table_mut()?
                .adjust_logical_numbers(extended, None, self.partition.number);
        }
        insert_preview_partition(devices, &self.device_node, &mut self.detached)
    }

    fn targets_device(&self, device_node: &str) -> bool {
        self.device_node == device_node
    }

    fn targets_partition(&self, partition: &PartitionRef) -> bool {
        self.partition.reference() == *partition
    }

    fn jobs(&self) -> Vec<&dyn Job> {
        vec![self.file_system.job(), &self.delete_partition]
    }

    fn jobs_mut(&mut self) -> Vec<&mut dyn Job> {
        vec![self.file_system.job_mut(), &mut self.delete_partition]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::fixtures::{SDA, by_number, layout, populated_disk};

    #[test]
    fn deleting_a_logical_renumbers_its_siblings_and_undo_restores_them() {
        let mut devices = populated_disk();
        let before = layout(&devices);
        let sda5 = by_number(&devices, 5);
        let sda6 = by_number(&devices, 6);

        let mut op = DeleteOperation::new(&devices, &sda5, ShredAction::None).unwrap();
        op.preview(&mut devices).unwrap();
        op.preview(&mut devices).unwrap();
        assert!(devices.partition(&sda5).is_err());
        assert_eq!(devices.partition(&sda6).unwrap().number, Some(5));

        op.undo(&mut devices).unwrap();
        op.undo(&mut devices).unwrap();
        assert_eq!(layout(&devices), before);
    }

    #[test]
    fn extended_with_logicals_cannot_be_deleted() {
        let devices = populated_disk();
        let table = devices.device(SDA).unwrap().table().unwrap();
        let extended = devices.partition(&by_number(&devices, 2)).unwrap();
        let sda1 = devices.partition(&by_number(&devices, 1)).unwrap();
        assert!(!DeleteOperation::can_delete(table, extended));
        assert!(DeleteOperation::can_delete(table, sda1));

        let mounted = sda1.clone().with_mount_point("/");
        assert!(!DeleteOperation::can_delete(table, &mounted));
    }

    #[test]
    fn shredding_swaps_the_file_system_job() {
        let devices = populated_disk();
        let op = DeleteOperation::new(&devices, &by_number(&devices, 1), ShredAction::Random)
            .unwrap();
        assert_eq!(op.jobs().len(), 2);
        assert!(op.description().starts_with("Shred partition /dev/sda1"));
    }
}
