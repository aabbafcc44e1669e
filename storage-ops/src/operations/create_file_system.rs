// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_types::{DeviceSet, FileSystem, FileSystemType, Partition, PartitionRef};

use super::{Operation, OperationStatus, execute_jobs, operation_status};
use crate::error::Result;
use crate::jobs::{
    CheckFileSystemJob, CreateFileSystemJob, DeleteFileSystemJob, Job, JobContext,
};

/// Replace the file system of an existing partition with a new, empty one
///
/// Whichever of the two file systems is not installed in the model is kept here.
#[derive(Debug, Clone)]
pub struct CreateFileSystemOperation {
    partition: PartitionRef,
    path: String,
    old_file_system: FileSystem,
    new_file_system: FileSystem,
    previewed: bool,
    delete: DeleteFileSystemJob,
    create: CreateFileSystemJob,
    check: CheckFileSystemJob,
    status: OperationStatus,
}

impl CreateFileSystemOperation {
    pub fn new(devices: &DeviceSet, target: &PartitionRef, fs_type: FileSystemType) -> Result<Self> {
        let partition = devices.partition(target)?;
        let old_file_system = partition.file_system.clone();
        let new_file_system = FileSystem::new(
            fs_type,
            partition.first_sector,
            partition.last_sector,
            partition.sector_size,
        )
        .with_label(old_file_system.label.clone());

        Ok(Self {
            partition: target.clone(),
            path: partition.partition_path(),
            old_file_system,
            new_file_system,
            previewed: false,
            delete: DeleteFileSystemJob::new(partition.clone()),
            create: CreateFileSystemJob::new(target.clone()),
            check: CheckFileSystemJob::new(target.clone()),
            status: OperationStatus::Pending,
        })
    }

    pub fn can_create(partition: &Partition) -> bool {
        !partition.is_mounted() && !partition.is_unallocated() && !partition.is_extended()
    }

    pub fn partition(&self) -> &PartitionRef {
        &self.partition
    }

    pub fn new_type(&self) -> FileSystemType {
        self.new_file_system.fs_type
    }
}

impl Operation for CreateFileSystemOperation {
    fn description(&self) -> String {
        format!(
            "Format partition {} with file system {}",
            self.path,
            self.new_file_system.name()
        )
    }

    operation_status!();

    fn preview(&mut self, devices: &mut DeviceSet) -> Result<()> {
        if !self.previewed {
            devices.partition_mut(&self.partition)?.file_system = self.new_file_system.clone();
            self.previewed = true;
        }
        Ok(())
    }

    fn undo(&mut self, devices: &mut DeviceSet) -> Result<()> {
        if self.previewed {
            devices.partition_mut(&self.partition)?.file_system = self.old_file_system.clone();
            self.previewed = false;
        }
        Ok(())
    }

    fn targets_device(&self, device_node: &str) -> bool {
        self.partition.device_node == device_node
    }

    fn targets_partition(&self, partition: &PartitionRef) -> bool {
        self.partition == *partition
    }

    fn jobs(&self) -> Vec<&dyn Job> {
        vec![&self.delete, &self.create, &self.check]
    }

    fn jobs_mut(&mut self) -> Vec<&mut dyn Job> {
        vec![&mut self.delete, &mut self.create, &mut self.check]
    }

    fn execute(&mut self, ctx: &mut JobContext<'_>, parent: &mut Report) -> bool {
        if let Err(e) = self.preview(ctx.devices) {
            let report = parent.child(self.description());
            report.line(e.to_string());
            self.status = OperationStatus::Error;
            return false;
        }
        execute_jobs(self, ctx, parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::fixtures::{by_number, layout, populated_disk};

    #[test]
    fn preview_swaps_the_file_system_and_undo_puts_it_back() {
        let mut devices = populated_disk();
        let before = layout(&devices);
        let sda1 = by_number(&devices, 1);
        devices.partition_mut(&sda1).unwrap().file_system.label = "root".to_string();
        let labelled = layout(&devices);
        assert_ne!(labelled, before);

        let mut op =
            CreateFileSystemOperation::new(&devices, &sda1, FileSystemType::Btrfs).unwrap();
        op.preview(&mut devices).unwrap();
        op.preview(&mut devices).unwrap();
        let fs = &devices.partition(&sda1).unwrap().file_system;
        assert_eq!(fs.fs_type, FileSystemType::Btrfs);
        assert_eq!(fs.label, "root");

        op.undo(&mut devices).unwrap();
        op.undo(&mut devices).unwrap();
        assert_eq!(layout(&devices), labelled);
    }
}
