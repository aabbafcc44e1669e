// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::FileSystemTools;
use storage_types::{CommandSupportType, DeviceSet, FsCapability, Partition, PartitionRef};

use super::{Operation, OperationStatus, operation_status};
use crate::error::Result;
use crate::jobs::{Job, SetFileSystemLabelJob};

#[derive(Debug, Clone)]
pub struct SetFileSystemLabelOperation {
    partition: PartitionRef,
    path: String,
    old_label: String,
    new_label: String,
    job: SetFileSystemLabelJob,
    status: OperationStatus,
}

impl SetFileSystemLabelOperation {
    pub fn new(devices: &DeviceSet, target: &PartitionRef, new_label: impl Into<String>) -> Result<Self> {
        let partition = devices.partition(target)?;
        let new_label = new_label.into();
        Ok(Self {
            partition: target.clone(),
            path: partition.partition_path(),
            old_label: partition.file_system.label.clone(),
            job: SetFileSystemLabelJob::new(target.clone(), new_label.clone()),
            new_label,
            status: OperationStatus::Pending,
        })
    }

    pub fn can_set_label(tools: &dyn FileSystemTools, partition: &Partition) -> bool {
        if partition.is_unallocated() || partition.is_extended() {
            return false;
        }
        let fs = partition.file_system.fs_type;
        if partition.is_mounted() {
            return tools.support(fs, FsCapability::WriteLabelOnline) != CommandSupportType::None;
        }
        tools.support(fs, FsCapability::WriteLabel) != CommandSupportType::None
    }

    pub fn partition(&self) -> &PartitionRef {
        &self.partition
    }

    pub fn old_label(&self) -> &str {
        &self.old_label
    }

    pub fn new_label(&self) -> &str {
        &self.new_label
    }

    /// Take over the label an earlier, discarded operation started from
    pub fn set_old_label(&mut self, label: impl Into<String>) {
        self.old_label = label.into();
    }

    pub fn is_noop(&self) -> bool {
        self.old_label == self.new_label
    }

    fn apply(&self, devices: &mut DeviceSet, label: &str) -> Result<()> {
        devices.partition_mut(&self.partition)?.file_system.label = label.to_string();
        Ok(())
    }
}

impl Operation for SetFileSystemLabelOperation {
    fn description(&self) -> String {
        format!(
            "Set the file system label on partition {} to \"{}\"",
            self.path, self.new_label
        )
    }

    operation_status!();

    fn preview(&mut self, devices: &mut DeviceSet) -> Result<()> {
        self.apply(devices, &self.new_label)
    }

    fn undo(&mut self, devices: &mut DeviceSet) -> Result<()> {
        self.apply(devices, &self.old_label)
    }

    fn targets_device(&self, device_node: &str) -> bool {
        self.partition.device_node == device_node
    }

    fn targets_partition(&self, partition: &PartitionRef) -> bool {
        self.partition == *partition
    }

    fn jobs(&self) -> Vec<&dyn Job> {
        vec![&self.job]
    }

    fn jobs_mut(&mut self) -> Vec<&mut dyn Job> {
        vec![&mut self.job]
    }
}
