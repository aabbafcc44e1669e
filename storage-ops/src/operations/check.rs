// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::FileSystemTools;
use storage_types::{CommandSupportType, DeviceSet, FsCapability, Partition, PartitionRef};

use super::{Operation, OperationStatus, operation_status};
use crate::error::Result;
use crate::jobs::{CheckFileSystemJob, Job, ResizeFileSystemJob};

/// Check and repair a file system, then grow it to fill its partition
#[derive(Debug, Clone)]
pub struct CheckOperation {
    partition: PartitionRef,
    path: String,
    check: CheckFileSystemJob,
    maximize: ResizeFileSystemJob,
    status: OperationStatus,
}

impl CheckOperation {
    pub fn new(devices: &DeviceSet, target: &PartitionRef) -> Result<Self> {
        let partition = devices.partition(target)?;
        Ok(Self {
            partition: target.clone(),
            path: partition.partition_path(),
            check: CheckFileSystemJob::new(target.clone()),
            maximize: ResizeFileSystemJob::maximize(target.clone()),
            status: OperationStatus::Pending,
        })
    }

    pub fn can_check(tools: &dyn FileSystemTools, partition: &Partition) -> bool {
        !partition.is_unallocated()
            && !partition.is_extended()
            && !partition.is_mounted()
            && tools.support(partition.file_system.fs_type, FsCapability::Check)
                != CommandSupportType::None
    }

    pub fn partition(&self) -> &PartitionRef {
        &self.partition
    }
}

impl Operation for CheckOperation {
    fn description(&self) -> String {
        format!("Check and repair partition {}", self.path)
    }

    operation_status!();

    fn preview(&mut self, _devices: &mut DeviceSet) -> Result<()> {
        Ok(())
    }

    fn undo(&mut self, _devices: &mut DeviceSet) -> Result<()> {
        Ok(())
    }

    fn targets_device(&self, device_node: &str) -> bool {
        self.partition.device_node == device_node
    }

    fn targets_partition(&self, partition: &PartitionRef) -> bool {
        self.partition == *partition
    }

    fn jobs(&self) -> Vec<&dyn Job> {
        vec![&self.check, &self.maximize]
    }

    fn jobs_mut(&mut self) -> Vec<&mut dyn Job> {
        vec![&mut self.check, &mut self.maximize]
    }
}
