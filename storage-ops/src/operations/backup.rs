// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use storage_contracts::FileSystemTools;
use storage_types::{CommandSupportType, DeviceSet, FsCapability, Partition, PartitionRef};

use super::{Operation, OperationStatus, operation_status};
use crate::error::Result;
use crate::jobs::{BackupFileSystemJob, Job};

/// Save a file system to an image file; the preview is not affected
#[derive(Debug, Clone)]
pub struct BackupOperation {
    partition: PartitionRef,
    path: String,
    file: PathBuf,
    backup: BackupFileSystemJob,
    status: OperationStatus,
}

impl BackupOperation {
    pub fn new(devices: &DeviceSet, target: &PartitionRef, file: impl AsRef<Path>) -> Result<Self> {
        let partition = devices.partition(target)?;
        let file = file.as_ref().to_path_buf();
        Ok(Self {
            partition: target.clone(),
            path: partition.partition_path(),
            backup: BackupFileSystemJob::new(target.clone(), &file),
            file,
            status: OperationStatus::Pending,
        })
    }

    pub fn can_backup(tools: &dyn FileSystemTools, partition: &Partition) -> bool {
        !partition.is_mounted()
            && !partition.is_unallocated()
            && !partition.is_extended()
            && tools.support(partition.file_system.fs_type, FsCapability::Backup)
                != CommandSupportType::None
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl Operation for BackupOperation {
    fn description(&self) -> String {
        format!("Back up partition {} to {}", self.path, self.file.display())
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
        vec![&self.backup]
    }

    fn jobs_mut(&mut self) -> Vec<&mut dyn Job> {
        vec![&mut self.backup]
    }
}
