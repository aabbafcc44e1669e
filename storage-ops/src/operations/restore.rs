// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use storage_contracts::Report;
use storage_types::{
    DetachedPartition, Device, DeviceSet, FileSystem, FileSystemType, NodeRef, Partition,
    PartitionRef, PartitionRole, PartitionState,
};

use super::{
    Operation, OperationStatus, find_destination, finish, insert_preview_partition,
    operation_status, remove_preview_partition,
};
use crate::error::{OperationError, Result};
use crate::jobs::{
    CheckFileSystemJob, CreatePartitionJob, DeletePartitionJob, Job, JobContext,
    ResizeFileSystemJob, RestoreFileSystemJob, run_job,
};

/// Write a backup image into free space or over an existing partition
#[derive(Debug, Clone)]
pub struct RestoreOperation {
    device_node: String,
    partition: PartitionRef,
    file: PathBuf,
    /// The restored partition while it is not part of the preview
    pending: Option<DetachedPartition>,
    overwritten: Option<PartitionRef>,
    overwritten_detached: Option<DetachedPartition>,
    create_partition: Option<CreatePartitionJob>,
    restore: RestoreFileSystemJob,
    check_target: CheckFileSystemJob,
    maximize: ResizeFileSystemJob,
    status: OperationStatus,
}

impl RestoreOperation {
    /// `partition` is the record built by [`RestoreOperation::create_restore_partition`]
    pub fn new(devices: &DeviceSet, mut partition: Partition, file: impl AsRef<Path>) -> Result<Self> {
        let device_node = partition.device_path.clone();
        let destination = find_destination(devices, &device_node, partition.first_sector)?;

        let mut overwritten = None;
        if !destination.is_unallocated() {
            partition.last_sector = destination.last_sector;
            partition.file_system.last_sector = destination.last_sector;
            partition.number = destination.number;
            partition.set_parent(destination.parent());
            overwritten = Some(destination.reference());
        }
        partition.state = PartitionState::Restore;

        let reference = partition.reference();
        let file = file.as_ref().to_path_buf();
        Ok(Self {
            device_node,
            partition: reference.clone(),
            create_partition: overwritten
                .is_none()
                .then(|| CreatePartitionJob::new(reference.clone())),
            restore: RestoreFileSystemJob::new(reference.clone(), &file),
            check_target: CheckFileSystemJob::new(reference.clone()),
            maximize: ResizeFileSystemJob::maximize(reference),
            file,
            pending: Some(DetachedPartition::new(partition)),
            overwritten,
            overwritten_detached: None,
            status: OperationStatus::Pending,
        })
    }

    /// A partition record starting at `start` just large enough for the image
    pub fn create_restore_partition(
        device: &Device,
        parent: NodeRef,
        start: u64,
        file: &Path,
    ) -> Result<Partition> {
        let image_length = std::fs::metadata(file)
            .map_err(|source| OperationError::Image {
                path: file.to_path_buf(),
                source,
            })?
            .len();
        let sector_size = device.logical_sector_size.max(1);
        let sectors = image_length.div_ceil(sector_size).max(1);
        let end = start + sectors - 1;

        let role = match parent {
            NodeRef::Root => PartitionRole::Primary,
            NodeRef::Partition(_) => PartitionRole::Logical,
        };
        let fs = FileSystem::new(FileSystemType::Unknown, start, end, sector_size);
        Ok(Partition::new(device.device_node.clone(), parent, role.into(), fs, start, end)
            .with_state(PartitionState::Restore))
    }

    pub fn can_restore(partition: &Partition) -> bool {
        !partition.is_mounted()
            && !partition.is_extended()
            && !partition.roles.contains(PartitionRole::LvmLv)
    }

    pub fn partition(&self) -> &PartitionRef {
        &self.partition
    }

    pub fn overwritten(&self) -> Option<&PartitionRef> {
        self.overwritten.as_ref()
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl Operation for RestoreOperation {
    fn description(&self) -> String {
        match &self.overwritten {
            Some(_) => format!(
                "Restore partition from {} over a partition on {}",
                self.file.display(),
                self.device_node
            ),
            None => format!(
                "Restore partition from {} to a new partition on {}",
                self.file.display(),
                self.device_node
            ),
        }
    }

    operation_status!();

    fn preview(&mut self, devices: &mut DeviceSet) -> Result<()> {
        if self.pending.is_none() {
            return Ok(());
        }
        if let Some(overwritten) = &self.overwritten {
            remove_preview_partition(
                devices,
                &self.device_node,
                overwritten.id,
                &mut self.overwritten_detached,
            )?;
        }
        insert_preview_partition(devices, &self.device_node, &mut self.pending)
    }

    fn undo(&mut self, devices: &mut DeviceSet) -> Result<()> {
        if self.pending.is_some() {
            return Ok(());
        }
        remove_preview_partition(devices, &self.device_node, self.partition.id, &mut self.pending)?;
        insert_preview_partition(devices, &self.device_node, &mut self.overwritten_detached)
    }

    fn targets_device(&self, device_node: &str) -> bool {
        self.device_node == device_node
    }

    fn targets_partition(&self, partition: &PartitionRef) -> bool {
        self.partition == *partition || self.overwritten.as_ref() == Some(partition)
    }

    fn jobs(&self) -> Vec<&dyn Job> {
        let mut jobs: Vec<&dyn Job> = Vec::new();
        if let Some(job) = &self.create_partition {
            jobs.push(job);
        }
        jobs.push(&self.restore);
        jobs.push(&self.check_target);
        jobs.push(&self.maximize);
        jobs
    }

    fn jobs_mut(&mut self) -> Vec<&mut dyn Job> {
        let mut jobs: Vec<&mut dyn Job> = Vec::new();
        if let Some(job) = &mut self.create_partition {
            jobs.push(job);
        }
        jobs.push(&mut self.restore);
        jobs.push(&mut self.check_target);
        jobs.push(&mut self.maximize);
        jobs
    }

    fn execute(&mut self, ctx: &mut JobContext<'_>, parent: &mut Report) -> bool {
        let description = self.description();
        let report = parent.child(description.clone());
        let mut warning = false;

        let created = match &mut self.create_partition {
            Some(job) => run_job(job, ctx, report),
            None => true,
        };

        let ok = if !created {
            false
        } else {
            if let Ok(record) = ctx.devices.partition_mut(&self.partition) {
                record.state = PartitionState::None;
            }

            if !run_job(&mut self.restore, ctx, report) {
                if self.create_partition.is_some()
                    && let Ok(record) = ctx.devices.partition(&self.partition).cloned()
                {
                    let mut cleanup = DeletePartitionJob::new(record);
                    run_job(&mut cleanup, ctx, report);
                }
                report.line("Restoring file system failed.");
                false
            } else if !run_job(&mut self.check_target, ctx, report) {
                report.line("Checking target file system after the restore failed.");
                false
            } else {
                if !run_job(&mut self.maximize, ctx, report) {
                    report.line(
                        "Warning: Maximizing file system on target partition to the size of the partition failed.",
                    );
                    warning = true;
                }
                true
            }
        };

        let status = match (ok, warning) {
            (false, _) => OperationStatus::Error,
            (true, true) => OperationStatus::FinishedWarning,
            (true, false) => OperationStatus::FinishedSuccess,
        };
        finish(self, report, &description, status);
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::fixtures::{SDA, by_number, free_at, layout, populated_disk};

    #[test]
    fn restore_partitions_are_sized_from_the_image() {
        let devices = populated_disk();
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("backup.img");
        std::fs::write(&image, vec![0u8; 1_000_000]).unwrap();

        let device = devices.device(SDA).unwrap();
        let p = RestoreOperation::create_restore_partition(device, NodeRef::Root, 900_000, &image)
            .unwrap();
        assert_eq!(p.length(), 1954);
        assert_eq!(p.state, PartitionState::Restore);
        assert!(p.roles.contains(PartitionRole::Primary));

        let missing = dir.path().join("missing.img");
        assert!(matches!(
            RestoreOperation::create_restore_partition(device, NodeRef::Root, 900_000, &missing),
            Err(OperationError::Image { .. })
        ));
    }

    #[test]
    fn restoring_over_a_partition_hides_it_until_undo() {
        let mut devices = populated_disk();
        let before = layout(&devices);
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("backup.img");
        std::fs::write(&image, vec![0u8; 4096]).unwrap();

        let sda1 = by_number(&devices, 1);
        let device = devices.device(SDA).unwrap();
        let p = RestoreOperation::create_restore_partition(device, NodeRef::Root, 2048, &image)
            .unwrap();
        let mut op = RestoreOperation::new(&devices, p, &image).unwrap();
        assert_eq!(op.overwritten(), Some(&sda1));
        assert_eq!(op.jobs().len(), 3);

        op.preview(&mut devices).unwrap();
        assert!(devices.partition(&sda1).is_err());
        assert_eq!(devices.partition(op.partition()).unwrap().last_sector, 206_847);

        op.undo(&mut devices).unwrap();
        assert_eq!(layout(&devices), before);
    }

    #[test]
    fn restoring_into_free_space_creates_a_partition() {
        let mut devices = populated_disk();
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("backup.img");
        std::fs::write(&image, vec![0u8; 2048 * 512]).unwrap();

        let free = free_at(&devices, 900_000);
        let device = devices.device(SDA).unwrap();
        let p = RestoreOperation::create_restore_partition(
            device,
            free.parent(),
            free.first_sector,
            &image,
        )
        .unwrap();
        let mut op = RestoreOperation::new(&devices, p, &image).unwrap();
        assert!(op.overwritten().is_none());
        op.preview(&mut devices).unwrap();
        assert_eq!(devices.partition(op.partition()).unwrap().length(), 2048);
    }
}
