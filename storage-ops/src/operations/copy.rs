// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{FileSystemTools, Report};
use storage_types::{
    CommandSupportType, DetachedPartition, DeviceSet, FileSystem, FsCapability, Partition,
    PartitionRef, PartitionRole, PartitionState,
};

use super::{
    Operation, OperationStatus, find_destination, finish, insert_preview_partition,
    operation_status, remove_preview_partition,
};
use crate::error::Result;
use crate::jobs::{
    CheckFileSystemJob, CopyFileSystemJob, CreatePartitionJob, DeletePartitionJob, Job,
    JobContext, ResizeFileSystemJob, run_job,
};

/// Paste a partition's file system into free space or over another partition
#[derive(Debug, Clone)]
pub struct CopyOperation {
    target_device: String,
    copied: PartitionRef,
    source: PartitionRef,
    source_path: String,
    /// The copy while it is not part of the preview
    pending: Option<DetachedPartition>,
    /// Partition the copy replaces, if it was not pasted into free space
    overwritten: Option<PartitionRef>,
    overwritten_detached: Option<DetachedPartition>,
    check_source: CheckFileSystemJob,
    create_partition: Option<CreatePartitionJob>,
    copy_file_system: CopyFileSystemJob,
    check_target: CheckFileSystemJob,
    maximize: ResizeFileSystemJob,
    status: OperationStatus,
}

impl CopyOperation {
    /// `copied` is the record built by [`CopyOperation::create_copy`]
    pub fn new(devices: &DeviceSet, mut copied: Partition, source: &PartitionRef) -> Result<Self> {
        let target_device = copied.device_path.clone();
        let source_path = devices.partition(source)?.partition_path();
        let destination = find_destination(devices, &target_device, copied.first_sector)?;

        let mut overwritten = None;
        if !destination.is_unallocated() {
            copied.last_sector = destination.last_sector;
            copied.file_system.last_sector = destination.last_sector;
            copied.number = destination.number;
            copied.set_parent(destination.parent());
            overwritten = Some(destination.reference());
        }
        copied.state = PartitionState::Copy;

        let reference = copied.reference();
        let create_partition = overwritten
            .is_none()
            .then(|| CreatePartitionJob::new(reference.clone()));

        Ok(Self {
            target_device,
            copied: reference.clone(),
            source: source.clone(),
            source_path,
            pending: Some(DetachedPartition::new(copied)),
            overwritten,
            overwritten_detached: None,
            check_source: CheckFileSystemJob::new(source.clone()),
            create_partition,
            copy_file_system: CopyFileSystemJob::new(reference.clone(), source.clone()),
            check_target: CheckFileSystemJob::new(reference.clone()),
            maximize: ResizeFileSystemJob::maximize(reference),
            status: OperationStatus::Pending,
        })
    }

    /// The partition record a paste of `source` onto `target` would produce
    ///
    /// Pasting into free space takes only as much of it as the source needs.
    pub fn create_copy(target: &Partition, source: &Partition) -> Partition {
        let first = target.first_sector;
        let last = if target.is_unallocated() {
            (first + source.length() - 1).min(target.last_sector)
        } else {
            target.last_sector
        };

        let mut roles = target.roles;
        roles.remove(PartitionRole::Unallocated);
        if roles.is_empty() {
            roles = PartitionRole::Primary.into();
        }

        let file_system = FileSystem::new(
            source.file_system.fs_type,
            first,
            last,
            target.sector_size,
        )
        .with_label(source.file_system.label.clone())
        .with_uuid(source.file_system.uuid.clone());

        let mut copy = Partition::new(
            target.device_path.clone(),
            target.parent(),
            roles,
            file_system,
            first,
            last,
        );
        copy.available_flags = source.available_flags;
        copy.state = PartitionState::Copy;
        copy
    }

    pub fn can_copy(tools: &dyn FileSystemTools, partition: &Partition) -> bool {
        if partition.is_unallocated() || partition.is_extended() || partition.is_mounted() {
            return false;
        }
        if matches!(
            partition.state,
            PartitionState::New | PartitionState::Copy | PartitionState::Restore
        ) {
            return false;
        }
        tools.support(partition.file_system.fs_type, FsCapability::Copy) != CommandSupportType::None
    }

    /// Whether `source` fits onto `target`
    pub fn can_paste(target: &Partition, source: &Partition) -> bool {
        if target.is_extended() || target.is_mounted() {
            return false;
        }
        if target.reference() == source.reference() {
            return false;
        }
        if target.length() < source.length() {
            return false;
        }
        if !target.is_unallocated() {
            return true;
        }
        // Free space inside an extended partition needs room for the logical's boot record
        !target.is_logical() || target.length() > source.length()
    }

    pub fn copied(&self) -> &PartitionRef {
        &self.copied
    }

    pub fn source(&self) -> &PartitionRef {
        &self.source
    }

    pub fn overwritten(&self) -> Option<&PartitionRef> {
        self.overwritten.as_ref()
    }

    /// Read from another partition instead, used when copying a copy
    pub fn set_source(&mut self, devices: &DeviceSet, source: PartitionRef) -> Result<()> {
        self.source_path = devices.partition(&source)?.partition_path();
        self.check_source.set_partition(source.clone());
        self.copy_file_system.set_source(source.clone());
        self.source = source;
        Ok(())
    }

    fn cleanup(&self, ctx: &mut JobContext<'_>, report: &mut Report) {
        let Ok(copied) = ctx.devices.partition(&self.copied).cloned() else {
            return;
        };
        let mut delete = DeletePartitionJob::new(copied);
        if !run_job(&mut delete, ctx, report) {
            report.line(format!(
                "Cleaning up failed: Could not delete the partially copied partition on {}.",
                self.target_device
            ));
        }
    }
}

impl Operation for CopyOperation {
    fn description(&self) -> String {
        match &self.overwritten {
            Some(_) => format!(
                "Copy partition {} over a partition on {}",
                self.source_path, self.target_device
            ),
            None => format!(
                "Copy partition {} to a new partition on {}",
                self.source_path, self.target_device
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
                &self.target_device,
                overwritten.id,
                &mut self.overwritten_detached,
            )?;
        }
        insert_preview_partition(devices, &self.target_device, &mut self.pending)
    }

    fn undo(&mut self, devices: &mut DeviceSet) -> Result<()> {
        if self.pending.is_some() {
            return Ok(());
        }
        remove_preview_partition(devices, &self.target_device, self.copied.id, &mut self.pending)?;
        insert_preview_partition(devices, &self.target_device, &mut self.overwritten_detached)
    }

    fn targets_device(&self, device_node: &str) -> bool {
        self.target_device == device_node || self.source.device_node == device_node
    }

    fn targets_partition(&self, partition: &PartitionRef) -> bool {
        self.copied == *partition
            || self.source == *partition
            || self.overwritten.as_ref() == Some(partition)
    }

    fn jobs(&self) -> Vec<&dyn Job> {
        let mut jobs: Vec<&dyn Job> = vec![&self.check_source];
        if let Some(job) = &self.create_partition {
            jobs.push(job);
        }
        jobs.push(&self.copy_file_system);
        jobs.push(&self.check_target);
        jobs.push(&self.maximize);
        jobs
    }

    fn jobs_mut(&mut self) -> Vec<&mut dyn Job> {
        let mut jobs: Vec<&mut dyn Job> = vec![&mut self.check_source];
        if let Some(job) = &mut self.create_partition {
            jobs.push(job);
        }
        jobs.push(&mut self.copy_file_system);
        jobs.push(&mut self.check_target);
        jobs.push(&mut self.maximize);
        jobs
    }

    fn execute(&mut self, ctx: &mut JobContext<'_>, parent: &mut Report) -> bool {
        let description = self.description();
        let report = parent.child(description.clone());
        let mut warning = false;

        let ok = if !run_job(&mut self.check_source, ctx, report) {
            report.line(format!("Could not check source partition {}.", self.source_path));
            false
        } else if let Some(job) = &mut self.create_partition
            && !run_job(job, ctx, report)
        {
            report.line(format!(
                "Could not create target partition on {}.",
                self.target_device
            ));
            false
        } else {
            if let Ok(record) = ctx.devices.partition_mut(&self.copied) {
                record.state = PartitionState::None;
            }

            if !run_job(&mut self.copy_file_system, ctx, report) {
                report.line(format!(
                    "Copying source partition {} to the target partition failed.",
                    self.source_path
                ));
                if self.create_partition.is_some() {
                    self.cleanup(ctx, report);
                }
                false
            } else if !run_job(&mut self.check_target, ctx, report) {
                report.line("Checking target partition after copy failed.");
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
