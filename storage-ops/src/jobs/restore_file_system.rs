// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use storage_contracts::Report;
use storage_sys::{CopySource, CopySourceFile, CopyTarget, CopyTargetDevice};
use storage_types::{
    CommandSupportType, FileSystem, FileSystemType, FsCapability, PartitionRef,
};

use super::{
    Job, JobContext, JobStatus, copy_with_progress, find_device, find_partition, job_status,
    query_partition_table,
};

/// Write an image file back onto a partition
///
/// An image carries no description of what it contains, so afterwards the
/// backend is asked which file system now starts at the partition's first
/// sector and the model is updated to match.
#[derive(Debug, Clone)]
pub struct RestoreFileSystemJob {
    partition: PartitionRef,
    file: PathBuf,
    status: JobStatus,
}

impl RestoreFileSystemJob {
    pub fn new(partition: PartitionRef, file: impl AsRef<Path>) -> Self {
        Self {
            partition,
            file: file.as_ref().to_path_buf(),
            status: JobStatus::Pending,
        }
    }
}

impl Job for RestoreFileSystemJob {
    job_status!();

    fn description(&self) -> String {
        format!(
            "Restore the file system from file {} to partition on {}",
            self.file.display(),
            self.partition.device_node
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };
        let path = partition.partition_path();

        if ctx.tools.support(partition.file_system.fs_type, FsCapability::Backup)
            == CommandSupportType::FileSystem
        {
            return ctx
                .tools
                .restore(report, &path, &partition.file_system, &self.file)
                .map_err(|e| report.line(e.to_string()))
                .is_ok();
        }

        let Some(device) = find_device(ctx, &self.partition.device_node, report) else {
            return false;
        };
        let mut source = CopySourceFile::new(&self.file);
        if let Err(e) = source.open() {
            report.line(format!(
                "Could not open backup file {} to restore from: {e}",
                self.file.display()
            ));
            return false;
        }
        let mut target = CopyTargetDevice::new(
            ctx.backend,
            &device,
            partition.first_byte(),
            partition.last_byte(),
        );
        if let Err(e) = target.open() {
            report.line(format!("Could not open partition {path} to restore to: {e}"));
            return false;
        }

        let description = self.description();
        if let Err(e) = copy_with_progress(ctx, &description, report, &mut source, &mut target) {
            report.line(format!("Restoring file system to partition {path} failed: {e}"));
            return false;
        }

        let sector_size = partition.sector_size.max(1);
        let image_sectors = source.length().div_ceil(sector_size).max(1);
        let detected = query_partition_table(ctx, &self.partition.device_node, report, |table, report| {
            table.detect_file_system_by_sector(report, &device, partition.first_sector)
        })
        .unwrap_or(FileSystemType::Unknown);
        report.line(format!("Detected a {} file system after the restore.", detected.name()));

        if let Ok(record) = ctx.devices.partition_mut(&self.partition) {
            record.file_system = FileSystem::new(
                detected,
                record.first_sector,
                record.first_sector + image_sectors - 1,
                sector_size,
            );
        }
        true
    }
}
