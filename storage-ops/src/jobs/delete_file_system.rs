// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_types::{DeviceType, FileSystem, Partition};

use super::{Job, JobContext, JobStatus, TrackedPartition, edit_partition_table, job_status};

/// Remove a file system and wipe its signature from the partition
///
/// The file system to remove is fixed when the job is built, so replacing the
/// file system in the preview does not change what gets wiped.
#[derive(Debug, Clone)]
pub struct DeleteFileSystemJob {
    partition: TrackedPartition,
    file_system: FileSystem,
    status: JobStatus,
}

impl DeleteFileSystemJob {
    pub fn new(partition: Partition) -> Self {
        let file_system = partition.file_system.clone();
        Self {
            partition: TrackedPartition::new(partition),
            file_system,
            status: JobStatus::Pending,
        }
    }
}

impl Job for DeleteFileSystemJob {
    job_status!();

    fn description(&self) -> String {
        format!(
            "Delete file system on {}",
            self.partition.snapshot().partition_path()
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let mut partition = self.partition.resolve(ctx.devices);
        if partition.is_extended() {
            return true;
        }
        partition.file_system = self.file_system.clone();
        let path = partition.partition_path();

        if let Err(e) = ctx.tools.remove(report, &path, &self.file_system) {
            report.line(format!("Failed to delete file system on partition {path}: {e}"));
            return false;
        }

        let device_type = ctx
            .devices
            .device(&partition.device_path)
            .map(|d| d.device_type())
            .unwrap_or(DeviceType::Unknown);
        if matches!(device_type, DeviceType::Disk | DeviceType::SoftwareRaid) {
            let clobbered = edit_partition_table(ctx, &partition.device_path, report, |table, report| {
                table.clobber_file_system(report, &partition)
            });
            if clobbered.is_none() {
                report.line(format!(
                    "Failed to delete file system signature on partition {path}."
                ));
                return false;
            }
        }
        true
    }
}
