// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_types::{CommandSupportType, DeviceType, FileSystemType, FsCapability, PartitionRef};

use super::{Job, JobContext, JobStatus, edit_partition_table, find_partition, job_status};

#[derive(Debug, Clone)]
pub struct CreateFileSystemJob {
    partition: PartitionRef,
    status: JobStatus,
}

impl CreateFileSystemJob {
    pub fn new(partition: PartitionRef) -> Self {
        Self {
            partition,
            status: JobStatus::Pending,
        }
    }
}

impl Job for CreateFileSystemJob {
    job_status!();

    fn description(&self) -> String {
        format!("Create file system on partition on {}", self.partition.device_node)
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };
        let fs = &partition.file_system;
        if matches!(fs.fs_type, FileSystemType::Unformatted | FileSystemType::Extended) {
            return true;
        }

        let path = partition.partition_path();
        if ctx.tools.support(fs.fs_type, FsCapability::Create) != CommandSupportType::FileSystem {
            report.line(format!(
                "Creating a {} file system is not supported.",
                fs.name()
            ));
            return false;
        }
        report.line(format!("Creating {} file system on {path}.", fs.name()));
        if let Err(e) = ctx.tools.create(report, &path, fs) {
            report.line(format!("Failed to create file system on partition {path}: {e}"));
            return false;
        }

        let device_type = match ctx.devices.device(&self.partition.device_node) {
            Ok(device) => device.device_type(),
            Err(e) => {
                report.line(e.to_string());
                return false;
            }
        };
        if matches!(device_type, DeviceType::Disk | DeviceType::SoftwareRaid) {
            let typed = edit_partition_table(ctx, &self.partition.device_node, report, |table, report| {
                table.set_partition_system_type(report, &partition)
            });
            if typed.is_none() {
                report.line(format!(
                    "Failed to set the system type for the file system on partition {path}."
                ));
                return false;
            }
        }

        if ctx.tools.support(fs.fs_type, FsCapability::ReadUuid) == CommandSupportType::FileSystem
            && let Ok(uuid) = ctx.tools.read_uuid(&path, fs)
            && let Ok(record) = ctx.devices.partition_mut(&self.partition)
        {
            record.file_system.uuid = uuid;
        }
        true
    }
}
