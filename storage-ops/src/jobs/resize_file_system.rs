// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_types::{CommandSupportType, FsCapability, PartitionRef};

use super::{Job, JobContext, JobStatus, edit_partition_table, find_partition, job_status};

/// Resize a file system in place, or grow it to fill its partition
#[derive(Debug, Clone)]
pub struct ResizeFileSystemJob {
    partition: PartitionRef,
    /// Sectors; `None` fills the partition
    new_length: Option<u64>,
    status: JobStatus,
}

impl ResizeFileSystemJob {
    pub fn new(partition: PartitionRef, new_length: u64) -> Self {
        Self {
            partition,
            new_length: Some(new_length),
            status: JobStatus::Pending,
        }
    }

    pub fn maximize(partition: PartitionRef) -> Self {
        Self {
            partition,
            new_length: None,
            status: JobStatus::Pending,
        }
    }

    pub fn is_maximizing(&self) -> bool {
        self.new_length.is_none()
    }
}

impl Job for ResizeFileSystemJob {
    job_status!();

    fn description(&self) -> String {
        match self.new_length {
            Some(length) => format!(
                "Resize file system on partition on {} to {length} sectors",
                self.partition.device_node
            ),
            None => format!(
                "Maximize file system on partition on {} to fill the partition",
                self.partition.device_node
            ),
        }
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };
        let fs = &partition.file_system;
        let path = partition.partition_path();
        let room = (partition.last_sector + 1).saturating_sub(fs.first_sector);
        let new_length = self.new_length.unwrap_or(room);

        if new_length > partition.length() {
            report.line(format!(
                "The new length of {new_length} sectors does not fit into partition {path}."
            ));
            return false;
        }
        if fs.length() == new_length {
            report.line(format!(
                "The file system on partition {path} already has the requested length of {new_length} sectors."
            ));
            return true;
        }

        report.line(format!(
            "Resizing file system from {} to {new_length} sectors.",
            fs.length()
        ));
        let (capability, online) = if new_length < fs.length() {
            (FsCapability::Shrink, FsCapability::ShrinkOnline)
        } else {
            (FsCapability::Grow, FsCapability::GrowOnline)
        };

        let resized = match ctx.tools.support(fs.fs_type, capability) {
            CommandSupportType::Backend => {
                let child = report.child(format!(
                    "Resizing a {} file system using internal backend functions.",
                    fs.name()
                ));
                edit_partition_table(ctx, &self.partition.device_node, child, |table, report| {
                    table.resize_file_system(report, &partition, new_length)
                })
                .is_some()
            }
            CommandSupportType::FileSystem => match &partition.mount_point {
                Some(mount_point) => {
                    if ctx.tools.support(fs.fs_type, online) == CommandSupportType::FileSystem {
                        ctx.tools
                            .resize_online(report, &path, mount_point, fs, new_length)
                            .map_err(|e| report.line(e.to_string()))
                            .is_ok()
                    } else {
                        report.line(format!(
                            "The file system on partition {path} cannot be resized while it is mounted."
                        ));
                        false
                    }
                }
                None => ctx
                    .tools
                    .resize(report, &path, fs, new_length)
                    .map_err(|e| report.line(e.to_string()))
                    .is_ok(),
            },
            CommandSupportType::Core => true,
            CommandSupportType::None => {
                report.line(format!(
                    "The file system on partition {path} cannot be resized because there is no support for it."
                ));
                false
            }
        };

        if resized && let Ok(record) = ctx.devices.partition_mut(&self.partition) {
            record.file_system.last_sector = record.file_system.first_sector + new_length - 1;
        }
        resized
    }
}
