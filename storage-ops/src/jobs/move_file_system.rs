// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_sys::{CopySource, CopySourceDevice, CopyTarget, CopyTargetDevice, rollback_copy_blocks};
use storage_types::{CommandSupportType, FsCapability, PartitionRef};

use super::{
    Job, JobContext, JobStatus, copy_with_progress, find_device, find_partition, job_status,
};

/// Move a file system to a new start sector
///
/// Uses the file system's own tool when it has one, otherwise copies the data
/// block by block and rolls the copy back if it fails halfway.
#[derive(Debug, Clone)]
pub struct MoveFileSystemJob {
    partition: PartitionRef,
    new_start: u64,
    status: JobStatus,
}

impl MoveFileSystemJob {
    pub fn new(partition: PartitionRef, new_start: u64) -> Self {
        Self {
            partition,
            new_start,
            status: JobStatus::Pending,
        }
    }

    fn copy_data(&self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };
        let Some(device) = find_device(ctx, &self.partition.device_node, report) else {
            return false;
        };
        let fs = &partition.file_system;
        let path = partition.partition_path();
        let sector_size = fs.sector_size;

        let mut source = CopySourceDevice::new(ctx.backend, &device, fs.first_byte(), fs.last_byte());
        let mut target = CopyTargetDevice::new(
            ctx.backend,
            &device,
            self.new_start * sector_size,
            (self.new_start + fs.length()) * sector_size - 1,
        );
        if let Err(e) = source.open() {
            report.line(format!(
                "Could not open file system on partition {path} for moving: {e}"
            ));
            return false;
        }
        if let Err(e) = target.open() {
            report.line(format!(
                "Could not create target for moving file system on partition {path}: {e}"
            ));
            return false;
        }

        let description = self.description();
        let copied = copy_with_progress(ctx, &description, report, &mut source, &mut target);
        let ok = match copied {
            Ok(()) => true,
            Err(e) => {
                report.line(format!("Moving the data of partition {path} failed: {e}"));
                if rollback_copy_blocks(
                    report,
                    ctx.backend,
                    &source,
                    &target,
                    ctx.config.copy_block_size,
                )
                .is_err()
                {
                    report.line(format!(
                        "Rollback for file system on partition {path} failed."
                    ));
                }
                false
            }
        };
        report.line("Closing device. This may take a few seconds.");
        ok
    }
}

impl Job for MoveFileSystemJob {
    job_status!();

    fn description(&self) -> String {
        format!(
            "Move the file system on partition on {} to sector {}",
            self.partition.device_node, self.new_start
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };
        let fs = partition.file_system.clone();
        let path = partition.partition_path();

        if fs.first_sector == self.new_start {
            report.line("The file system is already at the requested start sector.");
            return true;
        }

        let moved = match ctx.tools.support(fs.fs_type, FsCapability::Move) {
            CommandSupportType::FileSystem => ctx
                .tools
                .move_fs(report, &path, &fs, self.new_start)
                .map_err(|e| report.line(e.to_string()))
                .is_ok(),
            CommandSupportType::Core | CommandSupportType::Backend => self.copy_data(ctx, report),
            CommandSupportType::None => {
                report.line(format!(
                    "The file system on partition {path} cannot be moved because there is no support for it."
                ));
                false
            }
        };
        if !moved {
            return false;
        }

        let mut moved_fs = fs;
        moved_fs.set_first_sector_keep_length(self.new_start);
        if let Ok(record) = ctx.devices.partition_mut(&self.partition) {
            record.file_system = moved_fs.clone();
        }
        if let Err(e) = ctx.tools.update_boot_sector(report, &path, &moved_fs) {
            report.line(format!(
                "Updating boot sector for file system on partition {path} failed: {e}"
            ));
        }
        true
    }
}
