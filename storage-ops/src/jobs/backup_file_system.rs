// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use storage_contracts::Report;
use storage_sys::{CopySource, CopySourceDevice, CopyTarget, CopyTargetFile};
use storage_types::{CommandSupportType, FsCapability, PartitionRef};

use super::{
    Job, JobContext, JobStatus, copy_with_progress, find_device, find_partition, job_status,
};

/// Write a file system into an image file
#[derive(Debug, Clone)]
pub struct BackupFileSystemJob {
    partition: PartitionRef,
    file: PathBuf,
    status: JobStatus,
}

impl BackupFileSystemJob {
    pub fn new(partition: PartitionRef, file: impl AsRef<Path>) -> Self {
        Self {
            partition,
            file: file.as_ref().to_path_buf(),
            status: JobStatus::Pending,
        }
    }
}

impl Job for BackupFileSystemJob {
    job_status!();

    fn description(&self) -> String {
        format!(
            "Back up file system on partition on {} to {}",
            self.partition.device_node,
            self.file.display()
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };
        let fs = &partition.file_system;
        let path = partition.partition_path();

        match ctx.tools.support(fs.fs_type, FsCapability::Backup) {
            CommandSupportType::FileSystem => ctx
                .tools
                .backup(report, &path, fs, &self.file)
                .map_err(|e| report.line(e.to_string()))
                .is_ok(),
            CommandSupportType::Core | CommandSupportType::Backend => {
                let Some(device) = find_device(ctx, &self.partition.device_node, report) else {
                    return false;
                };
                let mut source = CopySourceDevice::new(ctx.backend, &device, fs.first_byte(), fs.last_byte());
                let mut target = CopyTargetFile::new(&self.file);
                if let Err(e) = source.open() {
                    report.line(format!(
                        "Could not open file system on source partition {path} for backup: {e}"
                    ));
                    return false;
                }
                if let Err(e) = target.open() {
                    report.line(format!(
                        "Could not create backup file {}: {e}",
                        self.file.display()
                    ));
                    return false;
                }

                let description = self.description();
                let copied = copy_with_progress(ctx, &description, report, &mut source, &mut target)
                    .and_then(|()| target.sync());
                match copied {
                    Ok(()) => true,
                    Err(e) => {
                        report.line(format!("Backing up partition {path} failed: {e}"));
                        false
                    }
                }
            }
            CommandSupportType::None => {
                report.line(format!(
                    "Backing up a {} file system is not supported.",
                    fs.name()
                ));
                false
            }
        }
    }
}
