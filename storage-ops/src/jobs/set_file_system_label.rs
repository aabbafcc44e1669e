// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_types::{CommandSupportType, FsCapability, PartitionRef};

use super::{Job, JobContext, JobStatus, find_partition, job_status};

/// Write a file system label
///
/// A file system that cannot carry a label is left alone and the job still
/// succeeds, so operations never have to check for support first.
#[derive(Debug, Clone)]
pub struct SetFileSystemLabelJob {
    partition: PartitionRef,
    label: String,
    status: JobStatus,
}

impl SetFileSystemLabelJob {
    pub fn new(partition: PartitionRef, label: impl Into<String>) -> Self {
        Self {
            partition,
            label: label.into(),
            status: JobStatus::Pending,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }
}

impl Job for SetFileSystemLabelJob {
    job_status!();

    fn description(&self) -> String {
        format!(
            "Set the file system label on partition on {} to \"{}\"",
            self.partition.device_node, self.label
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };
        let fs = &partition.file_system;
        let path = partition.partition_path();

        let written = match ctx.tools.support(fs.fs_type, FsCapability::WriteLabel) {
            CommandSupportType::None => {
                report.line(format!(
                    "File system on partition {path} does not support setting labels. Job ignored."
                ));
                return true;
            }
            CommandSupportType::Core | CommandSupportType::Backend => Ok(()),
            CommandSupportType::FileSystem => match &partition.mount_point {
                Some(mount_point)
                    if ctx.tools.support(fs.fs_type, FsCapability::WriteLabelOnline)
                        == CommandSupportType::FileSystem =>
                {
                    ctx.tools
                        .write_label_online(report, &path, mount_point, fs, &self.label)
                }
                Some(_) => {
                    report.line(format!(
                        "The label of {path} cannot be changed while it is mounted."
                    ));
                    return false;
                }
                None => ctx.tools.write_label(report, &path, fs, &self.label),
            },
        };

        if let Err(e) = written {
            report.line(format!("Setting the label on partition {path} failed: {e}"));
            return false;
        }
        if let Ok(record) = ctx.devices.partition_mut(&self.partition) {
            record.file_system.label = self.label.clone();
        }
        true
    }
}
