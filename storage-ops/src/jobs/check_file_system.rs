// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_types::{CommandSupportType, FsCapability, PartitionRef};

use super::{Job, JobContext, JobStatus, find_partition, job_status};

/// Check and repair a file system
///
/// File systems without a check tool count as healthy.
#[derive(Debug, Clone)]
pub struct CheckFileSystemJob {
    partition: PartitionRef,
    status: JobStatus,
}

impl CheckFileSystemJob {
    pub fn new(partition: PartitionRef) -> Self {
        Self {
            partition,
            status: JobStatus::Pending,
        }
    }

    pub fn partition(&self) -> &PartitionRef {
        &self.partition
    }

    pub fn set_partition(&mut self, partition: PartitionRef) {
        self.partition = partition;
    }
}

impl Job for CheckFileSystemJob {
    job_status!();

    fn description(&self) -> String {
        format!("Check file system on partition on {}", self.partition.device_node)
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };
        let fs = &partition.file_system;
        let path = partition.partition_path();

        if partition.is_mounted() {
            report.line(format!("Partition {path} is mounted: check skipped."));
            return true;
        }
        if ctx.tools.support(fs.fs_type, FsCapability::Check) != CommandSupportType::FileSystem {
            report.line(format!(
                "There is no check tool for {} file systems: check skipped.",
                fs.name()
            ));
            return true;
        }

        match ctx.tools.check(report, &path, fs) {
            Ok(()) => true,
            Err(e) => {
                report.line(format!("Checking file system on partition {path} failed: {e}"));
                false
            }
        }
    }
}
