// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_sys::{CopySource, CopySourceShred, CopyTarget, CopyTargetDevice, ShredPattern};
use storage_types::Partition;

use super::{
    Job, JobContext, JobStatus, TrackedPartition, copy_with_progress, find_device, job_status,
};

/// Overwrite a file system with zeros or random data
#[derive(Debug, Clone)]
pub struct ShredFileSystemJob {
    partition: TrackedPartition,
    pattern: ShredPattern,
    status: JobStatus,
}

impl ShredFileSystemJob {
    pub fn new(partition: Partition, pattern: ShredPattern) -> Self {
        Self {
            partition: TrackedPartition::new(partition),
            pattern,
            status: JobStatus::Pending,
        }
    }
}

impl Job for ShredFileSystemJob {
    job_status!();

    fn description(&self) -> String {
        format!(
            "Shred the file system on {}",
            self.partition.snapshot().partition_path()
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let partition = self.partition.resolve(ctx.devices);
        if partition.is_extended() {
            return true;
        }
        let path = partition.partition_path();
        let Some(device) = find_device(ctx, &partition.device_path, report) else {
            return false;
        };
        let fs = &partition.file_system;

        let mut target = CopyTargetDevice::new(ctx.backend, &device, fs.first_byte(), fs.last_byte());
        if let Err(e) = target.open() {
            report.line(format!(
                "Could not open file system on partition {path} for shredding: {e}"
            ));
            return false;
        }
        let mut source = CopySourceShred::new(fs.capacity().bytes(), self.pattern);
        if let Err(e) = source.open() {
            report.line(format!("Could not open {} for shredding: {e}", source.describe()));
            return false;
        }

        let description = self.description();
        let copied = copy_with_progress(ctx, &description, report, &mut source, &mut target);
        report.line("Closing device. This may take a few seconds.");
        if let Err(e) = copied {
            report.line(format!("Shredding file system on partition {path} failed: {e}"));
            return false;
        }
        true
    }
}
