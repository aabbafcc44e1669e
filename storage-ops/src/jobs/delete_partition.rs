// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_types::Partition;

use super::{Job, JobContext, JobStatus, TrackedPartition, edit_partition_table, job_status};

#[derive(Debug, Clone)]
pub struct DeletePartitionJob {
    partition: TrackedPartition,
    status: JobStatus,
}

impl DeletePartitionJob {
    pub fn new(partition: Partition) -> Self {
        Self {
            partition: TrackedPartition::new(partition),
            status: JobStatus::Pending,
        }
    }
}

impl Job for DeletePartitionJob {
    job_status!();

    fn description(&self) -> String {
        format!("Delete the partition {}", self.partition.snapshot().partition_path())
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let partition = self.partition.resolve(ctx.devices);
        let deleted = edit_partition_table(ctx, &partition.device_path, report, |table, report| {
            table.delete_partition(report, &partition)
        });
        if deleted.is_none() {
            report.line(format!(
                "Could not delete partition {}.",
                partition.partition_path()
            ));
            return false;
        }
        true
    }
}
