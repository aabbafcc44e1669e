// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_types::PartitionRef;

use super::{Job, JobContext, JobStatus, edit_partition_table, find_partition, job_status};

/// Move a partition's boundaries on disk; the file system is left alone
#[derive(Debug, Clone)]
pub struct SetPartGeometryJob {
    partition: PartitionRef,
    new_start: u64,
    new_length: u64,
    status: JobStatus,
}

impl SetPartGeometryJob {
    pub fn new(partition: PartitionRef, new_start: u64, new_length: u64) -> Self {
        Self {
            partition,
            new_start,
            new_length,
            status: JobStatus::Pending,
        }
    }

    pub fn new_start(&self) -> u64 {
        self.new_start
    }

    pub fn new_length(&self) -> u64 {
        self.new_length
    }
}

impl Job for SetPartGeometryJob {
    job_status!();

    fn description(&self) -> String {
        format!(
            "Set geometry of partition on {}: start sector {}, length {}",
            self.partition.device_node, self.new_start, self.new_length
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };
        let new_last = self.new_start + self.new_length.saturating_sub(1);

        let updated = edit_partition_table(ctx, &self.partition.device_node, report, |table, report| {
            table.update_geometry(report, &partition, self.new_start, new_last)
        });
        if updated.is_none() {
            report.line(format!(
                "Could not set geometry for partition {} while trying to resize/move it.",
                partition.partition_path()
            ));
            return false;
        }

        if let Ok(record) = ctx.devices.partition_mut(&self.partition) {
            record.set_geometry(self.new_start, new_last);
        }
        true
    }
}
