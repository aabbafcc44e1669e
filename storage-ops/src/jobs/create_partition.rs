// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_types::{PartitionRef, PartitionState};

use super::{Job, JobContext, JobStatus, edit_partition_table, find_partition, job_status};

/// Create a partition on disk from its preview record
///
/// On success the record takes the number the backend handed out and stops
/// being new.
#[derive(Debug, Clone)]
pub struct CreatePartitionJob {
    partition: PartitionRef,
    status: JobStatus,
}

impl CreatePartitionJob {
    pub fn new(partition: PartitionRef) -> Self {
        Self {
            partition,
            status: JobStatus::Pending,
        }
    }
}

impl Job for CreatePartitionJob {
    job_status!();

    fn description(&self) -> String {
        format!("Create new partition on device {}", self.partition.device_node)
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };

        let created = edit_partition_table(ctx, &self.partition.device_node, report, |table, report| {
            table.create_partition(report, &partition)
        });
        let Some(number) = created else {
            report.line(format!(
                "Failed to add partition {} to device {}.",
                partition.partition_path(),
                self.partition.device_node
            ));
            return false;
        };

        if let Ok(record) = ctx.devices.partition_mut(&self.partition) {
            record.number = Some(number);
            record.state = PartitionState::None;
            report.line(format!("Created partition {}.", record.partition_path()));
        }
        true
    }
}
