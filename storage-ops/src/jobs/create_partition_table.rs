// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;

use super::{Job, JobContext, JobStatus, find_device, job_status};

/// Write the table currently installed in the preview to the device
#[derive(Debug, Clone)]
pub struct CreatePartitionTableJob {
    device_node: String,
    status: JobStatus,
}

impl CreatePartitionTableJob {
    pub fn new(device_node: impl Into<String>) -> Self {
        Self {
            device_node: device_node.into(),
            status: JobStatus::Pending,
        }
    }
}

impl Job for CreatePartitionTableJob {
    job_status!();

    fn description(&self) -> String {
        format!("Create new partition table on device {}", self.device_node)
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(device) = find_device(ctx, &self.device_node, report) else {
            return false;
        };
        let Some(table_type) = device.partition_table().map(|t| t.table_type()) else {
            report.line(format!("Device {} has no partition table to create.", self.device_node));
            return false;
        };

        let mut handle = match ctx.backend.open_device_exclusive(&device) {
            Ok(handle) => handle,
            Err(e) => {
                report.line(format!(
                    "Creating partition table failed: Could not open device {}: {e}",
                    self.device_node
                ));
                return false;
            }
        };
        match handle.create_partition_table(report, table_type) {
            Ok(()) => {
                report.line(format!("Created a {} partition table.", table_type.name()));
                true
            }
            Err(e) => {
                report.line(format!("Creating partition table failed: {e}"));
                false
            }
        }
    }
}
