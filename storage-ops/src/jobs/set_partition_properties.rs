// SPDX-License-Identifier: GPL-3.0-only

//! GPT partition label, UUID and attribute bits
//!
//! Other table types have no place to store these. The jobs succeed without
//! touching the disk there.

use storage_contracts::Report;
use storage_types::{PartitionRef, TableType};

use super::{Job, JobContext, JobStatus, edit_partition_table, find_partition, job_status};

fn table_type(ctx: &JobContext<'_>, partition: &PartitionRef) -> TableType {
    ctx.devices
        .device(&partition.device_node)
        .ok()
        .and_then(|d| d.partition_table())
        .map_or(TableType::Unknown, |t| t.table_type())
}

#[derive(Debug, Clone)]
pub struct SetPartitionLabelJob {
    partition: PartitionRef,
    label: String,
    status: JobStatus,
}

impl SetPartitionLabelJob {
    pub fn new(partition: PartitionRef, label: impl Into<String>) -> Self {
        Self {
            partition,
            label: label.into(),
            status: JobStatus::Pending,
        }
    }
}

impl Job for SetPartitionLabelJob {
    job_status!();

    fn description(&self) -> String {
        format!(
            "Set the partition label on {} to \"{}\"",
            self.partition.device_node, self.label
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        if self.label.is_empty() || !table_type(ctx, &self.partition).supports_partition_label() {
            tracing::debug!(device = %self.partition.device_node, "partition label not applicable");
            return true;
        }
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };
        let set = edit_partition_table(ctx, &self.partition.device_node, report, |table, report| {
            table.set_partition_label(report, &partition, &self.label)
        });
        if set.is_none() {
            report.line(format!(
                "Setting the label for partition {} failed.",
                partition.partition_path()
            ));
            return false;
        }
        if let Ok(record) = ctx.devices.partition_mut(&self.partition) {
            record.label = self.label.clone();
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct SetPartitionUuidJob {
    partition: PartitionRef,
    uuid: String,
    status: JobStatus,
}

impl SetPartitionUuidJob {
    pub fn new(partition: PartitionRef, uuid: impl Into<String>) -> Self {
        Self {
            partition,
            uuid: uuid.into(),
            status: JobStatus::Pending,
        }
    }
}

impl Job for SetPartitionUuidJob {
    job_status!();

    fn description(&self) -> String {
        format!(
            "Set the partition UUID on {} to {}",
            self.partition.device_node, self.uuid
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        if self.uuid.is_empty() || !table_type(ctx, &self.partition).supports_partition_uuid() {
            tracing::debug!(device = %self.partition.device_node, "partition UUID not applicable");
            return true;
        }
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };
        let set = edit_partition_table(ctx, &self.partition.device_node, report, |table, report| {
            table.set_partition_uuid(report, &partition, &self.uuid)
        });
        if set.is_none() {
            report.line(format!(
                "Setting the UUID for partition {} failed.",
                partition.partition_path()
            ));
            return false;
        }
        if let Ok(record) = ctx.devices.partition_mut(&self.partition) {
            record.uuid = self.uuid.clone();
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct SetPartitionAttributesJob {
    partition: PartitionRef,
    attributes: u64,
    orig_attributes: u64,
    status: JobStatus,
}

impl SetPartitionAttributesJob {
    pub fn new(partition: PartitionRef, attributes: u64, orig_attributes: u64) -> Self {
        Self {
            partition,
            attributes,
            orig_attributes,
            status: JobStatus::Pending,
        }
    }
}

impl Job for SetPartitionAttributesJob {
    job_status!();

    fn description(&self) -> String {
        format!(
            "Set the partition attributes on {} to {:#x}",
            self.partition.device_node, self.attributes
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        if self.attributes == self.orig_attributes
            || !table_type(ctx, &self.partition).supports_partition_attributes()
        {
            tracing::debug!(device = %self.partition.device_node, "partition attributes not applicable");
            return true;
        }
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };
        let set = edit_partition_table(ctx, &self.partition.device_node, report, |table, report| {
            table.set_partition_attributes(report, &partition, self.attributes)
        });
        if set.is_none() {
            report.line(format!(
                "Setting the attributes for partition {} failed.",
                partition.partition_path()
            ));
            return false;
        }
        if let Ok(record) = ctx.devices.partition_mut(&self.partition) {
            record.attributes = self.attributes;
        }
        true
    }
}
