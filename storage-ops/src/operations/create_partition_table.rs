// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_types::{Device, DeviceSet, PartitionRef, PartitionTable, TableType};

use super::{Operation, OperationStatus, execute_jobs, operation_status};
use crate::error::Result;
use crate::jobs::{CreatePartitionTableJob, Job, JobContext};

/// Replace a device's partition table with a new, empty one
#[derive(Debug, Clone)]
pub struct CreatePartitionTableOperation {
    device_node: String,
    new_table: PartitionTable,
    /// The table the device had before, held while the preview shows the new one
    old_table: Option<Option<PartitionTable>>,
    job: CreatePartitionTableJob,
    status: OperationStatus,
}

impl CreatePartitionTableOperation {
    pub fn new(devices: &DeviceSet, device_node: &str, table_type: TableType) -> Result<Self> {
        let device = devices.device(device_node)?;
        Ok(Self {
            device_node: device_node.to_string(),
            new_table: PartitionTable::with_defaults(table_type, &device.geometry()),
            old_table: None,
            job: CreatePartitionTableJob::new(device_node),
            status: OperationStatus::Pending,
        })
    }

    /// Nothing on the device may be mounted
    pub fn can_create(device: &Device) -> bool {
        device
            .partition_table()
            .is_none_or(|table| table.allocated().all(|p| !p.is_mounted()))
    }

    pub fn device_node(&self) -> &str {
        &self.device_node
    }

    pub fn table_type(&self) -> TableType {
        self.new_table.table_type()
    }
}

impl Operation for CreatePartitionTableOperation {
    fn description(&self) -> String {
        format!(
            "Create a new partition table (type: {}) on {}",
            self.new_table.table_type().name(),
            self.device_node
        )
    }

    operation_status!();

    fn preview(&mut self, devices: &mut DeviceSet) -> Result<()> {
        if self.old_table.is_some() {
            return Ok(());
        }
        let device = devices.device_mut(&self.device_node)?;
        let old = device.replace_partition_table(Some(self.new_table.clone()));
        device.update_unallocated();
        self.old_table = Some(old);
        Ok(())
    }

    fn undo(&mut self, devices: &mut DeviceSet) -> Result<()> {
        let Some(old) = self.old_table.take() else {
            return Ok(());
        };
        devices.device_mut(&self.device_node)?.replace_partition_table(old);
        Ok(())
    }

    fn targets_device(&self, device_node: &str) -> bool {
        self.device_node == device_node
    }

    fn targets_partition(&self, _partition: &PartitionRef) -> bool {
        false
    }

    fn jobs(&self) -> Vec<&dyn Job> {
        vec![&self.job]
    }

    fn jobs_mut(&mut self) -> Vec<&mut dyn Job> {
        vec![&mut self.job]
    }

    fn execute(&mut self, ctx: &mut JobContext<'_>, parent: &mut Report) -> bool {
        if let Err(e) = self.preview(ctx.devices) {
            let report = parent.child(self.description());
            report.line(e.to_string());
            self.status = OperationStatus::Error;
            return false;
        }
        execute_jobs(self, ctx, parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::fixtures::{SDA, layout, populated_disk};

    #[test]
    fn preview_installs_an_empty_table_and_undo_brings_the_old_one_back() {
        let mut devices = populated_disk();
        let before = layout(&devices);

        let mut op = CreatePartitionTableOperation::new(&devices, SDA, TableType::Gpt).unwrap();
        op.preview(&mut devices).unwrap();
        op.preview(&mut devices).unwrap();
        let table = devices.device(SDA).unwrap().table().unwrap();
        assert_eq!(table.table_type(), TableType::Gpt);
        assert_eq!(table.allocated().count(), 0);
        assert_eq!(table.partitions().len(), 1);

        op.undo(&mut devices).unwrap();
        op.undo(&mut devices).unwrap();
        assert_eq!(layout(&devices), before);
    }
}
