// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{DeviceSet, Partition, PartitionFlags, PartitionRef};

use super::{Operation, OperationStatus, operation_status};
use crate::error::Result;
use crate::jobs::{Job, SetPartFlagsJob};

#[derive(Debug, Clone)]
pub struct SetPartFlagsOperation {
    partition: PartitionRef,
    path: String,
    orig_flags: PartitionFlags,
    new_flags: PartitionFlags,
    job: SetPartFlagsJob,
    status: OperationStatus,
}

impl SetPartFlagsOperation {
    pub fn new(devices: &DeviceSet, target: &PartitionRef, new_flags: PartitionFlags) -> Result<Self> {
        let partition = devices.partition(target)?;
        let orig_flags = partition.active_flags;
        Ok(Self {
            partition: target.clone(),
            path: partition.partition_path(),
            orig_flags,
            new_flags,
            job: SetPartFlagsJob::new(target.clone(), new_flags, orig_flags),
            status: OperationStatus::Pending,
        })
    }

    pub fn can_set_flags(partition: &Partition) -> bool {
        !partition.is_unallocated() && !partition.available_flags.is_empty()
    }

    pub fn partition(&self) -> &PartitionRef {
        &self.partition
    }

    pub fn orig_flags(&self) -> PartitionFlags {
        self.orig_flags
    }

    pub fn new_flags(&self) -> PartitionFlags {
        self.new_flags
    }

    /// Take over the flags an earlier, discarded operation started from
    pub fn set_orig_flags(&mut self, flags: PartitionFlags) {
        self.orig_flags = flags;
        self.job.set_orig_flags(flags);
    }

    pub fn is_noop(&self) -> bool {
        self.orig_flags == self.new_flags
    }

    fn apply(&self, devices: &mut DeviceSet, flags: PartitionFlags) -> Result<()> {
        devices.partition_mut(&self.partition)?.active_flags = flags;
        Ok(())
    }
}

impl Operation for SetPartFlagsOperation {
    fn description(&self) -> String {
        let names: Vec<&str> = self.new_flags.iter().map(|f| f.name()).collect();
        if names.is_empty() {
            format!("Clear flags for partition {}", self.path)
        } else {
            format!(
                "Set flags for partition {} to \"{}\"",
                self.path,
                names.join(", ")
            )
        }
    }

    operation_status!();

    fn preview(&mut self, devices: &mut DeviceSet) -> Result<()> {
        self.apply(devices, self.new_flags)
    }

    fn undo(&mut self, devices: &mut DeviceSet) -> Result<()> {
        self.apply(devices, self.orig_flags)
    }

    fn targets_device(&self, device_node: &str) -> bool {
        self.partition.device_node == device_node
    }

    fn targets_partition(&self, partition: &PartitionRef) -> bool {
        self.partition == *partition
    }

    fn jobs(&self) -> Vec<&dyn Job> {
        vec![&self.job]
    }

    fn jobs_mut(&mut self) -> Vec<&mut dyn Job> {
        vec![&mut self.job]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::fixtures::{by_number, layout, populated_disk};
    use storage_types::PartitionFlag;

    #[test]
    fn flags_preview_and_undo() {
        let mut devices = populated_disk();
        let before = layout(&devices);
        let sda1 = by_number(&devices, 1);

        let mut op = SetPartFlagsOperation::new(&devices, &sda1, PartitionFlag::Boot.into()).unwrap();
        assert_eq!(op.description(), "Set flags for partition /dev/sda1 to \"boot\"");
        op.preview(&mut devices).unwrap();
        assert!(devices.partition(&sda1).unwrap().active_flags.contains(PartitionFlag::Boot));

        op.undo(&mut devices).unwrap();
        assert_eq!(layout(&devices), before);
        op.set_orig_flags(PartitionFlag::Boot.into());
        assert!(op.is_noop());
    }
}
