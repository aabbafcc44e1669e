// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{Report, StorageError};
use storage_types::{DeviceType, PartitionFlags, PartitionRef};

use super::{Job, JobContext, JobStatus, edit_partition_table, find_partition, job_status};

/// Turn partition flags on or off
///
/// Only flags that differ from `orig_flags` are sent to the backend, followed by
/// a single commit.
#[derive(Debug, Clone)]
pub struct SetPartFlagsJob {
    partition: PartitionRef,
    flags: PartitionFlags,
    orig_flags: PartitionFlags,
    status: JobStatus,
}

impl SetPartFlagsJob {
    pub fn new(partition: PartitionRef, flags: PartitionFlags, orig_flags: PartitionFlags) -> Self {
        Self {
            partition,
            flags,
            orig_flags,
            status: JobStatus::Pending,
        }
    }

    pub fn flags(&self) -> PartitionFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: PartitionFlags) {
        self.flags = flags;
    }

    pub fn set_orig_flags(&mut self, orig_flags: PartitionFlags) {
        self.orig_flags = orig_flags;
    }

    /// Flags whose state changes
    pub fn changed(&self) -> PartitionFlags {
        self.flags ^ self.orig_flags
    }
}

impl Job for SetPartFlagsJob {
    job_status!();

    fn description(&self) -> String {
        let names: Vec<&str> = self.flags.iter().map(|f| f.name()).collect();
        if names.is_empty() {
            format!("Clear flags for partition on {}", self.partition.device_node)
        } else {
            format!(
                "Set the flags for partition on {} to \"{}\"",
                self.partition.device_node,
                names.join(", ")
            )
        }
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(partition) = find_partition(ctx, &self.partition, report) else {
            return false;
        };
        let path = partition.partition_path();
        let device_type = ctx
            .devices
            .device(&self.partition.device_node)
            .map(|d| d.device_type())
            .unwrap_or(DeviceType::Unknown);

        let changed = self.changed();
        if matches!(device_type, DeviceType::Disk | DeviceType::SoftwareRaid) && !changed.is_empty() {
            let flags = self.flags;
            let set = edit_partition_table(ctx, &self.partition.device_node, report, |table, report| {
                for flag in changed.iter() {
                    let state = flags.contains(flag);
                    table.set_flag(report, &partition, flag, state).map_err(|e| {
                        StorageError::new(
                            e.kind,
                            format!(
                                "There was an error setting flag {} for partition {path} to state {}: {}",
                                flag.name(),
                                if state { "on" } else { "off" },
                                e.message
                            ),
                        )
                    })?;
                }
                Ok(())
            });
            if set.is_none() {
                return false;
            }
        }

        if let Ok(record) = ctx.devices.partition_mut(&self.partition) {
            record.active_flags = self.flags;
        }
        true
    }
}
