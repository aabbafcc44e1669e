// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{DeviceSet, PartitionRef, PhysicalVolume};

use super::{Operation, OperationStatus, operation_status};
use crate::error::{OperationError, Result};
use crate::jobs::{Job, ResizeVolumeGroupJob, VolumeGroupChange};

/// Change the set of physical volumes backing a volume group
#[derive(Debug, Clone)]
pub struct ResizeVolumeGroupOperation {
    device_node: String,
    original: Vec<PhysicalVolume>,
    target: Vec<PhysicalVolume>,
    previewed: bool,
    grow: Option<ResizeVolumeGroupJob>,
    shrink: Option<ResizeVolumeGroupJob>,
    status: OperationStatus,
}

impl ResizeVolumeGroupOperation {
    pub fn new(devices: &DeviceSet, device_node: &str, target: Vec<PhysicalVolume>) -> Result<Self> {
        let device = devices.device(device_node)?;
        let group = device
            .volume_group()
            .ok_or_else(|| OperationError::NotVolumeGroup(device_node.to_string()))?;

        let allocated: u64 = device
            .partition_table()
            .map(|table| table.allocated().map(|lv| lv.length()).sum())
            .unwrap_or(0);
        let available: u64 = target.iter().map(|pv| pv.extents).sum();
        if available < allocated {
            return Err(OperationError::InsufficientExtents {
                device: device_node.to_string(),
                allocated,
                available,
            });
        }

        let mut op = Self {
            device_node: device_node.to_string(),
            original: group.physical_volumes.clone(),
            target,
            previewed: false,
            grow: None,
            shrink: None,
            status: OperationStatus::Pending,
        };
        op.rebuild_jobs();
        Ok(op)
    }

    fn rebuild_jobs(&mut self) {
        let added: Vec<String> = self
            .target
            .iter()
            .filter(|pv| !self.original.iter().any(|o| o.path == pv.path))
            .map(|pv| pv.path.clone())
            .collect();
        let removed: Vec<String> = self
            .original
            .iter()
            .filter(|pv| !self.target.iter().any(|t| t.path == pv.path))
            .map(|pv| pv.path.clone())
            .collect();

        self.grow = (!added.is_empty())
            .then(|| ResizeVolumeGroupJob::new(&self.device_node, added, VolumeGroupChange::Grow));
        self.shrink = (!removed.is_empty()).then(|| {
            ResizeVolumeGroupJob::new(&self.device_node, removed, VolumeGroupChange::Shrink)
        });
    }

    pub fn device_node(&self) -> &str {
        &self.device_node
    }

    pub fn original(&self) -> &[PhysicalVolume] {
        &self.original
    }

    pub fn target(&self) -> &[PhysicalVolume] {
        &self.target
    }

    /// Take over the physical volumes an earlier, discarded operation started from
    pub fn set_original(&mut self, original: Vec<PhysicalVolume>) {
        self.original = original;
        self.rebuild_jobs();
    }

    pub fn is_noop(&self) -> bool {
        self.grow.is_none() && self.shrink.is_none()
    }

    fn apply(&self, devices: &mut DeviceSet, physical_volumes: &[PhysicalVolume]) -> Result<()> {
        let device = devices.device_mut(&self.device_node)?;
        device.set_physical_volumes(physical_volumes.to_vec());
        device.update_unallocated();
        Ok(())
    }
}

impl Operation for ResizeVolumeGroupOperation {
    fn description(&self) -> String {
        let paths: Vec<&str> = self.target.iter().map(|pv| pv.path.as_str()).collect();
        format!(
            "Resize volume group {} to use {}",
            self.device_node,
            paths.join(", ")
        )
    }

    operation_status!();

    fn preview(&mut self, devices: &mut DeviceSet) -> Result<()> {
        if !self.previewed {
            self.apply(devices, &self.target)?;
            self.previewed = true;
        }
        Ok(())
    }

    fn undo(&mut self, devices: &mut DeviceSet) -> Result<()> {
        if self.previewed {
            self.apply(devices, &self.original)?;
            self.previewed = false;
        }
        Ok(())
    }

    fn targets_device(&self, device_node: &str) -> bool {
        self.device_node == device_node
    }

    fn targets_partition(&self, _partition: &PartitionRef) -> bool {
        false
    }

    fn jobs(&self) -> Vec<&dyn Job> {
        let mut jobs: Vec<&dyn Job> = Vec::new();
        if let Some(job) = &self.grow {
            jobs.push(job);
        }
        if let Some(job) = &self.shrink {
            jobs.push(job);
        }
        jobs
    }

    fn jobs_mut(&mut self) -> Vec<&mut dyn Job> {
        let mut jobs: Vec<&mut dyn Job> = Vec::new();
        if let Some(job) = &mut self.grow {
            jobs.push(job);
        }
        if let Some(job) = &mut self.shrink {
            jobs.push(job);
        }
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::fixtures::{pv, volume_group};
    use storage_types::LayoutEntry;

    /// Layout, last usable sector, physical volumes and size of vg0
    fn snapshot(devices: &DeviceSet) -> (Vec<LayoutEntry>, u64, Vec<PhysicalVolume>, u64) {
        let device = devices.device("/dev/vg0").unwrap();
        let table = device.partition_table().unwrap();
        (
            table.layout(),
            table.last_usable(),
            device.volume_group().unwrap().physical_volumes.clone(),
            device.total_logical_sectors,
        )
    }

    #[test]
    fn shrinking_below_allocated_extents_is_rejected() {
        let devices = volume_group();
        let err = ResizeVolumeGroupOperation::new(&devices, "/dev/vg0", vec![pv("/dev/sdb1", 100)])
            .unwrap_err();
        assert!(matches!(
            err,
            OperationError::InsufficientExtents {
                allocated: 120,
                available: 100,
                ..
            }
        ));
    }

    #[test]
    fn growing_adds_one_job_and_previews_the_new_size() {
        let mut devices = volume_group();
        let target = vec![pv("/dev/sdb1", 100), pv("/dev/sdc1", 100), pv("/dev/sdd1", 50)];
        let mut op = ResizeVolumeGroupOperation::new(&devices, "/dev/vg0", target).unwrap();
        assert_eq!(op.jobs().len(), 1);

        let before = snapshot(&devices);
        op.preview(&mut devices).unwrap();
        let grown = snapshot(&devices);
        assert_eq!(grown.3, 250);
        assert_eq!(grown.1, 249);
        assert_eq!(grown.0.last().map(|e| e.last_sector), Some(249));
        assert_eq!(grown.2.len(), 3);

        op.undo(&mut devices).unwrap();
        assert_eq!(snapshot(&devices), before);
    }

    #[test]
    fn shrinking_previews_and_undoes_the_whole_group() {
        let mut devices = volume_group();
        let before = snapshot(&devices);
        let target = vec![pv("/dev/sdb1", 100), pv("/dev/sdd1", 30)];
        let mut op = ResizeVolumeGroupOperation::new(&devices, "/dev/vg0", target).unwrap();
        assert_eq!(op.jobs().len(), 2);

        op.preview(&mut devices).unwrap();
        assert_eq!(snapshot(&devices).3, 130);
        op.undo(&mut devices).unwrap();
        assert_eq!(snapshot(&devices), before);
    }
}
