// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use storage_contracts::Report;

use super::{Job, JobContext, JobStatus, find_device, job_status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeGroupChange {
    Grow,
    Shrink,
}

/// Add physical volumes to a volume group or take them out
#[derive(Debug, Clone)]
pub struct ResizeVolumeGroupJob {
    device_node: String,
    physical_volumes: Vec<String>,
    change: VolumeGroupChange,
    status: JobStatus,
}

impl ResizeVolumeGroupJob {
    pub fn new(
        device_node: impl Into<String>,
        physical_volumes: Vec<String>,
        change: VolumeGroupChange,
    ) -> Self {
        Self {
            device_node: device_node.into(),
            physical_volumes,
            change,
            status: JobStatus::Pending,
        }
    }
}

impl Job for ResizeVolumeGroupJob {
    job_status!();

    fn description(&self) -> String {
        let list = self.physical_volumes.join(", ");
        match self.change {
            VolumeGroupChange::Grow => {
                format!("Extend volume group {} with {list}", self.device_node)
            }
            VolumeGroupChange::Shrink => {
                format!("Remove {list} from volume group {}", self.device_node)
            }
        }
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(device) = find_device(ctx, &self.device_node, report) else {
            return false;
        };
        let mut handle = match ctx.backend.open_device_exclusive(&device) {
            Ok(handle) => handle,
            Err(e) => {
                report.line(format!("Could not open volume group {}: {e}", self.device_node));
                return false;
            }
        };

        for pv in &self.physical_volumes {
            let result = match self.change {
                VolumeGroupChange::Grow => handle.extend_volume_group(report, pv),
                VolumeGroupChange::Shrink => handle.reduce_volume_group(report, pv),
            };
            if let Err(e) = result {
                report.line(format!(
                    "Changing volume group {} with physical volume {pv} failed: {e}",
                    self.device_node
                ));
                return false;
            }
        }
        true
    }
}
