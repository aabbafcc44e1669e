// SPDX-License-Identifier: GPL-3.0-only

//! Jobs: the smallest unit of work run against a device
//!
//! A job never returns a structured error. It writes what happened into its
//! report node and answers with `true` or `false`; the operation owning it stops
//! at the first `false`.

mod backup_file_system;
mod check_file_system;
mod copy_file_system;
mod create_file_system;
mod create_partition;
mod create_partition_table;
mod delete_file_system;
mod delete_partition;
mod move_file_system;
mod resize_file_system;
mod resize_volume_group;
mod restore_file_system;
mod set_file_system_label;
mod set_partition_flags;
mod set_partition_geometry;
mod set_partition_properties;
mod shred_file_system;

pub use backup_file_system::BackupFileSystemJob;
pub use check_file_system::CheckFileSystemJob;
pub use copy_file_system::CopyFileSystemJob;
pub use create_file_system::CreateFileSystemJob;
pub use create_partition::CreatePartitionJob;
pub use create_partition_table::CreatePartitionTableJob;
pub use delete_file_system::DeleteFileSystemJob;
pub use delete_partition::DeletePartitionJob;
pub use move_file_system::MoveFileSystemJob;
pub use resize_file_system::ResizeFileSystemJob;
pub use resize_volume_group::{ResizeVolumeGroupJob, VolumeGroupChange};
pub use restore_file_system::RestoreFileSystemJob;
pub use set_file_system_label::SetFileSystemLabelJob;
pub use set_partition_flags::SetPartFlagsJob;
pub use set_partition_geometry::SetPartGeometryJob;
pub use set_partition_properties::{
    SetPartitionAttributesJob, SetPartitionLabelJob, SetPartitionUuidJob,
};
pub use shred_file_system::ShredFileSystemJob;

use std::fmt;

use serde::{Deserialize, Serialize};
use storage_contracts::{
    BackendPartitionTable, CoreBackend, FileSystemTools, Report, StorageError,
};
use storage_sys::{CopySource, CopyTarget, copy_blocks};
use storage_types::{Device, DeviceSet, Partition, PartitionRef};

use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Error,
}

impl JobStatus {
    pub fn text(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Success => "Success",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Sub-progress of the job currently running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub job: String,
    pub percent: u8,
}

/// Everything a job may touch while it runs
///
/// `devices` is the preview model; jobs keep it in step with what they did on
/// disk (numbers of created partitions, moved and resized file systems).
pub struct JobContext<'a> {
    pub backend: &'a dyn CoreBackend,
    pub tools: &'a dyn FileSystemTools,
    pub devices: &'a mut DeviceSet,
    pub config: &'a EngineConfig,
    pub progress: &'a mut dyn FnMut(JobProgress),
}

impl<'a> JobContext<'a> {
    pub fn new(
        backend: &'a dyn CoreBackend,
        tools: &'a dyn FileSystemTools,
        devices: &'a mut DeviceSet,
        config: &'a EngineConfig,
        progress: &'a mut dyn FnMut(JobProgress),
    ) -> Self {
        Self {
            backend,
            tools,
            devices,
            config,
            progress,
        }
    }

    pub(crate) fn emit_progress(&mut self, job: &str, percent: u8) {
        (self.progress)(JobProgress {
            job: job.to_string(),
            percent,
        });
    }
}

pub trait Job {
    fn description(&self) -> String;

    fn status(&self) -> JobStatus;

    fn set_status(&mut self, status: JobStatus);

    /// Do the work, writing diagnostics into `report`
    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool;
}

macro_rules! job_status {
    () => {
        fn status(&self) -> $crate::jobs::JobStatus {
            self.status
        }

        fn set_status(&mut self, status: $crate::jobs::JobStatus) {
            self.status = status;
        }
    };
}
pub(crate) use job_status;

/// Run one job under its own report node, tracking its status
pub fn run_job(job: &mut dyn Job, ctx: &mut JobContext<'_>, parent: &mut Report) -> bool {
    let description = job.description();
    let report = parent.child(description.clone());
    job.set_status(JobStatus::Running);
    tracing::debug!(job = %description, "job started");

    let ok = job.run(ctx, report);

    let status = if ok { JobStatus::Success } else { JobStatus::Error };
    job.set_status(status);
    report.set_status(format!("{description}: {status}"));
    ctx.emit_progress(&description, 100);
    if ok {
        tracing::debug!(job = %description, "job finished");
    } else {
        tracing::warn!(job = %description, "job failed");
    }
    ok
}

/// A partition a job works on even after it left the preview model
///
/// Deleting a partition removes it from the preview before its jobs run, so
/// those jobs fall back to the record taken when they were built.
#[derive(Debug, Clone)]
pub struct TrackedPartition {
    snapshot: Partition,
}

impl TrackedPartition {
    pub fn new(snapshot: Partition) -> Self {
        Self { snapshot }
    }

    pub fn reference(&self) -> PartitionRef {
        self.snapshot.reference()
    }

    pub fn snapshot(&self) -> &Partition {
        &self.snapshot
    }

    pub fn resolve(&self, devices: &DeviceSet) -> Partition {
        devices
            .partition(&self.snapshot.reference())
            .cloned()
            .unwrap_or_else(|_| self.snapshot.clone())
    }
}

pub(crate) fn find_partition(
    ctx: &JobContext<'_>,
    target: &PartitionRef,
    report: &mut Report,
) -> Option<Partition> {
    match ctx.devices.partition(target) {
        Ok(partition) => Some(partition.clone()),
        Err(e) => {
            report.line(format!("Could not find the partition to work on: {e}"));
            None
        }
    }
}

pub(crate) fn find_device(
    ctx: &JobContext<'_>,
    device_node: &str,
    report: &mut Report,
) -> Option<Device> {
    match ctx.devices.device(device_node) {
        Ok(device) => Some(device.clone()),
        Err(e) => {
            report.line(e.to_string());
            None
        }
    }
}

/// Open the device exclusively, apply `edit` to its partition table and commit once
pub(crate) fn edit_partition_table<T>(
    ctx: &JobContext<'_>,
    device_node: &str,
    report: &mut Report,
    edit: impl FnOnce(&mut dyn BackendPartitionTable, &mut Report) -> Result<T, StorageError>,
) -> Option<T> {
    let device = ctx.devices.device(device_node).ok()?;
    let mut backend_device = match ctx.backend.open_device_exclusive(device) {
        Ok(handle) => handle,
        Err(e) => {
            report.line(format!("Could not open device {device_node}: {e}"));
            return None;
        }
    };
    let mut table = match backend_device.open_partition_table() {
        Ok(table) => table,
        Err(e) => {
            report.line(format!(
                "Could not open partition table on device {device_node}: {e}"
            ));
            return None;
        }
    };

    let value = match edit(&mut *table, report) {
        Ok(value) => value,
        Err(e) => {
            report.line(e.to_string());
            return None;
        }
    };

    if let Err(e) = table.commit(ctx.config.commit_timeout()) {
        tracing::error!(device = device_node, error = %e, "partition table commit failed");
        report.line(format!(
            "Failed to commit changes to the partition table on {device_node}: {e}"
        ));
        return None;
    }
    Some(value)
}

/// Read-only access to a device's partition table, nothing is committed
pub(crate) fn query_partition_table<T>(
    ctx: &JobContext<'_>,
    device_node: &str,
    report: &mut Report,
    query: impl FnOnce(&mut dyn BackendPartitionTable, &mut Report) -> Result<T, StorageError>,
) -> Option<T> {
    let device = ctx.devices.device(device_node).ok()?;
    let mut backend_device = match ctx.backend.open_device(device) {
        Ok(handle) => handle,
        Err(e) => {
            report.line(format!("Could not open device {device_node}: {e}"));
            return None;
        }
    };
    let mut table = match backend_device.open_partition_table() {
        Ok(table) => table,
        Err(e) => {
            report.line(format!(
                "Could not open partition table on device {device_node}: {e}"
            ));
            return None;
        }
    };
    match query(&mut *table, report) {
        Ok(value) => Some(value),
        Err(e) => {
            report.line(e.to_string());
            None
        }
    }
}

/// Block copy with the configured block size, forwarding progress under `job`
pub(crate) fn copy_with_progress(
    ctx: &mut JobContext<'_>,
    job: &str,
    report: &mut Report,
    source: &mut dyn CopySource,
    target: &mut dyn CopyTarget,
) -> storage_sys::Result<()> {
    let block_size = ctx.config.copy_block_size;
    let progress = &mut *ctx.progress;
    copy_blocks(report, source, target, block_size, &mut |p| {
        progress(JobProgress {
            job: job.to_string(),
            percent: p.percent(),
        })
    })
}
