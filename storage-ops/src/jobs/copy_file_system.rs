// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_sys::{CopySource, CopySourceDevice, CopyTarget, CopyTargetDevice};
use storage_types::{CommandSupportType, FsCapability, Partition, PartitionRef};

use super::{
    Job, JobContext, JobStatus, copy_with_progress, find_device, find_partition, job_status,
};

/// Copy the file system of one partition into another
#[derive(Debug, Clone)]
pub struct CopyFileSystemJob {
    target: PartitionRef,
    source: PartitionRef,
    status: JobStatus,
}

impl CopyFileSystemJob {
    pub fn new(target: PartitionRef, source: PartitionRef) -> Self {
        Self {
            target,
            source,
            status: JobStatus::Pending,
        }
    }

    pub fn source(&self) -> &PartitionRef {
        &self.source
    }

    pub fn set_source(&mut self, source: PartitionRef) {
        self.source = source;
    }

    fn copy_blocks(
        &self,
        ctx: &mut JobContext<'_>,
        report: &mut Report,
        target: &Partition,
        source: &Partition,
    ) -> bool {
        let Some(source_device) = find_device(ctx, &self.source.device_node, report) else {
            return false;
        };
        let Some(target_device) = find_device(ctx, &self.target.device_node, report) else {
            return false;
        };

        let mut copy_source = CopySourceDevice::new(
            ctx.backend,
            &source_device,
            source.file_system.first_byte(),
            source.file_system.last_byte(),
        );
        let mut copy_target = CopyTargetDevice::new(
            ctx.backend,
            &target_device,
            target.file_system.first_byte(),
            target.file_system.last_byte(),
        );
        if let Err(e) = copy_source.open() {
            report.line(format!(
                "Could not open file system on source partition {} for copying: {e}",
                source.partition_path()
            ));
            return false;
        }
        if let Err(e) = copy_target.open() {
            report.line(format!(
                "Could not create target file system on partition {} for copying: {e}",
                target.partition_path()
            ));
            return false;
        }

        let description = self.description();
        let copied = copy_with_progress(ctx, &description, report, &mut copy_source, &mut copy_target);
        report.line("Closing device. This may take a few seconds.");
        match copied {
            Ok(()) => true,
            Err(e) => {
                report.line(e.to_string());
                false
            }
        }
    }
}

impl Job for CopyFileSystemJob {
    job_status!();

    fn description(&self) -> String {
        format!(
            "Copy file system from {} to {}",
            self.source.device_node, self.target.device_node
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        let Some(target) = find_partition(ctx, &self.target, report) else {
            return false;
        };
        let Some(source) = find_partition(ctx, &self.source, report) else {
            return false;
        };
        let target_path = target.partition_path();
        let source_path = source.partition_path();

        if target.file_system.length() < source.file_system.length() {
            report.line(format!(
                "Cannot copy file system: File system on target partition {target_path} is smaller than the file system on source partition {source_path}."
            ));
            return false;
        }

        let copied = match ctx.tools.support(source.file_system.fs_type, FsCapability::Copy) {
            CommandSupportType::FileSystem => ctx
                .tools
                .copy(report, &target_path, &target.file_system, &source_path, &source.file_system)
                .map_err(|e| report.line(e.to_string()))
                .is_ok(),
            CommandSupportType::Core | CommandSupportType::Backend => {
                self.copy_blocks(ctx, report, &target, &source)
            }
            CommandSupportType::None => {
                report.line(format!(
                    "Copying a {} file system is not supported.",
                    source.file_system.name()
                ));
                false
            }
        };
        if !copied {
            return false;
        }

        let mut fs = target.file_system.clone();
        fs.fs_type = source.file_system.fs_type;
        fs.label = source.file_system.label.clone();
        fs.uuid = source.file_system.uuid.clone();
        fs.sectors_used = source.file_system.sectors_used;
        fs.last_sector = fs.first_sector + source.file_system.length() - 1;

        if let Err(e) = ctx.tools.update_boot_sector(report, &target_path, &fs) {
            report.line(format!(
                "Updating boot sector for file system on partition {target_path} failed: {e}"
            ));
        }
        if ctx.config.regenerate_uuid_on_copy
            && ctx.tools.support(fs.fs_type, FsCapability::UpdateUuid) == CommandSupportType::FileSystem
        {
            match ctx.tools.update_uuid(report, &target_path, &fs) {
                Ok(uuid) => fs.uuid = uuid,
                Err(e) => report.line(format!(
                    "Could not give the copied file system on {target_path} a new UUID: {e}"
                )),
            }
        }

        if let Ok(record) = ctx.devices.partition_mut(&self.target) {
            record.file_system = fs;
        }
        true
    }
}
