// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{
    DetachedPartition, DeviceSet, FileSystem, FileSystemType, Partition, PartitionFlags,
    PartitionRef, PartitionRole, PartitionState,
};

use super::{
    Operation, OperationStatus, insert_preview_partition, operation_status, refresh_preview,
    remove_preview_partition,
};
use crate::error::Result;
use crate::jobs::{
    CheckFileSystemJob, CreateFileSystemJob, CreatePartitionJob, Job, SetFileSystemLabelJob,
    SetPartFlagsJob, SetPartitionAttributesJob, SetPartitionLabelJob, SetPartitionUuidJob,
};

/// Create a partition in unallocated space, then format and label it
#[derive(Debug, Clone)]
pub struct NewOperation {
    device_node: String,
    partition: PartitionRef,
    extended: bool,
    summary: String,
    /// The new partition while it is not part of the preview
    pending: Option<DetachedPartition>,
    create_partition: CreatePartitionJob,
    create_file_system: Option<CreateFileSystemJob>,
    set_flags: Option<SetPartFlagsJob>,
    set_label: Option<SetFileSystemLabelJob>,
    set_partition_label: Option<SetPartitionLabelJob>,
    set_partition_uuid: Option<SetPartitionUuidJob>,
    set_partition_attributes: Option<SetPartitionAttributesJob>,
    check: Option<CheckFileSystemJob>,
    status: OperationStatus,
}

impl NewOperation {
    pub fn new(mut partition: Partition) -> Self {
        partition.state = PartitionState::New;
        let reference = partition.reference();
        let extended = partition.is_extended();

        let mut op = Self {
            device_node: partition.device_path.clone(),
            partition: reference.clone(),
            extended,
            summary: summarize(&partition),
            pending: None,
            create_partition: CreatePartitionJob::new(reference.clone()),
            create_file_system: None,
            set_flags: None,
            set_label: None,
            set_partition_label: None,
            set_partition_uuid: None,
            set_partition_attributes: None,
            check: None,
            status: OperationStatus::Pending,
        };

        if !extended {
            op.create_file_system = Some(CreateFileSystemJob::new(reference.clone()));
            op.set_flags = Some(SetPartFlagsJob::new(
                reference.clone(),
                partition.active_flags,
                PartitionFlags::empty(),
            ));
            op.set_label = Some(SetFileSystemLabelJob::new(
                reference.clone(),
                partition.file_system.label.clone(),
            ));
            op.set_partition_label = Some(SetPartitionLabelJob::new(
                reference.clone(),
                partition.label.clone(),
            ));
            op.set_partition_uuid = Some(SetPartitionUuidJob::new(
                reference.clone(),
                partition.uuid.clone(),
            ));
            op.set_partition_attributes = Some(SetPartitionAttributesJob::new(
                reference.clone(),
                partition.attributes,
                0,
            ));
            op.check = Some(CheckFileSystemJob::new(reference));
        }

        op.pending = Some(DetachedPartition::new(partition));
        op
    }

    /// Only free space can hold a new partition
    pub fn can_create_new(partition: &Partition) -> bool {
        partition.is_unallocated()
    }

    /// A partition record filling `free`, ready to be handed to [`NewOperation::new`]
    pub fn create_new(free: &Partition, fs_type: FileSystemType) -> Partition {
        let mut partition = free.duplicate();
        partition.roles.remove(PartitionRole::Unallocated);
        if partition.roles.is_empty() {
            partition.roles = PartitionRole::Primary.into();
        }
        partition.file_system = FileSystem::new(
            fs_type,
            partition.first_sector,
            partition.last_sector,
            partition.sector_size,
        );
        partition.number = None;
        partition.state = PartitionState::New;
        partition.attributes = 0;
        partition
    }

    pub fn partition(&self) -> &PartitionRef {
        &self.partition
    }

    pub fn device_node(&self) -> &str {
        &self.device_node
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    fn modify(&mut self, devices: &mut DeviceSet, f: impl FnOnce(&mut Partition)) -> Result<()> {
        let partition = match &mut self.pending {
            Some(detached) => &mut detached.partition,
            None => devices.partition_mut(&self.partition)?,
        };
        f(partition);
        self.summary = summarize(partition);
        Ok(())
    }

    /// Move or resize the not yet created partition in place
    pub fn resize(&mut self, devices: &mut DeviceSet, first_sector: u64, last_sector: u64) -> Result<()> {
        let mut parent = None;
        self.modify(devices, |p| {
            p.set_geometry(first_sector, last_sector);
            p.file_system.first_sector = first_sector;
            p.file_system.last_sector = last_sector;
            parent = Some(p.parent());
        })?;
        if self.pending.is_none()
            && let Some(parent) = parent
        {
            refresh_preview(devices, &self.device_node, parent)?;
        }
        Ok(())
    }

    pub fn set_file_system_label(&mut self, devices: &mut DeviceSet, label: &str) -> Result<()> {
        self.modify(devices, |p| p.file_system.label = label.to_string())?;
        if let Some(job) = &mut self.set_label {
            job.set_label(label);
        }
        Ok(())
    }

    /// Swap the file system the partition will be formatted with, keeping its label
    pub fn set_file_system_type(&mut self, devices: &mut DeviceSet, fs_type: FileSystemType) -> Result<()> {
        self.modify(devices, |p| {
            let label = std::mem::take(&mut p.file_system.label);
            p.file_system = FileSystem::new(fs_type, p.first_sector, p.last_sector, p.sector_size)
                .with_label(label);
        })
    }
}

fn summarize(partition: &Partition) -> String {
    format!("{}, {}", partition.capacity(), partition.file_system.name())
}

impl Operation for NewOperation {
    fn description(&self) -> String {
        format!(
            "Create a new partition ({}) on device {}",
            self.summary, self.device_node
        )
    }

    operation_status!();

    fn preview(&mut self, devices: &mut DeviceSet) -> Result<()> {
        insert_preview_partition(devices, &self.device_node, &mut self.pending)
    }

    fn undo(&mut self, devices: &mut DeviceSet) -> Result<()> {
        remove_preview_partition(devices, &self.device_node, self.partition.id, &mut self.pending)
    }

    fn targets_device(&self, device_node: &str) -> bool {
        self.device_node == device_node
    }

    fn targets_partition(&self, partition: &PartitionRef) -> bool {
        self.partition == *partition
    }

    fn jobs(&self) -> Vec<&dyn Job> {
        let mut jobs: Vec<&dyn Job> = vec![&self.create_partition];
        if let Some(job) = &self.create_file_system {
            jobs.push(job);
        }
        if let Some(job) = &self.set_flags {
            jobs.push(job);
        }
        if let Some(job) = &self.set_label {
            jobs.push(job);
        }
        if let Some(job) = &self.set_partition_label {
            jobs.push(job);
        }
        if let Some(job) = &self.set_partition_uuid {
            jobs.push(job);
        }
        if let Some(job) = &self.set_partition_attributes {
            jobs.push(job);
        }
        if let Some(job) = &self.check {
            jobs.push(job);
        }
        jobs
    }

    fn jobs_mut(&mut self) -> Vec<&mut dyn Job> {
        let mut jobs: Vec<&mut dyn Job> = vec![&mut self.create_partition];
        if let Some(job) = &mut self.create_file_system {
            jobs.push(job);
        }
        if let Some(job) = &mut self.set_flags {
            jobs.push(job);
        }
        if let Some(job) = &mut self.set_label {
            jobs.push(job);
        }
        if let Some(job) = &mut self.set_partition_label {
            jobs.push(job);
        }
        if let Some(job) = &mut self.set_partition_uuid {
            jobs.push(job);
        }
        if let Some(job) = &mut self.set_partition_attributes {
            jobs.push(job);
        }
        if let Some(job) = &mut self.check {
            jobs.push(job);
        }
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::fixtures::{SDA, empty_disk, free_at, layout, populated_disk};

    #[test]
    fn preview_inserts_and_undo_restores_the_layout() {
        let mut devices = empty_disk();
        let before = layout(&devices);

        let mut p = NewOperation::create_new(&free_at(&devices, 4096), FileSystemType::Ext4);
        p.set_geometry(2048, 206_847);
        p.file_system.last_sector = 206_847;
        let mut op = NewOperation::new(p);
        op.preview(&mut devices).unwrap();
        op.preview(&mut devices).unwrap();

        let table = devices.device(SDA).unwrap().table().unwrap();
        assert_eq!(table.allocated().count(), 1);
        let created = devices.partition(op.partition()).unwrap();
        assert_eq!(created.state, PartitionState::New);
        assert_eq!(created.partition_path(), "New Partition");

        op.undo(&mut devices).unwrap();
        op.undo(&mut devices).unwrap();
        assert_eq!(layout(&devices), before);
    }

    #[test]
    fn in_place_edits_reach_the_previewed_partition() {
        let mut devices = populated_disk();
        let free = free_at(&devices, 900_000);
        let mut op = NewOperation::new(NewOperation::create_new(&free, FileSystemType::Ext4));
        op.preview(&mut devices).unwrap();

        op.resize(&mut devices, free.first_sector, free.first_sector + 20_479)
            .unwrap();
        op.set_file_system_label(&mut devices, "data").unwrap();
        op.set_file_system_type(&mut devices, FileSystemType::Btrfs)
            .unwrap();

        let p = devices.partition(op.partition()).unwrap();
        assert_eq!(p.length(), 20_480);
        assert_eq!(p.file_system.fs_type, FileSystemType::Btrfs);
        assert_eq!(p.file_system.label, "data");
        assert_eq!(p.file_system.last_sector, p.last_sector);

        let free_after = free_at(&devices, free.first_sector + 20_480);
        assert_eq!(free_after.first_sector, free.first_sector + 20_480);
    }

    #[test]
    fn extended_partitions_get_no_file_system_jobs() {
        let devices = empty_disk();
        let mut p = NewOperation::create_new(&free_at(&devices, 4096), FileSystemType::Extended);
        p.roles = PartitionRole::Extended.into();
        let op = NewOperation::new(p);
        assert_eq!(op.jobs().len(), 1);
    }
}
