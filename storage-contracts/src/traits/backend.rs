// SPDX-License-Identifier: GPL-3.0-only

//! The privileged collaborator that touches real devices
//!
//! Calls block until the backend is done. Each call may write diagnostic lines
//! into the report it is given and signals failure through [`StorageError`].

use std::time::Duration;

use storage_types::{Device, FileSystemType, Partition, PartitionFlag, TableType};

use crate::{Report, StorageError};

pub trait CoreBackend: Send + Sync {
    fn open_device(&self, device: &Device) -> Result<Box<dyn BackendDevice>, StorageError>;

    /// Open without allowing anyone else to use the device meanwhile
    fn open_device_exclusive(&self, device: &Device)
    -> Result<Box<dyn BackendDevice>, StorageError>;
}

pub trait BackendDevice: Send {
    fn device_node(&self) -> &str;

    fn open_partition_table(&mut self) -> Result<Box<dyn BackendPartitionTable + '_>, StorageError>;

    /// Write a fresh, empty partition table of `table_type`
    fn create_partition_table(
        &mut self,
        report: &mut Report,
        table_type: TableType,
    ) -> Result<(), StorageError>;

    /// Fill `buffer` from the absolute byte `offset`
    fn read_data(&mut self, buffer: &mut [u8], offset: u64) -> Result<(), StorageError>;

    fn write_data(&mut self, buffer: &[u8], offset: u64) -> Result<(), StorageError>;

    /// Add a physical volume to the volume group this device represents
    fn extend_volume_group(
        &mut self,
        report: &mut Report,
        pv_path: &str,
    ) -> Result<(), StorageError> {
        let _ = (report, pv_path);
        Err(StorageError::unsupported(format!(
            "{} is not a volume group",
            self.device_node()
        )))
    }

    /// Move extents off a physical volume and remove it from the volume group
    fn reduce_volume_group(
        &mut self,
        report: &mut Report,
        pv_path: &str,
    ) -> Result<(), StorageError> {
        let _ = (report, pv_path);
        Err(StorageError::unsupported(format!(
            "{} is not a volume group",
            self.device_node()
        )))
    }
}

pub trait BackendPartitionTable {
    /// Create `partition` on disk and return the number the OS assigned
    fn create_partition(
        &mut self,
        report: &mut Report,
        partition: &Partition,
    ) -> Result<u32, StorageError>;

    fn delete_partition(
        &mut self,
        report: &mut Report,
        partition: &Partition,
    ) -> Result<(), StorageError>;

    fn update_geometry(
        &mut self,
        report: &mut Report,
        partition: &Partition,
        first_sector: u64,
        last_sector: u64,
    ) -> Result<(), StorageError>;

    /// Backend-native resize; only called when the file system type declares it
    fn resize_file_system(
        &mut self,
        report: &mut Report,
        partition: &Partition,
        new_length: u64,
    ) -> Result<(), StorageError>;

    fn detect_file_system_by_sector(
        &mut self,
        report: &mut Report,
        device: &Device,
        sector: u64,
    ) -> Result<FileSystemType, StorageError>;

    /// Write the partition type code matching the partition's file system
    fn set_partition_system_type(
        &mut self,
        report: &mut Report,
        partition: &Partition,
    ) -> Result<(), StorageError>;

    fn set_partition_label(
        &mut self,
        report: &mut Report,
        partition: &Partition,
        label: &str,
    ) -> Result<(), StorageError>;

    fn set_partition_uuid(
        &mut self,
        report: &mut Report,
        partition: &Partition,
        uuid: &str,
    ) -> Result<(), StorageError>;

    fn set_partition_attributes(
        &mut self,
        report: &mut Report,
        partition: &Partition,
        attributes: u64,
    ) -> Result<(), StorageError>;

    fn set_flag(
        &mut self,
        report: &mut Report,
        partition: &Partition,
        flag: PartitionFlag,
        state: bool,
    ) -> Result<(), StorageError>;

    /// Wipe file system signatures inside the partition
    fn clobber_file_system(
        &mut self,
        report: &mut Report,
        partition: &Partition,
    ) -> Result<(), StorageError>;

    /// Flush pending edits and wait up to `timeout` for the kernel to pick them up
    fn commit(&mut self, timeout: Duration) -> Result<(), StorageError>;
}
