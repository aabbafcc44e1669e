// SPDX-License-Identifier: GPL-3.0-only

//! A [`CoreBackend`] that keeps devices in memory
//!
//! Device contents are stored sparsely in fixed-size chunks, so a 500 MiB disk
//! only costs what was actually written. Every partition table call is appended
//! to a call log the tests can inspect.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use storage_contracts::{
    BackendDevice, BackendPartitionTable, CoreBackend, Report, StorageError, StorageErrorKind,
};
use storage_types::{
    Device, DeviceSet, FileSystemType, Partition, PartitionFlag, PartitionFlags, TableType,
};
use tracing::debug;

const CHUNK_SIZE: usize = 64 * 1024;

/// One recorded call into the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Open { device: String, exclusive: bool },
    CreatePartitionTable { device: String, table_type: TableType },
    CreatePartition { device: String, number: u32, first_sector: u64, last_sector: u64 },
    DeletePartition { device: String, number: u32 },
    UpdateGeometry { device: String, number: u32, first_sector: u64, last_sector: u64 },
    ResizeFileSystem { device: String, number: u32, new_length: u64 },
    SetSystemType { device: String, number: u32, fs_type: FileSystemType },
    SetPartitionLabel { device: String, number: u32, label: String },
    SetPartitionUuid { device: String, number: u32, uuid: String },
    SetPartitionAttributes { device: String, number: u32, attributes: u64 },
    SetFlag { device: String, number: u32, flag: PartitionFlag, state: bool },
    ClobberFileSystem { device: String, number: u32 },
    Commit { device: String },
    ExtendVolumeGroup { device: String, physical_volume: String },
    ReduceVolumeGroup { device: String, physical_volume: String },
}

/// What the backend believes is on disk for one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPartition {
    pub first_sector: u64,
    pub last_sector: u64,
    pub logical: bool,
    pub flags: PartitionFlags,
    pub label: String,
}

#[derive(Debug, Default)]
struct MemoryDisk {
    size: u64,
    chunks: HashMap<u64, Vec<u8>>,
    table_type: Option<TableType>,
    partitions: BTreeMap<u32, MemoryPartition>,
    /// File system signatures by first sector
    file_systems: BTreeMap<u64, FileSystemType>,
    physical_volumes: Vec<String>,
}

impl MemoryDisk {
    fn check_bounds(&self, node: &str, offset: u64, length: usize) -> Result<(), StorageError> {
        if offset
            .checked_add(length as u64)
            .is_none_or(|end| end > self.size)
        {
            return Err(StorageError::invalid_input(format!(
                "{length} bytes at offset {offset} exceed the {} bytes of {node}",
                self.size
            )));
        }
        Ok(())
    }

    fn read(&self, buffer: &mut [u8], offset: u64) {
        let mut done = 0;
        while done < buffer.len() {
            let position = offset + done as u64;
            let within = (position % CHUNK_SIZE as u64) as usize;
            let count = (CHUNK_SIZE - within).min(buffer.len() - done);
            let out = &mut buffer[done..done + count];
            match self.chunks.get(&(position / CHUNK_SIZE as u64)) {
                Some(chunk) => out.copy_from_slice(&chunk[within..within + count]),
                None => out.fill(0),
            }
            done += count;
        }
    }

    fn write(&mut self, buffer: &[u8], offset: u64) {
        let mut done = 0;
        while done < buffer.len() {
            let position = offset + done as u64;
            let within = (position % CHUNK_SIZE as u64) as usize;
            let count = (CHUNK_SIZE - within).min(buffer.len() - done);
            let chunk = self
                .chunks
                .entry(position / CHUNK_SIZE as u64)
                .or_insert_with(|| vec![0; CHUNK_SIZE]);
            chunk[within..within + count].copy_from_slice(&buffer[done..done + count]);
            done += count;
        }
    }

    fn number_for(&self, partition: &Partition) -> Result<u32, StorageError> {
        let msdos = self.table_type.is_some_and(TableType::is_msdos);
        let logical = partition.is_logical();
        let (first, last) = match (msdos, logical) {
            (true, true) => (5, u32::MAX),
            (true, false) => (1, 4),
            (false, _) => (1, u32::MAX),
        };
        (first..=last)
            .find(|n| !self.partitions.contains_key(n))
            .ok_or_else(|| {
                StorageError::new(
                    StorageErrorKind::Conflict,
                    "no free partition number left in the table",
                )
            })
    }

    /// Logical partitions following a deleted one move down by one
    fn renumber_logicals_after(&mut self, deleted: u32) {
        let later: Vec<u32> = self
            .partitions
            .iter()
            .filter(|(n, p)| **n > deleted && p.logical)
            .map(|(n, _)| *n)
            .collect();
        for number in later {
            if let Some(p) = self.partitions.remove(&number) {
                self.partitions.insert(number - 1, p);
            }
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_open: Vec<String>,
    fail_commit: bool,
    fail_create_partition: bool,
    /// Bytes that may still be written before one write fails
    write_budget: Option<u64>,
}

#[derive(Debug, Default)]
struct BackendState {
    disks: BTreeMap<String, MemoryDisk>,
    calls: Vec<BackendCall>,
    faults: Faults,
    bytes_written: u64,
}

impl BackendState {
    fn disk(&self, node: &str) -> Result<&MemoryDisk, StorageError> {
        self.disks
            .get(node)
            .ok_or_else(|| StorageError::not_found(format!("no such device {node}")))
    }

    fn disk_mut(&mut self, node: &str) -> Result<&mut MemoryDisk, StorageError> {
        self.disks
            .get_mut(node)
            .ok_or_else(|| StorageError::not_found(format!("no such device {node}")))
    }
}

fn lock(state: &Mutex<BackendState>) -> MutexGuard<'_, BackendState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn number_of(partition: &Partition) -> Result<u32, StorageError> {
    partition.number.ok_or_else(|| {
        StorageError::not_found(format!(
            "{} has no partition number yet",
            partition.partition_path()
        ))
    })
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend holding every device of `devices`, with their partitions recorded
    pub fn for_devices(devices: &DeviceSet) -> Self {
        let backend = Self::new();
        for device in devices.iter() {
            backend.add_device(device);
        }
        backend
    }

    pub fn add_device(&self, device: &Device) {
        let mut disk = MemoryDisk {
            size: device.logical_sector_size * device.total_logical_sectors,
            ..MemoryDisk::default()
        };
        if let Some(group) = device.volume_group() {
            disk.physical_volumes = group.pv_paths();
        }
        if let Some(table) = device.partition_table() {
            disk.table_type = Some(table.table_type());
            for partition in table.allocated() {
                if let Some(number) = partition.number {
                    disk.partitions.insert(number, MemoryPartition {
                        first_sector: partition.first_sector,
                        last_sector: partition.last_sector,
                        logical: partition.is_logical(),
                        flags: partition.active_flags,
                        label: partition.label.clone(),
                    });
                }
                disk.file_systems
                    .insert(partition.file_system.first_sector, partition.file_system.fs_type);
            }
        }
        lock(&self.state).disks.insert(device.device_node.clone(), disk);
    }

    /// Opening `device_node` fails from now on
    pub fn fail_open(&self, device_node: &str) {
        lock(&self.state).faults.fail_open.push(device_node.to_string());
    }

    pub fn fail_commit(&self) {
        lock(&self.state).faults.fail_commit = true;
    }

    pub fn fail_create_partition(&self) {
        lock(&self.state).faults.fail_create_partition = true;
    }

    /// Writes succeed for `bytes` more bytes; the write crossing that limit fails
    /// and later writes succeed again
    pub fn fail_writes_after(&self, bytes: u64) {
        lock(&self.state).faults.write_budget = Some(bytes);
    }

    pub fn clear_faults(&self) {
        lock(&self.state).faults = Faults::default();
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Total bytes written through device handles
    pub fn bytes_written(&self) -> u64 {
        lock(&self.state).bytes_written
    }

    /// Seed device contents without going through a handle
    pub fn write_bytes(&self, device_node: &str, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        let disk = state.disk_mut(device_node)?;
        disk.check_bounds(device_node, offset, bytes.len())?;
        disk.write(bytes, offset);
        Ok(())
    }

    pub fn read_bytes(&self, device_node: &str, offset: u64, length: usize) -> Result<Vec<u8>, StorageError> {
        let state = lock(&self.state);
        let disk = state.disk(device_node)?;
        disk.check_bounds(device_node, offset, length)?;
        let mut buffer = vec![0; length];
        disk.read(&mut buffer, offset);
        Ok(buffer)
    }

    pub fn partitions(&self, device_node: &str) -> BTreeMap<u32, MemoryPartition> {
        lock(&self.state)
            .disks
            .get(device_node)
            .map(|d| d.partitions.clone())
            .unwrap_or_default()
    }

    pub fn table_type(&self, device_node: &str) -> Option<TableType> {
        lock(&self.state).disks.get(device_node).and_then(|d| d.table_type)
    }

    /// What `detect_file_system_by_sector` reports for `sector`
    pub fn set_file_system(&self, device_node: &str, sector: u64, fs_type: FileSystemType) {
        if let Some(disk) = lock(&self.state).disks.get_mut(device_node) {
            disk.file_systems.insert(sector, fs_type);
        }
    }

    pub fn physical_volumes(&self, device_node: &str) -> Vec<String> {
        lock(&self.state)
            .disks
            .get(device_node)
            .map(|d| d.physical_volumes.clone())
            .unwrap_or_default()
    }

    fn open(&self, device: &Device, exclusive: bool) -> Result<Box<dyn BackendDevice>, StorageError> {
        let node = device.device_node.clone();
        let mut state = lock(&self.state);
        state.calls.push(BackendCall::Open {
            device: node.clone(),
            exclusive,
        });
        if state.faults.fail_open.contains(&node) {
            return Err(StorageError::new(
                StorageErrorKind::Busy,
                format!("{node} is busy"),
            ));
        }
        state.disk(&node)?;
        debug!(device = %node, exclusive, "opened memory device");
        Ok(Box::new(MemoryDevice {
            state: Arc::clone(&self.state),
            node,
        }))
    }
}

impl CoreBackend for MemoryBackend {
    fn open_device(&self, device: &Device) -> Result<Box<dyn BackendDevice>, StorageError> {
        self.open(device, false)
    }

    fn open_device_exclusive(
        &self,
        device: &Device,
    ) -> Result<Box<dyn BackendDevice>, StorageError> {
        self.open(device, true)
    }
}

struct MemoryDevice {
    state: Arc<Mutex<BackendState>>,
    node: String,
}

impl BackendDevice for MemoryDevice {
    fn device_node(&self) -> &str {
        &self.node
    }

    fn open_partition_table(&mut self) -> Result<Box<dyn BackendPartitionTable + '_>, StorageError> {
        let state = lock(&self.state);
        if state.disk(&self.node)?.table_type.is_none() {
            return Err(StorageError::not_found(format!(
                "{} has no partition table",
                self.node
            )));
        }
        Ok(Box::new(MemoryPartitionTable {
            state: Arc::clone(&self.state),
            node: self.node.clone(),
        }))
    }

    fn create_partition_table(
        &mut self,
        report: &mut Report,
        table_type: TableType,
    ) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(BackendCall::CreatePartitionTable {
            device: self.node.clone(),
            table_type,
        });
        let disk = state.disk_mut(&self.node)?;
        disk.table_type = Some(table_type);
        disk.partitions.clear();
        disk.file_systems.clear();
        report.line(format!(
            "Created a {} partition table on {}.",
            table_type.name(),
            self.node
        ));
        Ok(())
    }

    fn read_data(&mut self, buffer: &mut [u8], offset: u64) -> Result<(), StorageError> {
        let state = lock(&self.state);
        let disk = state.disk(&self.node)?;
        disk.check_bounds(&self.node, offset, buffer.len())?;
        disk.read(buffer, offset);
        Ok(())
    }

    fn write_data(&mut self, buffer: &[u8], offset: u64) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        let length = buffer.len() as u64;
        if let Some(budget) = state.faults.write_budget {
            if length > budget {
                state.faults.write_budget = None;
                return Err(StorageError::io(format!(
                    "write of {length} bytes at offset {offset} on {} failed",
                    self.node
                )));
            }
            state.faults.write_budget = Some(budget - length);
        }
        let disk = state.disk_mut(&self.node)?;
        disk.check_bounds(&self.node, offset, buffer.len())?;
        disk.write(buffer, offset);
        state.bytes_written += length;
        Ok(())
    }

    fn extend_volume_group(&mut self, report: &mut Report, pv_path: &str) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(BackendCall::ExtendVolumeGroup {
            device: self.node.clone(),
            physical_volume: pv_path.to_string(),
        });
        let disk = state.disk_mut(&self.node)?;
        if disk.physical_volumes.iter().any(|pv| pv == pv_path) {
            return Err(StorageError::new(
                StorageErrorKind::Conflict,
                format!("{pv_path} already belongs to {}", self.node),
            ));
        }
        disk.physical_volumes.push(pv_path.to_string());
        report.line(format!("Added {pv_path} to {}.", self.node));
        Ok(())
    }

    fn reduce_volume_group(&mut self, report: &mut Report, pv_path: &str) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(BackendCall::ReduceVolumeGroup {
            device: self.node.clone(),
            physical_volume: pv_path.to_string(),
        });
        let disk = state.disk_mut(&self.node)?;
        let before = disk.physical_volumes.len();
        disk.physical_volumes.retain(|pv| pv != pv_path);
        if disk.physical_volumes.len() == before {
            return Err(StorageError::not_found(format!(
                "{pv_path} is not part of {}",
                self.node
            )));
        }
        report.line(format!("Removed {pv_path} from {}.", self.node));
        Ok(())
    }
}

struct MemoryPartitionTable {
    state: Arc<Mutex<BackendState>>,
    node: String,
}

impl MemoryPartitionTable {
    /// Record `call` and hand the partition numbered like `partition` to `edit`
    fn edit_partition(
        &mut self,
        partition: &Partition,
        call: impl FnOnce(String, u32) -> BackendCall,
        edit: impl FnOnce(&mut MemoryPartition),
    ) -> Result<(), StorageError> {
        let number = number_of(partition)?;
        let mut state = lock(&self.state);
        state.calls.push(call(self.node.clone(), number));
        let node = self.node.clone();
        let record = state
            .disk_mut(&node)?
            .partitions
            .get_mut(&number)
            .ok_or_else(|| StorageError::not_found(format!("partition {number} on {node}")))?;
        edit(record);
        Ok(())
    }
}

impl BackendPartitionTable for MemoryPartitionTable {
    fn create_partition(&mut self, report: &mut Report, partition: &Partition) -> Result<u32, StorageError> {
        let mut state = lock(&self.state);
        if state.faults.fail_create_partition {
            return Err(StorageError::io(format!(
                "could not add a partition to {}",
                self.node
            )));
        }
        let disk = state.disk_mut(&self.node)?;
        let number = disk.number_for(partition)?;
        disk.partitions.insert(number, MemoryPartition {
            first_sector: partition.first_sector,
            last_sector: partition.last_sector,
            logical: partition.is_logical(),
            flags: PartitionFlags::empty(),
            label: String::new(),
        });
        state.calls.push(BackendCall::CreatePartition {
            device: self.node.clone(),
            number,
            first_sector: partition.first_sector,
            last_sector: partition.last_sector,
        });
        report.line(format!(
            "Added partition {number} ({}-{}) to {}.",
            partition.first_sector, partition.last_sector, self.node
        ));
        Ok(number)
    }

    fn delete_partition(&mut self, report: &mut Report, partition: &Partition) -> Result<(), StorageError> {
        let number = number_of(partition)?;
        let mut state = lock(&self.state);
        state.calls.push(BackendCall::DeletePartition {
            device: self.node.clone(),
            number,
        });
        let disk = state.disk_mut(&self.node)?;
        let removed = disk.partitions.remove(&number).ok_or_else(|| {
            StorageError::not_found(format!("partition {number} on {}", self.node))
        })?;
        if removed.logical {
            disk.renumber_logicals_after(number);
        }
        report.line(format!("Deleted partition {number} from {}.", self.node));
        Ok(())
    }

    fn update_geometry(
        &mut self,
        report: &mut Report,
        partition: &Partition,
        first_sector: u64,
        last_sector: u64,
    ) -> Result<(), StorageError> {
        self.edit_partition(
            partition,
            |device, number| BackendCall::UpdateGeometry {
                device,
                number,
                first_sector,
                last_sector,
            },
            |p| {
                p.first_sector = first_sector;
                p.last_sector = last_sector;
            },
        )?;
        report.line(format!("Moved {} to {first_sector}-{last_sector}.", partition.partition_path()));
        Ok(())
    }

    fn resize_file_system(
        &mut self,
        _report: &mut Report,
        partition: &Partition,
        new_length: u64,
    ) -> Result<(), StorageError> {
        self.edit_partition(
            partition,
            |device, number| BackendCall::ResizeFileSystem {
                device,
                number,
                new_length,
            },
            |_| {},
        )
    }

    fn detect_file_system_by_sector(
        &mut self,
        _report: &mut Report,
        device: &Device,
        sector: u64,
    ) -> Result<FileSystemType, StorageError> {
        let state = lock(&self.state);
        Ok(state
            .disk(&device.device_node)?
            .file_systems
            .get(&sector)
            .copied()
            .unwrap_or(FileSystemType::Unknown))
    }

    fn set_partition_system_type(&mut self, _report: &mut Report, partition: &Partition) -> Result<(), StorageError> {
        let fs_type = partition.file_system.fs_type;
        let first_sector = partition.file_system.first_sector;
        self.edit_partition(
            partition,
            |device, number| BackendCall::SetSystemType {
                device,
                number,
                fs_type,
            },
            |_| {},
        )?;
        if let Some(disk) = lock(&self.state).disks.get_mut(&self.node) {
            disk.file_systems.insert(first_sector, fs_type);
        }
        Ok(())
    }

    fn set_partition_label(&mut self, _report: &mut Report, partition: &Partition, label: &str) -> Result<(), StorageError> {
        self.edit_partition(
            partition,
            |device, number| BackendCall::SetPartitionLabel {
                device,
                number,
                label: label.to_string(),
            },
            |p| p.label = label.to_string(),
        )
    }

    fn set_partition_uuid(&mut self, _report: &mut Report, partition: &Partition, uuid: &str) -> Result<(), StorageError> {
        self.edit_partition(
            partition,
            |device, number| BackendCall::SetPartitionUuid {
                device,
                number,
                uuid: uuid.to_string(),
            },
            |_| {},
        )
    }

    fn set_partition_attributes(
        &mut self,
        _report: &mut Report,
        partition: &Partition,
        attributes: u64,
    ) -> Result<(), StorageError> {
        self.edit_partition(
            partition,
            |device, number| BackendCall::SetPartitionAttributes {
                device,
                number,
                attributes,
            },
            |_| {},
        )
    }

    fn set_flag(
        &mut self,
        _report: &mut Report,
        partition: &Partition,
        flag: PartitionFlag,
        state: bool,
    ) -> Result<(), StorageError> {
        self.edit_partition(
            partition,
            |device, number| BackendCall::SetFlag {
                device,
                number,
                flag,
                state,
            },
            |p| {
                if state {
                    p.flags.insert(flag);
                } else {
                    p.flags.remove(flag);
                }
            },
        )
    }

    fn clobber_file_system(&mut self, _report: &mut Report, partition: &Partition) -> Result<(), StorageError> {
        let first_sector = partition.first_sector;
        self.edit_partition(
            partition,
            |device, number| BackendCall::ClobberFileSystem { device, number },
            |_| {},
        )?;
        if let Some(disk) = lock(&self.state).disks.get_mut(&self.node) {
            disk.file_systems.remove(&first_sector);
        }
        Ok(())
    }

    fn commit(&mut self, _timeout: Duration) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(BackendCall::Commit {
            device: self.node.clone(),
        });
        if state.faults.fail_commit {
            return Err(StorageError::new(
                StorageErrorKind::Timeout,
                format!("the kernel did not pick up the new table on {}", self.node),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_types::{NodeRef, PartitionRole, PartitionTable};

    fn msdos_disk() -> Device {
        let device = Device::disk("Memory Disk", "/dev/sdz", 512, 1_024_000);
        let table = PartitionTable::with_defaults(TableType::MsdosSectorBased, &device.geometry());
        device.with_partition_table(table)
    }

    fn logical(first: u64, last: u64) -> Partition {
        Partition::new(
            "/dev/sdz",
            NodeRef::Root,
            PartitionRole::Logical.into(),
            storage_types::FileSystem::new(FileSystemType::Ext4, first, last, 512),
            first,
            last,
        )
    }

    #[test]
    fn unwritten_bytes_read_as_zero_across_chunks() {
        let backend = MemoryBackend::new();
        backend.add_device(&msdos_disk());
        let offset = CHUNK_SIZE as u64 - 3;
        backend.write_bytes("/dev/sdz", offset, b"abcdef").unwrap();

        assert_eq!(backend.read_bytes("/dev/sdz", offset, 6).unwrap(), b"abcdef");
        assert_eq!(backend.read_bytes("/dev/sdz", 0, 4).unwrap(), vec![0; 4]);
        assert!(backend.read_bytes("/dev/sdz", 512 * 1_024_000 - 2, 4).is_err());
    }

    #[test]
    fn write_budget_fails_only_the_write_that_exceeds_it() {
        let backend = MemoryBackend::new();
        let device = msdos_disk();
        backend.add_device(&device);
        backend.fail_writes_after(8);

        let mut handle = backend.open_device_exclusive(&device).unwrap();
        handle.write_data(&[1; 8], 0).unwrap();
        assert!(handle.write_data(&[1; 1], 8).is_err());
        assert_eq!(backend.bytes_written(), 8);
        handle.write_data(&[1; 1], 8).unwrap();
        assert_eq!(backend.bytes_written(), 9);
    }

    #[test]
    fn deleting_a_logical_renumbers_the_ones_after_it() {
        let backend = MemoryBackend::new();
        let device = msdos_disk();
        backend.add_device(&device);
        let mut report = Report::new("test");

        let mut handle = backend.open_device_exclusive(&device).unwrap();
        let mut table = handle.open_partition_table().unwrap();
        let five = table.create_partition(&mut report, &logical(4096, 8191)).unwrap();
        let six = table.create_partition(&mut report, &logical(10_240, 20_479)).unwrap();
        assert_eq!((five, six), (5, 6));

        let mut first = logical(4096, 8191);
        first.number = Some(5);
        table.delete_partition(&mut report, &first).unwrap();
        drop(table);

        let partitions = backend.partitions("/dev/sdz");
        assert_eq!(partitions.keys().copied().collect::<Vec<_>>(), vec![5]);
        assert_eq!(partitions[&5].first_sector, 10_240);
    }

    #[test]
    fn armed_faults_surface_as_storage_errors() {
        let backend = MemoryBackend::new();
        let device = msdos_disk();
        backend.add_device(&device);

        backend.fail_commit();
        let mut handle = backend.open_device(&device).unwrap();
        let mut table = handle.open_partition_table().unwrap();
        let err = table.commit(Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::Timeout);
        drop(table);

        backend.fail_open("/dev/sdz");
        assert!(backend.open_device(&device).is_err());
        backend.clear_faults();
        assert!(backend.open_device(&device).is_ok());
        assert!(backend.calls().contains(&BackendCall::Commit {
            device: "/dev/sdz".to_string()
        }));
    }
}
