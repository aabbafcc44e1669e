// SPDX-License-Identifier: GPL-3.0-only

//! Ready-made disks and a rig wiring a stack to the in-memory doubles

use std::sync::Arc;

use storage_contracts::{CoreBackend, FileSystemTools, Report};
use storage_ops::{EngineConfig, OperationRunner, OperationStack, RunnerEvent};
use storage_types::{
    Device, DeviceSet, FileSystem, FileSystemType, LayoutEntry, NodeRef, Partition, PartitionRef,
    PartitionRole, PartitionRoles, PartitionTable, TableType,
};

use crate::{MemoryBackend, MemoryFileSystemTools};

pub const SDA: &str = "/dev/sda";

/// Sectors in one MiB at 512 bytes per sector
pub const MIB_SECTORS: u64 = 2048;

/// A disk with an empty table of `table_type`
pub fn empty_disk(device_node: &str, total_sectors: u64, table_type: TableType) -> Device {
    let device = Device::disk("Memory Disk", device_node, 512, total_sectors);
    let table = PartitionTable::with_defaults(table_type, &device.geometry());
    let mut device = device.with_partition_table(table);
    device.update_unallocated();
    device
}

/// 500 MiB with an empty msdos table
pub fn empty_msdos() -> DeviceSet {
    let mut devices = DeviceSet::new();
    devices.insert(empty_disk(SDA, 500 * MIB_SECTORS, TableType::MsdosSectorBased));
    devices
}

fn numbered(
    parent: NodeRef,
    roles: PartitionRoles,
    fs_type: FileSystemType,
    first: u64,
    last: u64,
    number: u32,
) -> Partition {
    Partition::new(SDA, parent, roles, FileSystem::new(fs_type, first, last, 512), first, last)
        .with_number(number)
}

/// 1000 MiB msdos disk
///
/// | partition | role     | fs       | sectors           |
/// |-----------|----------|----------|-------------------|
/// | sda1      | primary  | ext4     | 2048-206847       |
/// | sda2      | extended |          | 206848-821247     |
/// | sda5      | logical  | ext4     | 208896-413695     |
/// | sda6      | logical  | xfs      | 415744-620543     |
///
/// Everything after sda2 is free.
pub fn populated_msdos() -> crate::Result<DeviceSet> {
    let mut device = Device::disk("Memory Disk", SDA, 512, 1000 * MIB_SECTORS);
    let mut table = PartitionTable::with_defaults(TableType::MsdosSectorBased, &device.geometry());
    table.insert(numbered(
        NodeRef::Root,
        PartitionRole::Primary.into(),
        FileSystemType::Ext4,
        2048,
        206_847,
        1,
    ))?;
    let extended = table.insert(numbered(
        NodeRef::Root,
        PartitionRole::Extended.into(),
        FileSystemType::Extended,
        206_848,
        821_247,
        2,
    ))?;
    table.insert(numbered(
        NodeRef::Partition(extended),
        PartitionRole::Logical.into(),
        FileSystemType::Ext4,
        208_896,
        413_695,
        5,
    ))?;
    table.insert(numbered(
        NodeRef::Partition(extended),
        PartitionRole::Logical.into(),
        FileSystemType::Xfs,
        415_744,
        620_543,
        6,
    ))?;
    device = device.with_partition_table(table);
    device.update_unallocated();

    let mut devices = DeviceSet::new();
    devices.insert(device);
    Ok(devices)
}

/// A stack over some devices plus the doubles its runner talks to
pub struct Rig {
    pub stack: Arc<OperationStack>,
    pub backend: MemoryBackend,
    pub tools: Arc<MemoryFileSystemTools>,
}

/// Events and report of one complete run
pub struct RunOutcome {
    pub events: Vec<RunnerEvent>,
    pub report: Report,
}

impl RunOutcome {
    /// The event that ended the run
    pub fn last_event(&self) -> Option<&RunnerEvent> {
        self.events.last()
    }
}

impl Rig {
    pub fn new(devices: DeviceSet) -> Self {
        Self::with_config(devices, EngineConfig::default())
    }

    pub fn with_config(devices: DeviceSet, config: EngineConfig) -> Self {
        let backend = MemoryBackend::for_devices(&devices);
        let stack = OperationStack::new(config);
        for device in devices.iter() {
            stack.add_device(device.clone());
        }
        Self {
            stack: Arc::new(stack),
            backend,
            tools: Arc::new(MemoryFileSystemTools::new()),
        }
    }

    pub fn runner(&self) -> OperationRunner {
        let backend: Arc<dyn CoreBackend> = Arc::new(self.backend.clone());
        let tools: Arc<dyn FileSystemTools> = self.tools.clone();
        OperationRunner::new(Arc::clone(&self.stack), backend, tools)
    }

    /// Apply everything queued on a runner thread and wait for it
    pub fn apply(&self) -> RunOutcome {
        let handle = self.runner().spawn();
        let events: Vec<RunnerEvent> = handle.events().iter().collect();
        let report = handle.join().unwrap_or_else(|| Report::new("runner thread panicked"));
        RunOutcome { events, report }
    }

    pub fn preview(&self) -> DeviceSet {
        self.stack.preview_devices()
    }

    pub fn layout(&self, device_node: &str) -> Vec<LayoutEntry> {
        self.stack
            .read()
            .devices()
            .device(device_node)
            .and_then(|d| d.table())
            .map(PartitionTable::layout)
            .unwrap_or_default()
    }

    /// The preview's partition currently numbered `number`
    pub fn numbered(&self, device_node: &str, number: u32) -> Option<PartitionRef> {
        numbered_partition(&self.preview(), device_node, number).map(Partition::reference)
    }

    /// The preview's unallocated region holding `sector`
    pub fn free_at(&self, device_node: &str, sector: u64) -> Option<Partition> {
        region_at(&self.preview(), device_node, sector, PartitionRole::Unallocated.into())
    }
}

pub fn numbered_partition<'a>(devices: &'a DeviceSet, device_node: &str, number: u32) -> Option<&'a Partition> {
    devices
        .device(device_node)
        .and_then(|d| d.table())
        .ok()?
        .allocated()
        .find(|p| p.number == Some(number))
}

/// The innermost partition with one of `roles` containing `sector`
pub fn region_at(devices: &DeviceSet, device_node: &str, sector: u64, roles: PartitionRoles) -> Option<Partition> {
    let table = devices.device(device_node).and_then(|d| d.table()).ok()?;
    let id = table.find_partition_by_sector(sector, roles)?;
    table.partition(id).cloned()
}
