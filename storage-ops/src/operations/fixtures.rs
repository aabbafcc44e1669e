// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{
    Device, DeviceSet, FileSystem, FileSystemType, NodeRef, Partition, PartitionRef,
    PartitionRole, PartitionRoles, PartitionTable, PhysicalVolume, TableType, VolumeGroup,
};

pub const SDA: &str = "/dev/sda";

pub fn partition(
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

/// 500 MiB msdos disk without partitions
pub fn empty_disk() -> DeviceSet {
    disk(1_024_000)
}

pub fn disk(total_sectors: u64) -> DeviceSet {
    let mut device = Device::disk("Test Disk", SDA, 512, total_sectors);
    let table = PartitionTable::with_defaults(TableType::MsdosSectorBased, &device.geometry());
    device = device.with_partition_table(table);
    device.update_unallocated();
    let mut devices = DeviceSet::new();
    devices.insert(device);
    devices
}

/// 1000 MiB disk: sda1 (ext4), sda2 (extended) holding sda5 and sda6, free space at the end
pub fn populated_disk() -> DeviceSet {
    let mut devices = disk(2_048_000);
    let table = devices
        .device_mut(SDA)
        .and_then(|d| d.table_mut())
        .expect("fixture table");
    table.remove_unallocated();
    table
        .insert(partition(
            NodeRef::Root,
            PartitionRole::Primary.into(),
            FileSystemType::Ext4,
            2048,
            206_847,
            1,
        ))
        .expect("sda1");
    let ext = table
        .insert(partition(
            NodeRef::Root,
            PartitionRole::Extended.into(),
            FileSystemType::Extended,
            206_848,
            821_247,
            2,
        ))
        .expect("sda2");
    table
        .insert(partition(
            NodeRef::Partition(ext),
            PartitionRole::Logical.into(),
            FileSystemType::Ext4,
            208_896,
            413_695,
            5,
        ))
        .expect("sda5");
    table
        .insert(partition(
            NodeRef::Partition(ext),
            PartitionRole::Logical.into(),
            FileSystemType::Xfs,
            415_744,
            620_543,
            6,
        ))
        .expect("sda6");
    devices.device_mut(SDA).expect("fixture disk").update_unallocated();
    devices
}

pub fn by_number(devices: &DeviceSet, number: u32) -> PartitionRef {
    devices
        .device(SDA)
        .and_then(|d| d.table())
        .expect("fixture table")
        .allocated()
        .find(|p| p.number == Some(number))
        .map(Partition::reference)
        .expect("numbered partition")
}

/// The unallocated region containing `sector`
pub fn free_at(devices: &DeviceSet, sector: u64) -> Partition {
    let table = devices.device(SDA).and_then(|d| d.table()).expect("fixture table");
    let id = table
        .find_partition_by_sector(sector, PartitionRole::Unallocated.into())
        .expect("free region");
    table.partition(id).cloned().expect("free record")
}

pub fn layout(devices: &DeviceSet) -> Vec<storage_types::LayoutEntry> {
    devices
        .device(SDA)
        .and_then(|d| d.table())
        .expect("fixture table")
        .layout()
}

pub fn pv(path: &str, extents: u64) -> PhysicalVolume {
    PhysicalVolume {
        path: path.to_string(),
        extents,
    }
}

/// Volume group vg0 on sdb1 and sdc1 (100 extents each) with a 120 extent root volume
pub fn volume_group() -> DeviceSet {
    let group = VolumeGroup {
        name: "vg0".to_string(),
        extent_size: 4 * 1024 * 1024,
        physical_volumes: vec![pv("/dev/sdb1", 100), pv("/dev/sdc1", 100)],
    };
    let mut device = Device::lvm(group);
    let mut table = PartitionTable::new(TableType::Vmd, 0, 199);
    let fs = FileSystem::new(FileSystemType::Ext4, 0, 119, 4 * 1024 * 1024);
    let mut lv = Partition::new("/dev/vg0", NodeRef::Root, PartitionRole::LvmLv.into(), fs, 0, 119);
    lv.label = "root".to_string();
    table.insert(lv).expect("root volume");
    device = device.with_partition_table(table);
    device.update_unallocated();
    let mut devices = DeviceSet::new();
    devices.insert(device);
    devices
}
