// SPDX-License-Identifier: GPL-3.0-only

//! Devices and the set of devices an operation stack previews

use serde::{Deserialize, Serialize};

use crate::capacity::Capacity;
use crate::error::{ModelError, Result};
use crate::partition::{Partition, PartitionRef};
use crate::table::PartitionTable;

/// Default alignment granularity in sectors (1 MiB on 512 byte sectors)
pub const DEFAULT_SECTOR_ALIGNMENT: u64 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Disk,
    SoftwareRaid,
    FakeRaid,
    Lvm,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskGeometry {
    pub heads: u32,
    pub sectors_per_track: u64,
    pub cylinders: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalVolume {
    pub path: String,
    pub extents: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeGroup {
    pub name: String,

    /// Physical extent size in bytes
    pub extent_size: u64,

    pub physical_volumes: Vec<PhysicalVolume>,
}

impl VolumeGroup {
    pub fn total_extents(&self) -> u64 {
        self.physical_volumes.iter().map(|pv| pv.extents).sum()
    }

    pub fn pv_paths(&self) -> Vec<String> {
        self.physical_volumes.iter().map(|pv| pv.path.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    Disk(DiskGeometry),
    SoftwareRaid { level: u32, chunk_size: u64 },
    FakeRaid,
    Lvm(VolumeGroup),
    Unknown,
}

/// What the unallocated-space and alignment code needs to know about a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceGeometry {
    pub device_node: String,
    pub device_type: DeviceType,
    pub sector_size: u64,
    pub total_sectors: u64,
    pub sector_alignment: u64,
    pub sectors_per_track: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub name: String,

    /// e.g. "/dev/sda", "/dev/vg0"
    pub device_node: String,

    /// For volume groups this is the extent size
    pub logical_sector_size: u64,

    /// For volume groups this is the extent count
    pub total_logical_sectors: u64,

    pub icon_name: String,

    pub kind: DeviceKind,

    /// Alignment granularity in sectors, stamped from the engine configuration
    pub sector_alignment: u64,

    partition_table: Option<PartitionTable>,
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.device_node == other.device_node
    }
}

impl Eq for Device {}

impl Device {
    pub fn disk(
        name: impl Into<String>,
        device_node: impl Into<String>,
        logical_sector_size: u64,
        total_logical_sectors: u64,
    ) -> Self {
        Self {
            name: name.into(),
            device_node: device_node.into(),
            logical_sector_size,
            total_logical_sectors,
            icon_name: "drive-harddisk".to_string(),
            kind: DeviceKind::Disk(DiskGeometry {
                heads: 255,
                sectors_per_track: 63,
                cylinders: total_logical_sectors / (255 * 63),
            }),
            sector_alignment: DEFAULT_SECTOR_ALIGNMENT,
            partition_table: None,
        }
    }

    pub fn lvm(group: VolumeGroup) -> Self {
        let device_node = format!("/dev/{}", group.name);
        Self {
            name: group.name.clone(),
            device_node,
            logical_sector_size: group.extent_size,
            total_logical_sectors: group.total_extents(),
            icon_name: "drive-harddisk-system".to_string(),
            kind: DeviceKind::Lvm(group),
            sector_alignment: 1,
            partition_table: None,
        }
    }

    pub fn with_kind(mut self, kind: DeviceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_partition_table(mut self, table: PartitionTable) -> Self {
        self.partition_table = Some(table);
        self
    }

    pub fn device_type(&self) -> DeviceType {
        match self.kind {
            DeviceKind::Disk(_) => DeviceType::Disk,
            DeviceKind::SoftwareRaid { .. } => DeviceType::SoftwareRaid,
            DeviceKind::FakeRaid => DeviceType::FakeRaid,
            DeviceKind::Lvm(_) => DeviceType::Lvm,
            DeviceKind::Unknown => DeviceType::Unknown,
        }
    }

    pub fn capacity(&self) -> Capacity {
        Capacity::from_sectors(self.total_logical_sectors, self.logical_sector_size)
    }

    pub fn sectors_per_track(&self) -> u64 {
        match &self.kind {
            DeviceKind::Disk(g) => g.sectors_per_track,
            _ => 0,
        }
    }

    pub fn volume_group(&self) -> Option<&VolumeGroup> {
        match &self.kind {
            DeviceKind::Lvm(vg) => Some(vg),
            _ => None,
        }
    }

    /// Replace the physical volumes of a volume group; its extent count follows
    pub fn set_physical_volumes(&mut self, physical_volumes: Vec<PhysicalVolume>) {
        if let DeviceKind::Lvm(vg) = &mut self.kind {
            vg.physical_volumes = physical_volumes;
            self.total_logical_sectors = vg.total_extents();
            if let Some(table) = &mut self.partition_table {
                table.set_last_usable(self.total_logical_sectors.saturating_sub(1));
            }
        }
    }

    pub fn geometry(&self) -> DeviceGeometry {
        DeviceGeometry {
            device_node: self.device_node.clone(),
            device_type: self.device_type(),
            sector_size: self.logical_sector_size,
            total_sectors: self.total_logical_sectors,
            sector_alignment: self.sector_alignment.max(1),
            sectors_per_track: self.sectors_per_track(),
        }
    }

    pub fn partition_table(&self) -> Option<&PartitionTable> {
        self.partition_table.as_ref()
    }

    pub fn partition_table_mut(&mut self) -> Option<&mut PartitionTable> {
        self.partition_table.as_mut()
    }

    /// Install a new table, handing back the previous one
    pub fn replace_partition_table(&mut self, table: Option<PartitionTable>) -> Option<PartitionTable> {
        std::mem::replace(&mut self.partition_table, table)
    }

    pub fn table(&self) -> Result<&PartitionTable> {
        self.partition_table
            .as_ref()
            .ok_or_else(|| ModelError::NoPartitionTable(self.device_node.clone()))
    }

    pub fn table_mut(&mut self) -> Result<&mut PartitionTable> {
        self.partition_table
            .as_mut()
            .ok_or_else(|| ModelError::NoPartitionTable(self.device_node.clone()))
    }

    pub fn update_unallocated(&mut self) {
        let geometry = self.geometry();
        if let Some(table) = &mut self.partition_table {
            table.update_unallocated(&geometry);
        }
    }
}

/// The devices an operation stack works on
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSet {
    devices: Vec<Device>,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device, replacing one with the same node
    pub fn insert(&mut self, device: Device) {
        match self.devices.iter_mut().find(|d| **d == device) {
            Some(existing) => *existing = device,
            None => self.devices.push(device),
        }
    }

    pub fn remove(&mut self, device_node: &str) -> Option<Device> {
        let index = self.devices.iter().position(|d| d.device_node == device_node)?;
        Some(self.devices.remove(index))
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    pub fn get(&self, device_node: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.device_node == device_node)
    }

    pub fn get_mut(&mut self, device_node: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.device_node == device_node)
    }

    pub fn device(&self, device_node: &str) -> Result<&Device> {
        self.get(device_node)
            .ok_or_else(|| ModelError::DeviceNotFound(device_node.to_string()))
    }

    pub fn device_mut(&mut self, device_node: &str) -> Result<&mut Device> {
        self.get_mut(device_node)
            .ok_or_else(|| ModelError::DeviceNotFound(device_node.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn partition(&self, target: &PartitionRef) -> Result<&Partition> {
        self.device(&target.device_node)?
            .table()?
            .partition(target.id)
            .ok_or_else(|| ModelError::PartitionNotFound(target.clone()))
    }

    pub fn partition_mut(&mut self, target: &PartitionRef) -> Result<&mut Partition> {
        self.device_mut(&target.device_node)?
            .table_mut()?
            .partition_mut(target.id)
            .ok_or_else(|| ModelError::PartitionNotFound(target.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::NodeRef;
    use crate::table::TableType;

    #[test]
    fn devices_compare_by_node() {
        let a = Device::disk("Disk A", "/dev/sda", 512, 1000);
        let mut b = Device::disk("Renamed", "/dev/sda", 4096, 10);
        b.icon_name = "other".to_string();
        assert_eq!(a, b);
        assert_ne!(a, Device::disk("Disk A", "/dev/sdb", 512, 1000));
    }

    #[test]
    fn inserting_replaces_same_node() {
        let mut set = DeviceSet::new();
        set.insert(Device::disk("a", "/dev/sda", 512, 1000));
        set.insert(Device::disk("a2", "/dev/sda", 512, 2000));
        assert_eq!(set.len(), 1);
        assert_eq!(set.device("/dev/sda").unwrap().total_logical_sectors, 2000);
        assert!(matches!(set.device("/dev/sdz"), Err(ModelError::DeviceNotFound(_))));
    }

    #[test]
    fn volume_group_sectors_are_extents() {
        let vg = VolumeGroup {
            name: "vg0".to_string(),
            extent_size: 4 * 1024 * 1024,
            physical_volumes: vec![
                PhysicalVolume { path: "/dev/sda2".to_string(), extents: 100 },
                PhysicalVolume { path: "/dev/sdb1".to_string(), extents: 50 },
            ],
        };
        let mut dev = Device::lvm(vg)
            .with_partition_table(PartitionTable::new(TableType::Vmd, 0, 149));
        assert_eq!(dev.device_node, "/dev/vg0");
        assert_eq!(dev.capacity().bytes(), 150 * 4 * 1024 * 1024);

        dev.set_physical_volumes(vec![PhysicalVolume { path: "/dev/sda2".to_string(), extents: 100 }]);
        assert_eq!(dev.total_logical_sectors, 100);
        assert_eq!(dev.table().unwrap().last_usable(), 99);

        dev.update_unallocated();
        let table = dev.table().unwrap();
        let free = table.partition(table.children(NodeRef::Root)[0]).unwrap();
        assert_eq!((free.first_sector, free.last_sector), (0, 99));
    }
}
