// SPDX-License-Identifier: GPL-3.0-only

//! Partition records stored in a [`PartitionTable`](crate::PartitionTable) arena
//!
//! Partitions never point at each other directly. Each record carries its own
//! [`PartitionId`] and the id of its parent node; the owning table keeps the
//! records and the ordered child lists.

use std::fmt;

use enumflags2::{BitFlags, bitflags};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capacity::{Capacity, sector_count};
use crate::filesystem::{FileSystem, FileSystemType};

/// Stable handle of a partition record, unique across all devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionId(Uuid);

impl PartitionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PartitionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A node of the partition tree: the table root or a container partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRef {
    Root,
    Partition(PartitionId),
}

impl NodeRef {
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }
}

/// Addresses a partition on a specific device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionRef {
    pub device_node: String,
    pub id: PartitionId,
}

impl PartitionRef {
    pub fn new(device_node: impl Into<String>, id: PartitionId) -> Self {
        Self {
            device_node: device_node.into(),
            id,
        }
    }
}

impl fmt::Display for PartitionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.device_node, self.id)
    }
}

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionRole {
    Primary,
    Extended,
    Logical,
    Unallocated,
    Luks,
    LvmLv,
}

pub type PartitionRoles = BitFlags<PartitionRole>;

#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionFlag {
    Boot,
    Root,
    Swap,
    Hidden,
    Raid,
    Lvm,
    Lba,
    HpService,
    Palo,
    Prep,
    MsftReserved,
    BiosGrub,
    AppleTvRecovery,
    Diag,
    LegacyBoot,
    MsftData,
    Irst,
    Esp,
}

pub type PartitionFlags = BitFlags<PartitionFlag>;

impl PartitionFlag {
    pub fn name(self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::Root => "root",
            Self::Swap => "swap",
            Self::Hidden => "hidden",
            Self::Raid => "raid",
            Self::Lvm => "lvm",
            Self::Lba => "lba",
            Self::HpService => "hpservice",
            Self::Palo => "palo",
            Self::Prep => "prep",
            Self::MsftReserved => "msft-reserved",
            Self::BiosGrub => "bios-grub",
            Self::AppleTvRecovery => "apple-tv-recovery",
            Self::Diag => "diag",
            Self::LegacyBoot => "legacy-boot",
            Self::MsftData => "msft-data",
            Self::Irst => "irst",
            Self::Esp => "esp",
        }
    }
}

/// Lifecycle of a partition with respect to pending operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PartitionState {
    /// Exists on disk
    #[default]
    None,
    /// Will be created by a pending operation
    New,
    /// Will be created as the target of a pending copy
    Copy,
    /// Will be created as the target of a pending restore
    Restore,
}

/// A partition or a synthetic unallocated region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    id: PartitionId,
    pub(crate) parent: NodeRef,
    pub(crate) children: Vec<PartitionId>,

    pub first_sector: u64,

    /// Inclusive
    pub last_sector: u64,

    /// Device node of the owning device (e.g. "/dev/sda")
    pub device_path: String,

    /// Number assigned by the OS, `None` until the partition exists on disk
    pub number: Option<u32>,

    pub roles: PartitionRoles,

    pub file_system: FileSystem,

    /// Partition label (GPT name, LVM volume name)
    pub label: String,

    /// Partition UUID (GPT only)
    pub uuid: String,

    /// Attribute bits (GPT only)
    pub attributes: u64,

    pub available_flags: PartitionFlags,

    pub active_flags: PartitionFlags,

    pub mount_point: Option<String>,

    pub state: PartitionState,

    pub sector_size: u64,
}

impl Partition {
    pub fn new(
        device_path: impl Into<String>,
        parent: NodeRef,
        roles: PartitionRoles,
        file_system: FileSystem,
        first_sector: u64,
        last_sector: u64,
    ) -> Self {
        Self {
            id: PartitionId::new(),
            parent,
            children: Vec::new(),
            first_sector,
            last_sector,
            device_path: device_path.into(),
            number: None,
            roles,
            sector_size: file_system.sector_size,
            file_system,
            label: String::new(),
            uuid: String::new(),
            attributes: 0,
            available_flags: PartitionFlags::empty(),
            active_flags: PartitionFlags::empty(),
            mount_point: None,
            state: PartitionState::None,
        }
    }

    /// Synthetic free-space record
    pub fn unallocated(
        device_path: impl Into<String>,
        parent: NodeRef,
        roles: PartitionRoles,
        first_sector: u64,
        last_sector: u64,
        sector_size: u64,
    ) -> Self {
        let fs = FileSystem::new(FileSystemType::Unknown, first_sector, last_sector, sector_size);
        Self::new(
            device_path,
            parent,
            roles | PartitionRole::Unallocated,
            fs,
            first_sector,
            last_sector,
        )
    }

    /// Same content under a fresh id, detached from any children
    pub fn duplicate(&self) -> Self {
        Self {
            id: PartitionId::new(),
            children: Vec::new(),
            ..self.clone()
        }
    }

    pub fn id(&self) -> PartitionId {
        self.id
    }

    pub fn parent(&self) -> NodeRef {
        self.parent
    }

    pub fn set_parent(&mut self, parent: NodeRef) {
        self.parent = parent;
    }

    pub fn children(&self) -> &[PartitionId] {
        &self.children
    }

    pub fn with_number(mut self, number: u32) -> Self {
        self.number = Some(number);
        self
    }

    pub fn with_flags(mut self, available: PartitionFlags, active: PartitionFlags) -> Self {
        self.available_flags = available;
        self.active_flags = active;
        self
    }

    pub fn with_state(mut self, state: PartitionState) -> Self {
        self.state = state;
        self
    }

    pub fn with_mount_point(mut self, mount_point: impl Into<String>) -> Self {
        self.mount_point = Some(mount_point.into());
        self
    }

    pub fn reference(&self) -> PartitionRef {
        PartitionRef::new(self.device_path.clone(), self.id)
    }

    pub fn length(&self) -> u64 {
        sector_count(self.first_sector, self.last_sector)
    }

    pub fn capacity(&self) -> Capacity {
        Capacity::from_sectors(self.length(), self.sector_size)
    }

    pub fn first_byte(&self) -> u64 {
        self.first_sector * self.sector_size
    }

    pub fn last_byte(&self) -> u64 {
        (self.last_sector + 1) * self.sector_size - 1
    }

    pub fn is_unallocated(&self) -> bool {
        self.roles.contains(PartitionRole::Unallocated)
    }

    pub fn is_extended(&self) -> bool {
        self.roles.contains(PartitionRole::Extended)
    }

    pub fn is_logical(&self) -> bool {
        self.roles.contains(PartitionRole::Logical)
    }

    pub fn is_mounted(&self) -> bool {
        self.mount_point.is_some()
    }

    pub fn contains_sector(&self, sector: u64) -> bool {
        sector >= self.first_sector && sector <= self.last_sector
    }

    /// Device node the OS uses for this partition
    pub fn partition_path(&self) -> String {
        if self.roles.contains(PartitionRole::LvmLv) {
            return format!("{}/{}", self.device_path, self.label);
        }
        match self.number {
            Some(number) => {
                let needs_separator = self
                    .device_path
                    .chars()
                    .last()
                    .is_some_and(|c| c.is_ascii_digit());
                if needs_separator {
                    format!("{}p{}", self.device_path, number)
                } else {
                    format!("{}{}", self.device_path, number)
                }
            }
            None => "New Partition".to_string(),
        }
    }

    /// The file system keeps its own range until a job moves or resizes it.
    pub fn set_geometry(&mut self, first_sector: u64, last_sector: u64) {
        self.first_sector = first_sector;
        self.last_sector = last_sector;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext4(first: u64, last: u64) -> Partition {
        Partition::new(
            "/dev/sda",
            NodeRef::Root,
            PartitionRole::Primary.into(),
            FileSystem::new(FileSystemType::Ext4, first, last, 512),
            first,
            last,
        )
    }

    #[test]
    fn partition_paths_follow_kernel_naming() {
        let p = ext4(2048, 4095).with_number(3);
        assert_eq!(p.partition_path(), "/dev/sda3");

        let mut nvme = ext4(2048, 4095).with_number(2);
        nvme.device_path = "/dev/nvme0n1".to_string();
        assert_eq!(nvme.partition_path(), "/dev/nvme0n1p2");

        assert_eq!(ext4(2048, 4095).partition_path(), "New Partition");
    }

    #[test]
    fn duplicate_gets_fresh_identity() {
        let p = ext4(2048, 4095);
        let copy = p.duplicate();
        assert_ne!(p.id(), copy.id());
        assert_eq!(copy.first_sector, p.first_sector);
        assert_eq!(copy.file_system, p.file_system);
    }

    #[test]
    fn unallocated_records_carry_the_role() {
        let free = Partition::unallocated(
            "/dev/sda",
            NodeRef::Root,
            PartitionRoles::empty(),
            0,
            99,
            512,
        );
        assert!(free.is_unallocated());
        assert_eq!(free.length(), 100);
        assert_eq!(free.capacity().bytes(), 51_200);
    }

    #[test]
    fn role_flags_serialize() {
        let roles = PartitionRole::Logical | PartitionRole::Unallocated;
        let json = serde_json::to_string(&roles).unwrap();
        let parsed: PartitionRoles = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, roles);
    }
}
