// SPDX-License-Identifier: GPL-3.0-only

//! File system descriptors and per-type capability tables
//!
//! A [`FileSystem`] only describes the sector range and identity of a file system
//! inside a partition. Actually creating, resizing or checking one is done by the
//! file system tool collaborator, which consults [`FileSystemType::default_support`]
//! (or its own override) to decide how each capability is carried out.

use serde::{Deserialize, Serialize};

use crate::capacity::{Capacity, sector_count};

/// Known file system formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileSystemType {
    Unknown,
    /// Pseudo file system carried by msdos extended partitions
    Extended,
    Unformatted,
    Ext2,
    Ext3,
    Ext4,
    LinuxSwap,
    Fat12,
    Fat16,
    Fat32,
    Exfat,
    Ntfs,
    Xfs,
    Btrfs,
    F2fs,
    Jfs,
    Nilfs2,
    Hfs,
    HfsPlus,
    Udf,
    Iso9660,
    Luks,
    Luks2,
    Lvm2Pv,
    Zfs,
}

/// How, if at all, a file system type supports a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandSupportType {
    /// Not supported
    None,
    /// Handled by the engine itself (block copy, no-op model update)
    Core,
    /// Handled by an external file system tool
    FileSystem,
    /// Handled natively by the backend plugin
    Backend,
}

impl CommandSupportType {
    pub fn is_supported(self) -> bool {
        self != Self::None
    }
}

/// Capabilities a file system type may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FsCapability {
    Create,
    Grow,
    Shrink,
    Move,
    Copy,
    Check,
    Backup,
    ReadLabel,
    WriteLabel,
    WriteLabelOnline,
    ReadUuid,
    UpdateUuid,
    GrowOnline,
    ShrinkOnline,
}

impl FileSystemType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Extended => "extended",
            Self::Unformatted => "unformatted",
            Self::Ext2 => "ext2",
            Self::Ext3 => "ext3",
            Self::Ext4 => "ext4",
            Self::LinuxSwap => "linuxswap",
            Self::Fat12 => "fat12",
            Self::Fat16 => "fat16",
            Self::Fat32 => "fat32",
            Self::Exfat => "exfat",
            Self::Ntfs => "ntfs",
            Self::Xfs => "xfs",
            Self::Btrfs => "btrfs",
            Self::F2fs => "f2fs",
            Self::Jfs => "jfs",
            Self::Nilfs2 => "nilfs2",
            Self::Hfs => "hfs",
            Self::HfsPlus => "hfsplus",
            Self::Udf => "udf",
            Self::Iso9660 => "iso9660",
            Self::Luks => "luks",
            Self::Luks2 => "luks2",
            Self::Lvm2Pv => "lvm2 pv",
            Self::Zfs => "zfs",
        }
    }

    /// Parse from blkid-style type strings
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "extended" => Self::Extended,
            "unformatted" => Self::Unformatted,
            "ext2" => Self::Ext2,
            "ext3" => Self::Ext3,
            "ext4" => Self::Ext4,
            "swap" | "linuxswap" | "linux-swap" => Self::LinuxSwap,
            "fat12" => Self::Fat12,
            "fat16" => Self::Fat16,
            "vfat" | "fat32" => Self::Fat32,
            "exfat" => Self::Exfat,
            "ntfs" => Self::Ntfs,
            "xfs" => Self::Xfs,
            "btrfs" => Self::Btrfs,
            "f2fs" => Self::F2fs,
            "jfs" => Self::Jfs,
            "nilfs2" => Self::Nilfs2,
            "hfs" => Self::Hfs,
            "hfsplus" => Self::HfsPlus,
            "udf" => Self::Udf,
            "iso9660" => Self::Iso9660,
            "crypto_luks" | "luks" => Self::Luks,
            "luks2" => Self::Luks2,
            "lvm2_member" | "lvm2 pv" => Self::Lvm2Pv,
            "zfs_member" | "zfs" => Self::Zfs,
            _ => Self::Unknown,
        }
    }

    /// Built-in capability table
    pub fn default_support(self, capability: FsCapability) -> CommandSupportType {
        use CommandSupportType::{Core, FileSystem, None};
        use FsCapability as C;

        match self {
            Self::Unknown | Self::Iso9660 | Self::Udf | Self::Zfs => match capability {
                C::Copy | C::Move | C::Backup if self != Self::Unknown => Core,
                _ => None,
            },
            Self::Extended => match capability {
                C::Create | C::Grow | C::Shrink | C::Move => Core,
                _ => None,
            },
            Self::Unformatted => match capability {
                C::Create => FileSystem,
                C::Grow | C::Shrink | C::Move | C::Copy | C::Backup => Core,
                _ => None,
            },
            Self::Ext2 | Self::Ext3 | Self::Ext4 => match capability {
                C::Move | C::Copy | C::Backup => Core,
                C::ShrinkOnline | C::WriteLabelOnline => None,
                _ => FileSystem,
            },
            Self::Btrfs => match capability {
                C::Move | C::Copy | C::Backup => Core,
                _ => FileSystem,
            },
            Self::Xfs => match capability {
                C::Move | C::Copy | C::Backup => Core,
                C::Shrink | C::ShrinkOnline | C::WriteLabelOnline => None,
                _ => FileSystem,
            },
            Self::Fat12 | Self::Fat16 | Self::Fat32 | Self::Exfat => match capability {
                C::Move | C::Copy | C::Backup => Core,
                C::GrowOnline | C::ShrinkOnline | C::WriteLabelOnline => None,
                C::Grow | C::Shrink if self == Self::Exfat => None,
                _ => FileSystem,
            },
            Self::Ntfs => match capability {
                C::Move | C::Copy | C::Backup => Core,
                C::GrowOnline | C::ShrinkOnline | C::WriteLabelOnline => None,
                _ => FileSystem,
            },
            Self::LinuxSwap => match capability {
                C::Move | C::Copy | C::Backup => Core,
                C::Check | C::GrowOnline | C::ShrinkOnline | C::WriteLabelOnline => None,
                _ => FileSystem,
            },
            Self::F2fs | Self::Jfs | Self::Nilfs2 => match capability {
                C::Move | C::Copy | C::Backup => Core,
                C::Shrink | C::ShrinkOnline | C::WriteLabelOnline => None,
                _ => FileSystem,
            },
            Self::Hfs | Self::HfsPlus => match capability {
                C::Move | C::Copy | C::Backup => Core,
                C::Create | C::Check | C::ReadLabel => FileSystem,
                _ => None,
            },
            Self::Luks | Self::Luks2 => match capability {
                C::Move | C::Copy | C::Backup => Core,
                C::Create | C::ReadUuid | C::UpdateUuid | C::ReadLabel => FileSystem,
                C::WriteLabel if self == Self::Luks2 => FileSystem,
                _ => None,
            },
            Self::Lvm2Pv => match capability {
                C::Create | C::Grow | C::Shrink | C::Check | C::ReadUuid | C::GrowOnline => {
                    FileSystem
                }
                C::Move | C::Copy | C::Backup => Core,
                _ => None,
            },
        }
    }
}

/// A file system occupying a sector range inside a partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystem {
    pub fs_type: FileSystemType,

    /// First sector (absolute, on the owning device)
    pub first_sector: u64,

    /// Last sector, inclusive
    pub last_sector: u64,

    /// Logical sector size of the owning device
    pub sector_size: u64,

    /// Sectors in use, when known
    pub sectors_used: Option<u64>,

    pub label: String,

    pub uuid: String,
}

impl FileSystem {
    pub fn new(fs_type: FileSystemType, first_sector: u64, last_sector: u64, sector_size: u64) -> Self {
        Self {
            fs_type,
            first_sector,
            last_sector,
            sector_size,
            sectors_used: None,
            label: String::new(),
            uuid: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    /// Length in sectors
    pub fn length(&self) -> u64 {
        sector_count(self.first_sector, self.last_sector)
    }

    pub fn first_byte(&self) -> u64 {
        self.first_sector * self.sector_size
    }

    pub fn last_byte(&self) -> u64 {
        (self.last_sector + 1) * self.sector_size - 1
    }

    pub fn capacity(&self) -> Capacity {
        Capacity::from_sectors(self.length(), self.sector_size)
    }

    pub fn name(&self) -> &'static str {
        self.fs_type.name()
    }

    /// Move both ends, keeping the length
    pub fn set_first_sector_keep_length(&mut self, first_sector: u64) {
        let length = self.length();
        self.first_sector = first_sector;
        self.last_sector = first_sector + length.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unformatted_creation_is_a_tool_noop_and_resizes_are_core() {
        let t = FileSystemType::Unformatted;
        assert_eq!(t.default_support(FsCapability::Create), CommandSupportType::FileSystem);
        assert_eq!(t.default_support(FsCapability::Grow), CommandSupportType::Core);
        assert_eq!(t.default_support(FsCapability::Check), CommandSupportType::None);
    }

    #[test]
    fn xfs_cannot_shrink() {
        assert!(!FileSystemType::Xfs.default_support(FsCapability::Shrink).is_supported());
        assert!(FileSystemType::Xfs.default_support(FsCapability::Grow).is_supported());
    }

    #[test]
    fn unknown_file_systems_support_nothing() {
        for capability in [FsCapability::Copy, FsCapability::Move, FsCapability::Create] {
            assert_eq!(
                FileSystemType::Unknown.default_support(capability),
                CommandSupportType::None
            );
        }
    }

    #[test]
    fn byte_bounds_follow_sector_size() {
        let fs = FileSystem::new(FileSystemType::Ext4, 2048, 4095, 512);
        assert_eq!(fs.length(), 2048);
        assert_eq!(fs.first_byte(), 1_048_576);
        assert_eq!(fs.last_byte(), 2_097_151);
    }

    #[test]
    fn parses_blkid_names() {
        assert_eq!(FileSystemType::parse("vfat"), FileSystemType::Fat32);
        assert_eq!(FileSystemType::parse("crypto_LUKS"), FileSystemType::Luks);
        assert_eq!(FileSystemType::parse("nonsense"), FileSystemType::Unknown);
    }
}
