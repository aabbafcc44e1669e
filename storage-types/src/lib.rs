// SPDX-License-Identifier: GPL-3.0-only

//! Partition model for the storage operation engine
//!
//! This crate holds the in-memory picture that pending operations edit:
//!
//! - [`Device`] owns at most one [`PartitionTable`]
//! - [`PartitionTable`] is an arena of [`Partition`] records addressed by [`PartitionId`],
//!   with free space kept as synthetic unallocated partitions
//! - [`FileSystem`] describes what occupies a partition and which capabilities its
//!   type supports
//!
//! Nothing here performs I/O. The alignment helpers in [`alignment`] and the
//! capacity helpers in [`capacity`] are pure functions over the model.

pub mod alignment;
pub mod capacity;
pub mod device;
pub mod error;
pub mod filesystem;
pub mod partition;
pub mod table;

pub use alignment::AlignmentBounds;
pub use capacity::{ByteRange, Capacity, GIB, KIB, MIB, Unit, bytes_to_pretty, sector_count};
pub use device::{
    DEFAULT_SECTOR_ALIGNMENT, Device, DeviceGeometry, DeviceKind, DeviceSet, DeviceType,
    DiskGeometry, PhysicalVolume, VolumeGroup,
};
pub use error::{ModelError, Result};
pub use filesystem::{CommandSupportType, FileSystem, FileSystemType, FsCapability};
pub use partition::{
    NodeRef, Partition, PartitionFlag, PartitionFlags, PartitionId, PartitionRef, PartitionRole,
    PartitionRoles, PartitionState,
};
pub use table::{DetachedPartition, LayoutEntry, PartitionTable, TableType};
