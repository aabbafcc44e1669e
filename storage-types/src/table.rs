// SPDX-License-Identifier: GPL-3.0-only

//! Partition tables and the unallocated-space engine
//!
//! A [`PartitionTable`] owns every partition record of one device in an arena keyed by
//! [`PartitionId`]. Child order lives in the table (for the root) and in each extended
//! partition (for logicals); both lists stay sorted by first sector.
//!
//! Free space is represented by synthetic partitions carrying the
//! [`PartitionRole::Unallocated`] role. They are never edited in place: every
//! recomputation removes all of them and rebuilds the set from the real partitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceGeometry, DeviceType};
use crate::error::{ModelError, Result};
use crate::filesystem::FileSystemType;
use crate::partition::{
    NodeRef, Partition, PartitionFlags, PartitionId, PartitionRole, PartitionRoles, PartitionState,
};

/// Sectors GPT keeps at the end of the disk for the backup header and entries
const GPT_BACKUP_SECTORS: u64 = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableType {
    Aix,
    Bsd,
    Dasd,
    /// Cylinder-aligned msdos
    Msdos,
    /// msdos aligned on sector boundaries
    MsdosSectorBased,
    Dvh,
    Gpt,
    Loop,
    Mac,
    Pc98,
    Amiga,
    Sun,
    /// Pseudo table of a volume manager (LVM, RAID)
    Vmd,
    Unknown,
}

impl TableType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Aix => "aix",
            Self::Bsd => "bsd",
            Self::Dasd => "dasd",
            Self::Msdos | Self::MsdosSectorBased => "msdos",
            Self::Dvh => "dvh",
            Self::Gpt => "gpt",
            Self::Loop => "loop",
            Self::Mac => "mac",
            Self::Pc98 => "pc98",
            Self::Amiga => "amiga",
            Self::Sun => "sun",
            Self::Vmd => "vmd",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "aix" => Self::Aix,
            "bsd" => Self::Bsd,
            "dasd" => Self::Dasd,
            "msdos" | "dos" | "mbr" => Self::MsdosSectorBased,
            "msdos-cylinder" => Self::Msdos,
            "dvh" => Self::Dvh,
            "gpt" => Self::Gpt,
            "loop" => Self::Loop,
            "mac" => Self::Mac,
            "pc98" => Self::Pc98,
            "amiga" => Self::Amiga,
            "sun" => Self::Sun,
            "vmd" => Self::Vmd,
            _ => Self::Unknown,
        }
    }

    pub fn max_primaries(self) -> u32 {
        match self {
            Self::Aix | Self::Loop | Self::Vmd | Self::Unknown => 1,
            Self::Dasd => 3,
            Self::Msdos | Self::MsdosSectorBased => 4,
            Self::Bsd | Self::Sun => 8,
            Self::Dvh => 16,
            Self::Pc98 => 16,
            Self::Mac => 256,
            Self::Gpt => 128,
            Self::Amiga => 128,
        }
    }

    pub fn supports_extended(self) -> bool {
        matches!(self, Self::Msdos | Self::MsdosSectorBased)
    }

    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Aix | Self::Dasd | Self::Loop | Self::Vmd | Self::Unknown)
    }

    pub fn is_msdos(self) -> bool {
        matches!(self, Self::Msdos | Self::MsdosSectorBased)
    }

    pub fn supports_partition_label(self) -> bool {
        self == Self::Gpt
    }

    pub fn supports_partition_uuid(self) -> bool {
        self == Self::Gpt
    }

    pub fn supports_partition_attributes(self) -> bool {
        self == Self::Gpt
    }
}

/// A partition record detached from its table, together with its descendants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachedPartition {
    pub partition: Partition,
    pub descendants: Vec<Partition>,
}

impl DetachedPartition {
    pub fn new(partition: Partition) -> Self {
        Self {
            partition,
            descendants: Vec::new(),
        }
    }

    pub fn id(&self) -> PartitionId {
        self.partition.id()
    }
}

/// Structural, id-free view of one partition used to compare layouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub depth: usize,
    pub first_sector: u64,
    pub last_sector: u64,
    pub roles: PartitionRoles,
    pub number: Option<u32>,
    pub fs_type: FileSystemType,
    pub fs_first_sector: u64,
    pub fs_last_sector: u64,
    pub fs_label: String,
    pub label: String,
    pub active_flags: PartitionFlags,
    pub state: PartitionState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTable {
    table_type: TableType,
    first_usable: u64,
    last_usable: u64,
    max_primaries: u32,
    children: Vec<PartitionId>,
    partitions: BTreeMap<PartitionId, Partition>,
}

impl PartitionTable {
    pub fn new(table_type: TableType, first_usable: u64, last_usable: u64) -> Self {
        Self {
            table_type,
            first_usable,
            last_usable,
            max_primaries: table_type.max_primaries(),
            children: Vec::new(),
            partitions: BTreeMap::new(),
        }
    }

    /// Empty table with the usable range a fresh table of this type gets on `geometry`
    pub fn with_defaults(table_type: TableType, geometry: &DeviceGeometry) -> Self {
        Self::new(
            table_type,
            Self::default_first_usable(geometry, table_type),
            Self::default_last_usable(geometry, table_type),
        )
    }

    pub fn default_first_usable(geometry: &DeviceGeometry, table_type: TableType) -> u64 {
        match table_type {
            TableType::Vmd => 0,
            TableType::Msdos if geometry.sectors_per_track > 0 => geometry.sectors_per_track,
            _ => geometry.sector_alignment,
        }
    }

    pub fn default_last_usable(geometry: &DeviceGeometry, table_type: TableType) -> u64 {
        let last = geometry.total_sectors.saturating_sub(1);
        if table_type == TableType::Gpt {
            last.saturating_sub(GPT_BACKUP_SECTORS + 1)
        } else {
            last
        }
    }

    pub fn table_type(&self) -> TableType {
        self.table_type
    }

    pub fn first_usable(&self) -> u64 {
        self.first_usable
    }

    pub fn last_usable(&self) -> u64 {
        self.last_usable
    }

    pub fn set_first_usable(&mut self, sector: u64) {
        self.first_usable = sector;
    }

    pub fn set_last_usable(&mut self, sector: u64) {
        self.last_usable = sector;
    }

    pub fn max_primaries(&self) -> u32 {
        self.max_primaries
    }

    pub fn set_max_primaries(&mut self, max_primaries: u32) {
        self.max_primaries = max_primaries;
    }

    pub fn partition(&self, id: PartitionId) -> Option<&Partition> {
        self.partitions.get(&id)
    }

    pub fn partition_mut(&mut self, id: PartitionId) -> Option<&mut Partition> {
        self.partitions.get_mut(&id)
    }

    pub fn contains(&self, id: PartitionId) -> bool {
        self.partitions.contains_key(&id)
    }

    /// Ordered children of a node; unknown nodes have none
    pub fn children(&self, node: NodeRef) -> &[PartitionId] {
        match node {
            NodeRef::Root => &self.children,
            NodeRef::Partition(id) => self
                .partitions
                .get(&id)
                .map(|p| p.children.as_slice())
                .unwrap_or(&[]),
        }
    }

    fn children_mut(&mut self, node: NodeRef) -> Option<&mut Vec<PartitionId>> {
        match node {
            NodeRef::Root => Some(&mut self.children),
            NodeRef::Partition(id) => self.partitions.get_mut(&id).map(|p| &mut p.children),
        }
    }

    /// All partitions in tree order (each parent before its children)
    pub fn partitions(&self) -> Vec<&Partition> {
        let mut out = Vec::with_capacity(self.partitions.len());
        self.walk(NodeRef::Root, &mut |p, _| out.push(p));
        out
    }

    /// Real partitions only
    pub fn allocated(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.values().filter(|p| !p.is_unallocated())
    }

    fn walk<'a>(&'a self, node: NodeRef, visit: &mut dyn FnMut(&'a Partition, usize)) {
        fn go<'a>(
            table: &'a PartitionTable,
            node: NodeRef,
            depth: usize,
            visit: &mut dyn FnMut(&'a Partition, usize),
        ) {
            for id in table.children(node) {
                if let Some(p) = table.partitions.get(id) {
                    visit(p, depth);
                    go(table, NodeRef::Partition(*id), depth + 1, visit);
                }
            }
        }
        go(self, node, 0, visit);
    }

    /// Insert a record under its parent node, keeping siblings sorted
    pub fn insert(&mut self, partition: Partition) -> Result<PartitionId> {
        let id = partition.id();
        let parent = partition.parent();
        if let NodeRef::Partition(parent_id) = parent
            && !self.partitions.contains_key(&parent_id)
        {
            return Err(ModelError::ParentNotFound {
                id,
                parent: parent_id,
            });
        }

        let first = partition.first_sector;
        let position = self
            .children(parent)
            .iter()
            .position(|sibling| {
                self.partitions
                    .get(sibling)
                    .is_some_and(|s| s.first_sector > first)
            })
            .unwrap_or(self.children(parent).len());

        self.partitions.insert(id, partition);
        if let Some(siblings) = self.children_mut(parent) {
            siblings.insert(position, id);
        }
        Ok(id)
    }

    /// Detach a partition and its subtree; the records move out of the table
    pub fn take(&mut self, id: PartitionId) -> Option<DetachedPartition> {
        let parent = self.partitions.get(&id)?.parent();
        if let Some(siblings) = self.children_mut(parent) {
            siblings.retain(|c| *c != id);
        }

        let mut descendants = Vec::new();
        let mut pending = self.partitions.get(&id)?.children.clone();
        while let Some(child) = pending.pop() {
            if let Some(record) = self.partitions.remove(&child) {
                pending.extend(record.children.iter().copied());
                descendants.push(record);
            }
        }
        let partition = self.partitions.remove(&id)?;
        Some(DetachedPartition {
            partition,
            descendants,
        })
    }

    /// Reattach a subtree previously returned by [`take`](Self::take)
    pub fn restore(&mut self, detached: DetachedPartition) -> Result<PartitionId> {
        let DetachedPartition {
            partition,
            descendants,
        } = detached;
        let id = self.insert(partition)?;
        for record in descendants {
            self.partitions.insert(record.id(), record);
        }
        Ok(id)
    }

    /// Drop a partition and its subtree
    pub fn remove(&mut self, id: PartitionId) -> Result<Partition> {
        self.take(id)
            .map(|d| d.partition)
            .ok_or(ModelError::UnknownPartition(id))
    }

    /// Re-sort a node's children after geometry changes
    pub fn resort(&mut self, node: NodeRef) {
        let Some(mut ids) = self.children_mut(node).map(std::mem::take) else {
            return;
        };
        ids.sort_by_key(|id| self.partitions.get(id).map_or(u64::MAX, |p| p.first_sector));
        if let Some(children) = self.children_mut(node) {
            *children = ids;
        }
    }

    /// Move a partition under another node, keeping both child lists sorted
    pub fn reparent(&mut self, id: PartitionId, parent: NodeRef) -> Result<()> {
        let mut detached = self.take(id).ok_or(ModelError::UnknownPartition(id))?;
        detached.partition.set_parent(parent);
        self.restore(detached).map(|_| ())
    }

    pub fn extended(&self) -> Option<PartitionId> {
        self.children
            .iter()
            .copied()
            .find(|id| self.partitions.get(id).is_some_and(Partition::is_extended))
    }

    pub fn has_extended(&self) -> bool {
        self.extended().is_some()
    }

    /// Primary and extended partitions; logicals do not count
    pub fn num_primaries(&self) -> u32 {
        self.children
            .iter()
            .filter_map(|id| self.partitions.get(id))
            .filter(|p| {
                !p.is_unallocated()
                    && p.roles
                        .intersects(PartitionRole::Primary | PartitionRole::Extended)
            })
            .count() as u32
    }

    /// Roles a partition created in place of `id` may take
    pub fn child_roles(&self, id: PartitionId) -> PartitionRoles {
        let parent = self.partitions.get(&id).map_or(NodeRef::Root, Partition::parent);
        if !parent.is_root() {
            return PartitionRole::Logical.into();
        }
        let mut roles: PartitionRoles = PartitionRole::Primary.into();
        if !self.has_extended() && self.table_type.supports_extended() {
            roles |= PartitionRole::Extended;
        }
        roles
    }

    /// Deepest partition containing `sector` whose roles intersect `roles`
    pub fn find_partition_by_sector(&self, sector: u64, roles: PartitionRoles) -> Option<PartitionId> {
        for id in &self.children {
            let Some(p) = self.partitions.get(id) else {
                continue;
            };
            for child in &p.children {
                if let Some(c) = self.partitions.get(child)
                    && c.roles.intersects(roles)
                    && c.contains_sector(sector)
                {
                    return Some(*child);
                }
            }
            if p.roles.intersects(roles) && p.contains_sector(sector) {
                return Some(*id);
            }
        }
        None
    }

    /// Renumber the logicals of `extended` after one was deleted or re-inserted
    ///
    /// The kernel numbers logicals without gaps, so deleting `sda6` turns `sda7` into
    /// `sda6`. Numbers up to four belong to primaries and never shift.
    pub fn adjust_logical_numbers(
        &mut self,
        extended: PartitionId,
        deleted: Option<u32>,
        inserted: Option<u32>,
    ) {
        let Some(ext) = self.partitions.get(&extended) else {
            return;
        };
        if !ext.is_extended() {
            return;
        }
        for child in ext.children.clone() {
            let Some(p) = self.partitions.get_mut(&child) else {
                continue;
            };
            let Some(number) = p.number else {
                continue;
            };
            match (deleted, inserted) {
                (Some(d), _) if d > 4 && number > d => p.number = Some(number - 1),
                (_, Some(i)) if i > 4 && number >= i => p.number = Some(number + 1),
                _ => {}
            }
        }
    }

    pub fn remove_unallocated(&mut self) {
        let free: Vec<PartitionId> = self
            .partitions
            .values()
            .filter(|p| p.is_unallocated())
            .map(Partition::id)
            .collect();
        for id in free {
            self.take(id);
        }
    }

    /// Rebuild every unallocated region of the table
    pub fn update_unallocated(&mut self, geometry: &DeviceGeometry) {
        self.remove_unallocated();
        self.insert_unallocated(geometry, NodeRef::Root, self.first_usable);
    }

    fn insert_unallocated(&mut self, geometry: &DeviceGeometry, node: NodeRef, start: u64) {
        if geometry.device_type == DeviceType::Lvm {
            self.relinearize(geometry);
            return;
        }

        let mut last_end = start;
        for id in self.children(node).to_vec() {
            let Some(p) = self.partitions.get(&id) else {
                continue;
            };
            let (first, last, extended) = (p.first_sector, p.last_sector, p.is_extended());
            if first > last_end {
                self.create_unallocated(geometry, node, last_end, first - 1);
            }
            if extended {
                self.insert_unallocated(geometry, NodeRef::Partition(id), first);
            }
            last_end = last + 1;
        }

        let parent_end = match node {
            NodeRef::Root => self.last_usable,
            NodeRef::Partition(id) => match self.partitions.get(&id) {
                Some(p) => p.last_sector,
                None => return,
            },
        };
        if parent_end >= self.first_usable && parent_end >= last_end {
            self.create_unallocated(geometry, node, last_end, parent_end);
        }
    }

    /// Volume groups have no positional layout: logical volumes are laid out back to
    /// back in name order and the free extents follow as one region.
    fn relinearize(&mut self, geometry: &DeviceGeometry) {
        let mut ids = self.children.clone();
        ids.sort_by_key(|id| {
            self.partitions
                .get(id)
                .map(Partition::partition_path)
                .unwrap_or_default()
        });

        let mut last_end = 0u64;
        for id in &ids {
            let Some(p) = self.partitions.get_mut(id) else {
                continue;
            };
            let length = p.length();
            let fs_offset = p.file_system.first_sector.saturating_sub(p.first_sector);
            let fs_length = p.file_system.length();
            p.first_sector = last_end;
            p.last_sector = (last_end + length).saturating_sub(1);
            p.file_system.first_sector = last_end + fs_offset;
            p.file_system.last_sector = (last_end + fs_offset + fs_length).saturating_sub(1);
            last_end += length;
        }
        self.children = ids;

        let free = geometry.total_sectors.saturating_sub(last_end);
        if free > 0 {
            self.create_unallocated(geometry, NodeRef::Root, last_end, last_end + free - 1);
        }
    }

    fn create_unallocated(&mut self, geometry: &DeviceGeometry, node: NodeRef, start: u64, end: u64) {
        let mut roles = PartitionRoles::empty();
        if !node.is_root() {
            roles |= PartitionRole::Logical;
        }
        if geometry.device_type == DeviceType::Lvm {
            roles |= PartitionRole::LvmLv;
        }

        let Some((start, end)) = self.unallocated_range(geometry, node, start, end) else {
            return;
        };
        let free = Partition::unallocated(
            geometry.device_node.clone(),
            node,
            roles,
            start,
            end,
            geometry.sector_size,
        );
        if let Err(e) = self.insert(free) {
            tracing::warn!(error = %e, "could not insert unallocated region");
        }
    }

    /// Usable part of a free range, or `None` when it is too small to hold a partition
    ///
    /// Inside an extended partition one track (msdos) or one alignment unit is kept
    /// free after the start of every gap, and before its end unless the gap reaches
    /// the end of the extended partition, for the extended boot records.
    pub fn unallocated_range(
        &self,
        geometry: &DeviceGeometry,
        node: NodeRef,
        start: u64,
        end: u64,
    ) -> Option<(u64, u64)> {
        match geometry.device_type {
            DeviceType::Disk | DeviceType::SoftwareRaid => {
                let (mut start, mut end) = (start, end);
                if let NodeRef::Partition(extended) = node {
                    let extended_last = self.partitions.get(&extended)?.last_sector;
                    let reserve = if self.table_type == TableType::Msdos {
                        geometry.sectors_per_track
                    } else {
                        geometry.sector_alignment
                    };
                    start += reserve;
                    if end < extended_last {
                        end = end.checked_sub(reserve)?;
                    }
                }
                if end < start {
                    return None;
                }
                (end - start + 1 >= geometry.sector_alignment).then_some((start, end))
            }
            DeviceType::Lvm => (end >= start).then_some((start, end)),
            DeviceType::FakeRaid | DeviceType::Unknown => None,
        }
    }

    /// Id-free snapshot of the tree, for comparing layouts across edits
    pub fn layout(&self) -> Vec<LayoutEntry> {
        let mut out = Vec::new();
        self.walk(NodeRef::Root, &mut |p, depth| {
            out.push(LayoutEntry {
                depth,
                first_sector: p.first_sector,
                last_sector: p.last_sector,
                roles: p.roles,
                number: p.number,
                fs_type: p.file_system.fs_type,
                fs_first_sector: p.file_system.first_sector,
                fs_last_sector: p.file_system.last_sector,
                fs_label: p.file_system.label.clone(),
                label: p.label.clone(),
                active_flags: p.active_flags,
                state: p.state,
            })
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::FileSystem;

    fn disk(total: u64) -> DeviceGeometry {
        DeviceGeometry {
            device_node: "/dev/sda".to_string(),
            device_type: DeviceType::Disk,
            sector_size: 512,
            total_sectors: total,
            sector_alignment: 2048,
            sectors_per_track: 63,
        }
    }

    fn part(parent: NodeRef, roles: PartitionRoles, fs: FileSystemType, first: u64, last: u64) -> Partition {
        Partition::new(
            "/dev/sda",
            parent,
            roles,
            FileSystem::new(fs, first, last, 512),
            first,
            last,
        )
    }

    fn assert_covers(table: &PartitionTable, node: NodeRef, first: u64, last: u64) {
        let mut expected = first;
        for id in table.children(node) {
            let p = table.partition(*id).unwrap();
            assert_eq!(p.first_sector, expected, "gap or overlap before {}", p.first_sector);
            expected = p.last_sector + 1;
        }
        assert_eq!(expected, last + 1);
    }

    #[test]
    fn empty_table_is_one_free_region() {
        let g = disk(1_024_000);
        let mut table = PartitionTable::with_defaults(TableType::Gpt, &g);
        table.update_unallocated(&g);

        assert_eq!(table.children(NodeRef::Root).len(), 1);
        assert_covers(&table, NodeRef::Root, 2048, 1_024_000 - 35);
    }

    #[test]
    fn gaps_around_partitions_are_filled_and_idempotent() {
        let g = disk(1_024_000);
        let mut table = PartitionTable::new(TableType::Gpt, 2048, 1_021_951);
        let a = table
            .insert(part(NodeRef::Root, PartitionRole::Primary.into(), FileSystemType::Ext4, 4096, 204_799))
            .unwrap();
        table
            .insert(part(NodeRef::Root, PartitionRole::Primary.into(), FileSystemType::Xfs, 409_600, 614_399))
            .unwrap();

        table.update_unallocated(&g);
        assert_eq!(table.children(NodeRef::Root).len(), 5);
        assert_covers(&table, NodeRef::Root, 2048, 1_021_951);

        let before = table.layout();
        table.update_unallocated(&g);
        assert_eq!(table.layout(), before);
        assert!(table.contains(a));
        assert_eq!(table.allocated().count(), 2);
    }

    #[test]
    fn tiny_gaps_are_not_represented() {
        let g = disk(1_024_000);
        let mut table = PartitionTable::new(TableType::Gpt, 2048, 1_021_951);
        table
            .insert(part(NodeRef::Root, PartitionRole::Primary.into(), FileSystemType::Ext4, 2048, 204_799))
            .unwrap();
        table
            .insert(part(NodeRef::Root, PartitionRole::Primary.into(), FileSystemType::Ext4, 205_000, 1_021_951))
            .unwrap();

        table.update_unallocated(&g);
        assert!(table.partitions().iter().all(|p| !p.is_unallocated()));
    }

    #[test]
    fn extended_partitions_reserve_room_for_boot_records() {
        let g = disk(2_048_000);
        let mut table = PartitionTable::new(TableType::MsdosSectorBased, 2048, 2_047_999);
        let ext = table
            .insert(part(
                NodeRef::Root,
                PartitionRole::Extended.into(),
                FileSystemType::Extended,
                2048,
                1_026_047,
            ))
            .unwrap();
        table
            .insert(part(
                NodeRef::Partition(ext),
                PartitionRole::Logical.into(),
                FileSystemType::Ext4,
                4096,
                206_847,
            ))
            .unwrap();

        table.update_unallocated(&g);

        let logicals: Vec<&Partition> = table
            .children(NodeRef::Partition(ext))
            .iter()
            .map(|id| table.partition(*id).unwrap())
            .collect();
        assert_eq!(logicals.len(), 2);
        let free = logicals[1];
        assert!(free.is_unallocated() && free.is_logical());
        // gap reaches the end of the extended partition: only the start is reserved
        assert_eq!(free.first_sector, 206_848 + 2048);
        assert_eq!(free.last_sector, 1_026_047);
    }

    #[test]
    fn child_roles_follow_parent_and_extended_presence() {
        let g = disk(2_048_000);
        let mut table = PartitionTable::with_defaults(TableType::MsdosSectorBased, &g);
        table.update_unallocated(&g);
        let free = table.children(NodeRef::Root)[0];
        assert_eq!(
            table.child_roles(free),
            PartitionRole::Primary | PartitionRole::Extended
        );

        let ext = table
            .insert(part(
                NodeRef::Root,
                PartitionRole::Extended.into(),
                FileSystemType::Extended,
                1_024_000,
                2_047_999,
            ))
            .unwrap();
        table.update_unallocated(&g);
        let root_free = table.children(NodeRef::Root)[0];
        assert_eq!(table.child_roles(root_free), PartitionRoles::from(PartitionRole::Primary));
        let logical_free = table.children(NodeRef::Partition(ext))[0];
        assert_eq!(table.child_roles(logical_free), PartitionRoles::from(PartitionRole::Logical));
        assert_eq!(table.num_primaries(), 1);
    }

    #[test]
    fn sector_lookup_prefers_logicals() {
        let mut table = PartitionTable::new(TableType::MsdosSectorBased, 2048, 2_047_999);
        let ext = table
            .insert(part(NodeRef::Root, PartitionRole::Extended.into(), FileSystemType::Extended, 2048, 1_026_047))
            .unwrap();
        let logical = table
            .insert(part(NodeRef::Partition(ext), PartitionRole::Logical.into(), FileSystemType::Ext4, 4096, 206_847))
            .unwrap();

        let any = PartitionRoles::all();
        assert_eq!(table.find_partition_by_sector(5000, any), Some(logical));
        assert_eq!(table.find_partition_by_sector(300_000, any), Some(ext));
        assert_eq!(table.find_partition_by_sector(1_500_000, any), None);
    }

    #[test]
    fn take_and_restore_round_trip_subtrees() {
        let mut table = PartitionTable::new(TableType::MsdosSectorBased, 2048, 2_047_999);
        let ext = table
            .insert(part(NodeRef::Root, PartitionRole::Extended.into(), FileSystemType::Extended, 2048, 1_026_047))
            .unwrap();
        table
            .insert(part(NodeRef::Partition(ext), PartitionRole::Logical.into(), FileSystemType::Ext4, 4096, 206_847))
            .unwrap();
        let before = table.layout();

        let detached = table.take(ext).unwrap();
        assert_eq!(detached.descendants.len(), 1);
        assert!(table.partitions().is_empty());

        table.restore(detached).unwrap();
        assert_eq!(table.layout(), before);
    }

    #[test]
    fn deleting_a_logical_renumbers_the_following_ones() {
        let mut table = PartitionTable::new(TableType::MsdosSectorBased, 2048, 2_047_999);
        let ext = table
            .insert(part(NodeRef::Root, PartitionRole::Extended.into(), FileSystemType::Extended, 2048, 1_026_047))
            .unwrap();
        let mut ids = Vec::new();
        for (i, first) in [4096u64, 210_000, 420_000].iter().enumerate() {
            let p = part(NodeRef::Partition(ext), PartitionRole::Logical.into(), FileSystemType::Ext4, *first, first + 100_000)
                .with_number(5 + i as u32);
            ids.push(table.insert(p).unwrap());
        }

        table.remove(ids[1]).unwrap();
        table.adjust_logical_numbers(ext, Some(6), None);
        assert_eq!(table.partition(ids[0]).unwrap().number, Some(5));
        assert_eq!(table.partition(ids[2]).unwrap().number, Some(6));

        table.adjust_logical_numbers(ext, None, Some(6));
        assert_eq!(table.partition(ids[2]).unwrap().number, Some(7));
    }

    #[test]
    fn volume_groups_relinearize_logical_volumes() {
        let g = DeviceGeometry {
            device_node: "/dev/vg0".to_string(),
            device_type: DeviceType::Lvm,
            sector_size: 4 * 1024 * 1024,
            total_sectors: 1000,
            sector_alignment: 1,
            sectors_per_track: 0,
        };
        let mut table = PartitionTable::new(TableType::Vmd, 0, 999);
        let mut lv = |label: &str, first: u64, last: u64| {
            let mut p = part(NodeRef::Root, PartitionRole::LvmLv.into(), FileSystemType::Ext4, first, last);
            p.device_path = "/dev/vg0".to_string();
            p.label = label.to_string();
            table.insert(p).unwrap()
        };
        let b = lv("b", 100, 199);
        let a = lv("a", 500, 549);

        table.update_unallocated(&g);

        let a = table.partition(a).unwrap();
        let b = table.partition(b).unwrap();
        assert_eq!((a.first_sector, a.last_sector), (0, 49));
        assert_eq!((b.first_sector, b.last_sector), (50, 149));
        assert_eq!(b.file_system.first_sector, 50);
        let free = table.partition(*table.children(NodeRef::Root).last().unwrap()).unwrap();
        assert!(free.is_unallocated());
        assert_eq!((free.first_sector, free.last_sector), (150, 999));
    }
}
