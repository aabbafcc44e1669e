// SPDX-License-Identifier: GPL-3.0-only

//! Sector alignment of partition boundaries
//!
//! The granularity comes from [`Device::sector_alignment`]. A partition is aligned
//! when its first sector and its end (last sector + 1) are multiples of it. Cylinder
//! based msdos tables are the exception: logical partitions there start one track
//! after an alignment boundary to leave room for their extended boot record.

use crate::capacity::sector_count;
use crate::device::{Device, DeviceType};
use crate::partition::Partition;
use crate::table::TableType;

/// Optional limits for the aligned-sector searches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignmentBounds {
    pub min_first: Option<u64>,
    pub max_first: Option<u64>,
    pub min_last: Option<u64>,
    pub max_last: Option<u64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
}

fn granularity(device: &Device) -> u64 {
    device.sector_alignment.max(1)
}

fn cylinder_based(device: &Device) -> bool {
    device.device_type() == DeviceType::Disk
        && device
            .partition_table()
            .is_some_and(|t| t.table_type() == TableType::Msdos)
        && device.sectors_per_track() > 0
}

fn usable_range(device: &Device) -> (u64, u64) {
    match device.partition_table() {
        Some(table) => (table.first_usable(), table.last_usable()),
        None => (0, device.total_logical_sectors.saturating_sub(1)),
    }
}

/// Distance of `sector` past the previous aligned start position for `partition`
pub fn first_delta(device: &Device, partition: &Partition, sector: u64) -> u64 {
    let align = granularity(device) as i128;
    if cylinder_based(device) {
        let track = device.sectors_per_track() as i128;
        let s = sector as i128;
        if partition.is_logical() && s == 2 * track {
            return 0;
        }
        if partition.is_logical() || s == track {
            return (s - track).rem_euclid(align) as u64;
        }
    }
    sector % granularity(device)
}

/// Distance of `sector + 1` past the previous alignment boundary
pub fn last_delta(device: &Device, _partition: &Partition, sector: u64) -> u64 {
    (sector + 1) % granularity(device)
}

pub fn is_length_aligned(device: &Device, partition: &Partition) -> bool {
    let length = partition.length();
    if cylinder_based(device) && partition.is_logical() {
        return (length + device.sectors_per_track()) % granularity(device) == 0;
    }
    length % granularity(device) == 0
}

/// Both ends of `partition` sit on alignment boundaries
///
/// Misalignment is logged, never treated as an error.
pub fn is_aligned(device: &Device, partition: &Partition, quiet: bool) -> bool {
    is_range_aligned(
        device,
        partition,
        partition.first_sector,
        partition.last_sector,
        quiet,
    )
}

pub fn is_range_aligned(
    device: &Device,
    partition: &Partition,
    first: u64,
    last: u64,
    quiet: bool,
) -> bool {
    let first_ok = first_delta(device, partition, first) == 0;
    let last_ok = last_delta(device, partition, last) == 0;
    if !quiet {
        if !first_ok {
            tracing::warn!(
                partition = %partition.partition_path(),
                first,
                "partition start is not aligned"
            );
        }
        if !last_ok {
            tracing::warn!(
                partition = %partition.partition_path(),
                last,
                "partition end is not aligned"
            );
        }
    }
    first_ok && last_ok
}

/// Nearest aligned first sector at or before `sector` that satisfies `bounds`
///
/// Rounds down first so the partition grows rather than shrinks, then steps by
/// whole alignment units until the bounds hold. The result never leaves the
/// table's usable range.
pub fn aligned_first_sector(
    device: &Device,
    partition: &Partition,
    sector: u64,
    bounds: &AlignmentBounds,
) -> u64 {
    let (first_usable, last_usable) = usable_range(device);
    let delta = first_delta(device, partition, sector);
    if delta == 0 && (first_usable..=last_usable).contains(&sector) {
        return sector;
    }

    let align = granularity(device);
    let last = partition.last_sector;
    let mut s = sector - delta.min(sector);

    while s < first_usable
        || bounds.min_first.is_some_and(|m| s < m)
        || bounds.max_length.is_some_and(|m| sector_count(s, last) > m)
    {
        s += align;
    }

    while s > last_usable
        || bounds.max_first.is_some_and(|m| s > m)
        || bounds.min_length.is_some_and(|m| sector_count(s, last) < m)
    {
        if s < align {
            break;
        }
        s -= align;
    }

    s.clamp(first_usable, last_usable.max(first_usable))
}

/// Nearest aligned last sector at or after `sector` that satisfies `bounds`
///
/// Rounds up so the partition grows rather than shrinks. When the original
/// partition was aligned and rounding up would make it exactly one alignment unit
/// longer than `original_length`, the original length is kept instead.
pub fn aligned_last_sector(
    device: &Device,
    partition: &Partition,
    sector: u64,
    bounds: &AlignmentBounds,
    original_length: Option<u64>,
    original_aligned: bool,
) -> u64 {
    let (first_usable, last_usable) = usable_range(device);
    let delta = last_delta(device, partition, sector);
    if delta == 0 && (first_usable..=last_usable).contains(&sector) {
        return sector;
    }

    let align = granularity(device);
    let first = partition.first_sector;
    let mut s = if delta == 0 { sector } else { sector + align - delta };

    if original_aligned
        && original_length.is_some_and(|len| sector_count(first, s) == len + align)
    {
        s -= align;
    }

    while s < first_usable
        || bounds.min_last.is_some_and(|m| s < m)
        || bounds.min_length.is_some_and(|m| sector_count(first, s) < m)
    {
        s += align;
    }

    while s > last_usable
        || bounds.max_last.is_some_and(|m| s > m)
        || bounds.max_length.is_some_and(|m| sector_count(first, s) > m)
    {
        if s < align {
            break;
        }
        s -= align;
    }

    s.clamp(first_usable, last_usable.max(first_usable))
}
