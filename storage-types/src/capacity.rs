// SPDX-License-Identifier: GPL-3.0-only

//! Sector/byte conversion and human-readable sizes

use std::fmt;

use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};

/// One kibibyte in bytes
pub const KIB: u64 = 1024;

/// One mebibyte in bytes
pub const MIB: u64 = 1024 * KIB;

/// One gibibyte in bytes
pub const GIB: u64 = 1024 * MIB;

/// Binary size units used when presenting capacities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Byte,
    KiB,
    MiB,
    GiB,
    TiB,
    PiB,
    EiB,
}

impl Unit {
    fn exponent(self) -> i32 {
        match self {
            Self::Byte => 0,
            Self::KiB => 1,
            Self::MiB => 2,
            Self::GiB => 3,
            Self::TiB => 4,
            Self::PiB => 5,
            Self::EiB => 6,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Byte => "B",
            Self::KiB => "KiB",
            Self::MiB => "MiB",
            Self::GiB => "GiB",
            Self::TiB => "TiB",
            Self::PiB => "PiB",
            Self::EiB => "EiB",
        }
    }

    const ALL: [Unit; 7] = [
        Unit::Byte,
        Unit::KiB,
        Unit::MiB,
        Unit::GiB,
        Unit::TiB,
        Unit::PiB,
        Unit::EiB,
    ];
}

/// A size in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capacity(u64);

impl Capacity {
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn from_sectors(sectors: u64, sector_size: u64) -> Self {
        Self(sectors.saturating_mul(sector_size))
    }

    pub const fn bytes(self) -> u64 {
        self.0
    }

    /// Value expressed in `unit`, as shown to users
    pub fn to_unit(self, unit: Unit) -> f64 {
        self.0 as f64 / 1024_f64.powi(unit.exponent())
    }

    /// Number of whole sectors needed to hold this capacity
    pub fn sectors(self, sector_size: u64) -> u64 {
        bytes_to_sectors(self.0, sector_size)
    }

    /// Largest unit in which the value is still at least one
    pub fn best_unit(self) -> Unit {
        let mut unit = Unit::Byte;
        for candidate in Unit::ALL {
            if self.to_unit(candidate) >= 1.0 {
                unit = candidate;
            }
        }
        unit
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.best_unit();
        if unit == Unit::Byte {
            write!(f, "{} {}", self.0, unit.suffix())
        } else {
            write!(f, "{:.2} {}", self.to_unit(unit), unit.suffix())
        }
    }
}

pub fn sectors_to_bytes(sectors: u64, sector_size: u64) -> u64 {
    sectors.saturating_mul(sector_size)
}

/// Round up: a trailing partial sector still occupies a sector
pub fn bytes_to_sectors(bytes: u64, sector_size: u64) -> u64 {
    if sector_size == 0 {
        return 0;
    }
    bytes.div_ceil(sector_size)
}

/// Number of sectors in the inclusive range `[first, last]`
pub fn sector_count(first: u64, last: u64) -> u64 {
    if last < first { 0 } else { last - first + 1 }
}

/// A byte range representing a contiguous region on a device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    /// Start byte (inclusive)
    pub start: u64,

    /// End byte (exclusive)
    pub end: u64,
}

impl ByteRange {
    /// Build from an inclusive first/last byte pair
    pub fn inclusive(first: u64, last: u64) -> Self {
        Self {
            start: first,
            end: last.saturating_add(1),
        }
    }

    /// Get the size of this range in bytes
    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, byte: u64) -> bool {
        byte >= self.start && byte < self.end
    }

    /// True if either endpoint of one range lies inside the other
    pub fn overlaps(&self, other: &ByteRange) -> bool {
        if self.size() == 0 || other.size() == 0 {
            return false;
        }
        self.contains(other.start)
            || self.contains(other.end - 1)
            || other.contains(self.start)
            || other.contains(self.end - 1)
    }
}

/// Convert bytes to human-readable format (e.g., "1.50 GiB")
pub fn bytes_to_pretty(bytes: u64, add_bytes: bool) -> String {
    let capacity = Capacity::from_bytes(bytes);
    if add_bytes {
        let bytes_str = bytes.to_formatted_string(&Locale::en);
        format!("{} ({} bytes)", capacity, bytes_str)
    } else {
        capacity.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_conversions_round_up() {
        assert_eq!(bytes_to_sectors(512, 512), 1);
        assert_eq!(bytes_to_sectors(513, 512), 2);
        assert_eq!(bytes_to_sectors(0, 512), 0);
        assert_eq!(sectors_to_bytes(2048, 512), MIB);
        assert_eq!(Capacity::from_sectors(204_800, 512).to_unit(Unit::MiB), 100.0);
    }

    #[test]
    fn sector_count_handles_empty_ranges() {
        assert_eq!(sector_count(10, 9), 0);
        assert_eq!(sector_count(10, 10), 1);
        assert_eq!(sector_count(2048, 4095), 2048);
    }

    #[test]
    fn pretty_printing_picks_largest_unit() {
        assert_eq!(bytes_to_pretty(512, false), "512 B");
        assert_eq!(bytes_to_pretty(100 * MIB, false), "100.00 MiB");
        assert_eq!(bytes_to_pretty(1536, true), "1.50 KiB (1,536 bytes)");
    }

    #[test]
    fn byte_ranges_overlap_on_any_shared_byte() {
        let a = ByteRange::inclusive(0, 99);
        let b = ByteRange::inclusive(99, 200);
        let c = ByteRange::inclusive(100, 200);
        let inner = ByteRange::inclusive(10, 20);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.overlaps(&inner));
        assert!(inner.overlaps(&a));
    }
}
