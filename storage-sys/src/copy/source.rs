// SPDX-License-Identifier: GPL-3.0-only

use std::fs::File;
use std::path::{Path, PathBuf};

use storage_contracts::{BackendDevice, CoreBackend};
use storage_types::{ByteRange, Device};

use super::CopyTarget;
use crate::error::{Result, SysError};
use crate::image;

/// Where a block copy reads from
///
/// Offsets passed to [`read_data`](CopySource::read_data) are relative to
/// [`first_byte`](CopySource::first_byte).
pub trait CopySource {
    fn open(&mut self) -> Result<()>;

    fn read_data(&mut self, buffer: &mut [u8], offset: u64) -> Result<()>;

    /// Bytes to copy
    fn length(&self) -> u64;

    fn first_byte(&self) -> u64;

    fn last_byte(&self) -> u64;

    /// The device when reading from one
    fn device(&self) -> Option<&Device> {
        None
    }

    fn device_node(&self) -> Option<&str> {
        self.device().map(|d| d.device_node.as_str())
    }

    /// Could writing to `target` destroy data not yet read from here
    fn overlaps(&self, target: &dyn CopyTarget) -> bool {
        let (Some(node), Some(target_node)) = (self.device_node(), target.device_node()) else {
            return false;
        };
        node == target_node
            && ByteRange::inclusive(self.first_byte(), self.last_byte())
                .overlaps(&ByteRange::inclusive(target.first_byte(), target.last_byte()))
    }

    fn describe(&self) -> String;
}

pub(crate) fn check_range(
    what: impl FnOnce() -> String,
    offset: u64,
    length: usize,
    size: u64,
) -> Result<()> {
    let length = length as u64;
    if offset.checked_add(length).is_none_or(|end| end > size) {
        return Err(SysError::OutOfRange {
            what: what(),
            offset,
            length,
            size,
        });
    }
    Ok(())
}

/// A byte range on a device, read through the backend
pub struct CopySourceDevice<'a> {
    backend: &'a dyn CoreBackend,
    device: Device,
    range: ByteRange,
    handle: Option<Box<dyn BackendDevice>>,
}

impl<'a> CopySourceDevice<'a> {
    /// `first_byte..=last_byte` on `device`
    pub fn new(backend: &'a dyn CoreBackend, device: &Device, first_byte: u64, last_byte: u64) -> Self {
        Self {
            backend,
            device: device.clone(),
            range: ByteRange::inclusive(first_byte, last_byte),
            handle: None,
        }
    }
}

impl CopySource for CopySourceDevice<'_> {
    fn open(&mut self) -> Result<()> {
        self.handle = Some(self.backend.open_device(&self.device)?);
        Ok(())
    }

    fn read_data(&mut self, buffer: &mut [u8], offset: u64) -> Result<()> {
        check_range(|| self.describe(), offset, buffer.len(), self.range.size())?;
        let start = self.range.start;
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| SysError::NotOpen(self.device.device_node.clone()))?;
        handle.read_data(buffer, start + offset)?;
        Ok(())
    }

    fn length(&self) -> u64 {
        self.range.size()
    }

    fn first_byte(&self) -> u64 {
        self.range.start
    }

    fn last_byte(&self) -> u64 {
        self.range.end.saturating_sub(1)
    }

    fn device(&self) -> Option<&Device> {
        Some(&self.device)
    }

    fn describe(&self) -> String {
        format!(
            "{} (bytes {}-{})",
            self.device.device_node,
            self.first_byte(),
            self.last_byte()
        )
    }
}

/// An image file read from the start
pub struct CopySourceFile {
    path: PathBuf,
    length: u64,
    file: Option<File>,
}

impl CopySourceFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            length: 0,
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CopySource for CopySourceFile {
    fn open(&mut self) -> Result<()> {
        let file = image::open_image(&self.path)?;
        self.length = image::image_size(&file)?;
        self.file = Some(file);
        Ok(())
    }

    fn read_data(&mut self, buffer: &mut [u8], offset: u64) -> Result<()> {
        check_range(|| self.describe(), offset, buffer.len(), self.length)?;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| SysError::NotOpen(self.path.display().to_string()))?;
        image::read_at(file, buffer, offset)
    }

    /// Only known once opened
    fn length(&self) -> u64 {
        self.length
    }

    fn first_byte(&self) -> u64 {
        0
    }

    fn last_byte(&self) -> u64 {
        self.length.saturating_sub(1)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShredPattern {
    Zeros,
    Random,
}

/// Synthetic stream used to overwrite a partition
pub struct CopySourceShred {
    length: u64,
    pattern: ShredPattern,
}

impl CopySourceShred {
    pub fn new(length: u64, pattern: ShredPattern) -> Self {
        Self { length, pattern }
    }
}

impl CopySource for CopySourceShred {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_data(&mut self, buffer: &mut [u8], offset: u64) -> Result<()> {
        check_range(|| self.describe(), offset, buffer.len(), self.length)?;
        match self.pattern {
            ShredPattern::Zeros => buffer.fill(0),
            ShredPattern::Random => {
                for chunk in buffer.chunks_mut(16) {
                    let bytes = uuid::Uuid::new_v4().into_bytes();
                    chunk.copy_from_slice(&bytes[..chunk.len()]);
                }
            }
        }
        Ok(())
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn first_byte(&self) -> u64 {
        0
    }

    fn last_byte(&self) -> u64 {
        self.length.saturating_sub(1)
    }

    fn describe(&self) -> String {
        match self.pattern {
            ShredPattern::Zeros => "zeros".to_string(),
            ShredPattern::Random => "random data".to_string(),
        }
    }
}
