// SPDX-License-Identifier: GPL-3.0-only

use std::fs::File;
use std::path::{Path, PathBuf};

use storage_contracts::{BackendDevice, CoreBackend};
use storage_types::{ByteRange, Device};

use super::source::check_range;
use crate::error::{Result, SysError};
use crate::image;

/// Where a block copy writes to
///
/// Offsets passed to [`write_data`](CopyTarget::write_data) are relative to
/// [`first_byte`](CopyTarget::first_byte).
pub trait CopyTarget {
    fn open(&mut self) -> Result<()>;

    fn write_data(&mut self, buffer: &[u8], offset: u64) -> Result<()>;

    fn first_byte(&self) -> u64;

    fn last_byte(&self) -> u64;

    /// Bytes that fit, `None` when the target grows as needed
    fn capacity(&self) -> Option<u64>;

    /// Bytes successfully written since the target was created
    fn bytes_written(&self) -> u64;

    /// The device when writing to one
    fn device(&self) -> Option<&Device> {
        None
    }

    fn device_node(&self) -> Option<&str> {
        self.device().map(|d| d.device_node.as_str())
    }

    fn describe(&self) -> String;
}

pub struct CopyTargetDevice<'a> {
    backend: &'a dyn CoreBackend,
    device: Device,
    range: ByteRange,
    handle: Option<Box<dyn BackendDevice>>,
    bytes_written: u64,
}

impl<'a> CopyTargetDevice<'a> {
    /// `first_byte..=last_byte` on `device`
    pub fn new(backend: &'a dyn CoreBackend, device: &Device, first_byte: u64, last_byte: u64) -> Self {
        Self {
            backend,
            device: device.clone(),
            range: ByteRange::inclusive(first_byte, last_byte),
            handle: None,
            bytes_written: 0,
        }
    }
}

impl CopyTarget for CopyTargetDevice<'_> {
    fn open(&mut self) -> Result<()> {
        self.handle = Some(self.backend.open_device_exclusive(&self.device)?);
        Ok(())
    }

    fn write_data(&mut self, buffer: &[u8], offset: u64) -> Result<()> {
        check_range(|| self.describe(), offset, buffer.len(), self.range.size())?;
        let start = self.range.start;
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| SysError::NotOpen(self.device.device_node.clone()))?;
        handle.write_data(buffer, start + offset)?;
        self.bytes_written += buffer.len() as u64;
        Ok(())
    }

    fn first_byte(&self) -> u64 {
        self.range.start
    }

    fn last_byte(&self) -> u64 {
        self.range.end.saturating_sub(1)
    }

    fn capacity(&self) -> Option<u64> {
        Some(self.range.size())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
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

/// An image file, created or truncated on open
pub struct CopyTargetFile {
    path: PathBuf,
    file: Option<File>,
    bytes_written: u64,
    high_water: u64,
}

impl CopyTargetFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            bytes_written: 0,
            high_water: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sync(&mut self) -> Result<()> {
        if let Some(file) = &self.file {
            file.sync_all()?;
        }
        Ok(())
    }
}

impl CopyTarget for CopyTargetFile {
    fn open(&mut self) -> Result<()> {
        self.file = Some(image::create_image(&self.path)?);
        Ok(())
    }

    fn write_data(&mut self, buffer: &[u8], offset: u64) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| SysError::NotOpen(self.path.display().to_string()))?;
        image::write_at(file, buffer, offset)?;
        self.bytes_written += buffer.len() as u64;
        self.high_water = self.high_water.max(offset + buffer.len() as u64);
        Ok(())
    }

    fn first_byte(&self) -> u64 {
        0
    }

    fn last_byte(&self) -> u64 {
        self.high_water.saturating_sub(1)
    }

    fn capacity(&self) -> Option<u64> {
        None
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
