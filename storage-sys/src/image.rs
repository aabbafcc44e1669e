// SPDX-License-Identifier: GPL-3.0-only

//! Image files used as backup targets and restore sources

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Result, SysError};

fn map_open_error(e: io::Error, path: &Path, verb: &str) -> SysError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        SysError::PermissionDenied(format!("Cannot open {} for {}", path.display(), verb))
    } else if e.kind() == io::ErrorKind::NotFound {
        SysError::DeviceNotFound(path.display().to_string())
    } else {
        SysError::Io(e)
    }
}

/// Open an existing image for reading (restore)
pub fn open_image(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|e| map_open_error(e, path, "reading"))
}

/// Create or truncate an image for writing (backup)
pub fn create_image(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| map_open_error(e, path, "writing"))
}

pub fn image_size(file: &File) -> Result<u64> {
    Ok(file.metadata()?.len())
}

/// Fill `buffer` from `offset`; short files are an error
pub fn read_at(file: &mut File, buffer: &mut [u8], offset: u64) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buffer)?;
    Ok(())
}

pub fn write_at(file: &mut File, buffer: &[u8], offset: u64) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(buffer)?;
    Ok(())
}
