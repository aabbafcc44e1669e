// SPDX-License-Identifier: GPL-3.0-only

//! Wrappers around external file system tools (mkfs, resize2fs, ntfsresize, ...)
//!
//! Every method defaults to reporting the capability as unsupported, so a tool
//! set only implements what it can actually do. `path` is always the partition's
//! device node.

use std::path::Path;

use storage_types::{CommandSupportType, FileSystem, FileSystemType, FsCapability};

use crate::{Report, StorageError};

fn unsupported(fs: &FileSystem, what: &str) -> StorageError {
    StorageError::unsupported(format!("{what} is not supported for {}", fs.name()))
}

pub trait FileSystemTools: Send + Sync {
    fn support(&self, fs_type: FileSystemType, capability: FsCapability) -> CommandSupportType {
        fs_type.default_support(capability)
    }

    fn create(&self, report: &mut Report, path: &str, fs: &FileSystem) -> Result<(), StorageError> {
        let _ = (report, path);
        Err(unsupported(fs, "creating"))
    }

    fn resize(
        &self,
        report: &mut Report,
        path: &str,
        fs: &FileSystem,
        new_length: u64,
    ) -> Result<(), StorageError> {
        let _ = (report, path, new_length);
        Err(unsupported(fs, "resizing"))
    }

    fn resize_online(
        &self,
        report: &mut Report,
        path: &str,
        mount_point: &str,
        fs: &FileSystem,
        new_length: u64,
    ) -> Result<(), StorageError> {
        let _ = (report, path, mount_point, new_length);
        Err(unsupported(fs, "online resizing"))
    }

    fn move_fs(
        &self,
        report: &mut Report,
        path: &str,
        fs: &FileSystem,
        new_first_sector: u64,
    ) -> Result<(), StorageError> {
        let _ = (report, path, new_first_sector);
        Err(unsupported(fs, "moving"))
    }

    fn copy(
        &self,
        report: &mut Report,
        target_path: &str,
        target: &FileSystem,
        source_path: &str,
        source: &FileSystem,
    ) -> Result<(), StorageError> {
        let _ = (report, target_path, target, source_path);
        Err(unsupported(source, "copying"))
    }

    fn check(&self, report: &mut Report, path: &str, fs: &FileSystem) -> Result<(), StorageError> {
        let _ = (report, path);
        Err(unsupported(fs, "checking"))
    }

    fn backup(
        &self,
        report: &mut Report,
        path: &str,
        fs: &FileSystem,
        file: &Path,
    ) -> Result<(), StorageError> {
        let _ = (report, path, file);
        Err(unsupported(fs, "backing up"))
    }

    fn restore(
        &self,
        report: &mut Report,
        path: &str,
        fs: &FileSystem,
        file: &Path,
    ) -> Result<(), StorageError> {
        let _ = (report, path, file);
        Err(unsupported(fs, "restoring"))
    }

    /// Remove the file system's signature
    fn remove(&self, report: &mut Report, path: &str, fs: &FileSystem) -> Result<(), StorageError> {
        let _ = (report, path, fs);
        Ok(())
    }

    fn write_label(
        &self,
        report: &mut Report,
        path: &str,
        fs: &FileSystem,
        label: &str,
    ) -> Result<(), StorageError> {
        let _ = (report, path, label);
        Err(unsupported(fs, "writing the label"))
    }

    fn write_label_online(
        &self,
        report: &mut Report,
        path: &str,
        mount_point: &str,
        fs: &FileSystem,
        label: &str,
    ) -> Result<(), StorageError> {
        let _ = (report, path, mount_point, label);
        Err(unsupported(fs, "writing the label while mounted"))
    }

    fn read_label(&self, path: &str, fs: &FileSystem) -> Result<String, StorageError> {
        let _ = path;
        Err(unsupported(fs, "reading the label"))
    }

    fn read_uuid(&self, path: &str, fs: &FileSystem) -> Result<String, StorageError> {
        let _ = path;
        Err(unsupported(fs, "reading the UUID"))
    }

    /// Give the file system a new UUID and return it
    fn update_uuid(
        &self,
        report: &mut Report,
        path: &str,
        fs: &FileSystem,
    ) -> Result<String, StorageError> {
        let _ = (report, path);
        Err(unsupported(fs, "changing the UUID"))
    }

    /// Fix up boot sector fields that encode the file system's position
    fn update_boot_sector(
        &self,
        report: &mut Report,
        path: &str,
        fs: &FileSystem,
    ) -> Result<(), StorageError> {
        let _ = (report, path, fs);
        Ok(())
    }
}
