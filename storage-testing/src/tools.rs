// SPDX-License-Identifier: GPL-3.0-only

//! [`FileSystemTools`] double with a configurable capability table

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use storage_contracts::{FileSystemTools, Report, StorageError};
use storage_types::{CommandSupportType, FileSystem, FileSystemType, FsCapability};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolAction {
    Create,
    Resize,
    ResizeOnline,
    Move,
    Copy,
    Check,
    Backup,
    Restore,
    Remove,
    WriteLabel,
    WriteLabelOnline,
    UpdateUuid,
    UpdateBootSector,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub action: ToolAction,
    pub path: String,
    pub fs_type: FileSystemType,
}

#[derive(Debug, Default)]
struct ToolState {
    support: HashMap<(FileSystemType, FsCapability), CommandSupportType>,
    failing: HashSet<ToolAction>,
    calls: Vec<ToolCall>,
    labels: HashMap<String, String>,
}

/// Records every tool invocation and succeeds unless told otherwise
///
/// Capabilities not overridden answer with the file system type's default
/// support table.
#[derive(Debug, Default)]
pub struct MemoryFileSystemTools {
    state: Mutex<ToolState>,
}

impl MemoryFileSystemTools {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ToolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_support(&self, fs_type: FileSystemType, capability: FsCapability, support: CommandSupportType) {
        self.lock().support.insert((fs_type, capability), support);
    }

    pub fn with_support(self, fs_type: FileSystemType, capability: FsCapability, support: CommandSupportType) -> Self {
        self.set_support(fs_type, capability, support);
        self
    }

    /// Make every later call of `action` fail
    pub fn fail(&self, action: ToolAction) {
        self.lock().failing.insert(action);
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, action: ToolAction) -> Vec<ToolCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.action == action)
            .cloned()
            .collect()
    }

    /// Label last written to `path`
    pub fn label(&self, path: &str) -> Option<String> {
        self.lock().labels.get(path).cloned()
    }

    fn record(
        &self,
        report: &mut Report,
        action: ToolAction,
        path: &str,
        fs: &FileSystem,
    ) -> Result<(), StorageError> {
        let mut state = self.lock();
        state.calls.push(ToolCall {
            action,
            path: path.to_string(),
            fs_type: fs.fs_type,
        });
        report.line(format!("{action:?} {} on {path}", fs.name()));
        if state.failing.contains(&action) {
            return Err(StorageError::io(format!(
                "{action:?} failed for {} on {path}",
                fs.name()
            )));
        }
        Ok(())
    }
}

impl FileSystemTools for MemoryFileSystemTools {
    fn support(&self, fs_type: FileSystemType, capability: FsCapability) -> CommandSupportType {
        self.lock()
            .support
            .get(&(fs_type, capability))
            .copied()
            .unwrap_or_else(|| fs_type.default_support(capability))
    }

    fn create(&self, report: &mut Report, path: &str, fs: &FileSystem) -> Result<(), StorageError> {
        self.record(report, ToolAction::Create, path, fs)
    }

    fn resize(&self, report: &mut Report, path: &str, fs: &FileSystem, _new_length: u64) -> Result<(), StorageError> {
        self.record(report, ToolAction::Resize, path, fs)
    }

    fn resize_online(
        &self,
        report: &mut Report,
        path: &str,
        _mount_point: &str,
        fs: &FileSystem,
        _new_length: u64,
    ) -> Result<(), StorageError> {
        self.record(report, ToolAction::ResizeOnline, path, fs)
    }

    fn move_fs(&self, report: &mut Report, path: &str, fs: &FileSystem, _new_first_sector: u64) -> Result<(), StorageError> {
        self.record(report, ToolAction::Move, path, fs)
    }

    fn copy(
        &self,
        report: &mut Report,
        target_path: &str,
        _target: &FileSystem,
        _source_path: &str,
        source: &FileSystem,
    ) -> Result<(), StorageError> {
        self.record(report, ToolAction::Copy, target_path, source)
    }

    fn check(&self, report: &mut Report, path: &str, fs: &FileSystem) -> Result<(), StorageError> {
        self.record(report, ToolAction::Check, path, fs)
    }

    fn backup(&self, report: &mut Report, path: &str, fs: &FileSystem, file: &Path) -> Result<(), StorageError> {
        self.record(report, ToolAction::Backup, path, fs)?;
        fs::write(file, path.as_bytes())?;
        Ok(())
    }

    fn restore(&self, report: &mut Report, path: &str, fs: &FileSystem, _file: &Path) -> Result<(), StorageError> {
        self.record(report, ToolAction::Restore, path, fs)
    }

    fn remove(&self, report: &mut Report, path: &str, fs: &FileSystem) -> Result<(), StorageError> {
        self.record(report, ToolAction::Remove, path, fs)
    }

    fn write_label(&self, report: &mut Report, path: &str, fs: &FileSystem, label: &str) -> Result<(), StorageError> {
        self.record(report, ToolAction::WriteLabel, path, fs)?;
        self.lock().labels.insert(path.to_string(), label.to_string());
        Ok(())
    }

    fn write_label_online(
        &self,
        report: &mut Report,
        path: &str,
        _mount_point: &str,
        fs: &FileSystem,
        label: &str,
    ) -> Result<(), StorageError> {
        self.record(report, ToolAction::WriteLabelOnline, path, fs)?;
        self.lock().labels.insert(path.to_string(), label.to_string());
        Ok(())
    }

    fn read_label(&self, path: &str, fs: &FileSystem) -> Result<String, StorageError> {
        Ok(self.label(path).unwrap_or_else(|| fs.label.clone()))
    }

    fn read_uuid(&self, _path: &str, fs: &FileSystem) -> Result<String, StorageError> {
        Ok(fs.uuid.clone())
    }

    fn update_uuid(&self, report: &mut Report, path: &str, fs: &FileSystem) -> Result<String, StorageError> {
        self.record(report, ToolAction::UpdateUuid, path, fs)?;
        Ok(uuid::Uuid::new_v4().to_string())
    }

    fn update_boot_sector(&self, report: &mut Report, path: &str, fs: &FileSystem) -> Result<(), StorageError> {
        self.record(report, ToolAction::UpdateBootSector, path, fs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_over_the_default_table() {
        let tools = MemoryFileSystemTools::new().with_support(
            FileSystemType::Ext4,
            FsCapability::Copy,
            CommandSupportType::FileSystem,
        );
        assert_eq!(
            tools.support(FileSystemType::Ext4, FsCapability::Copy),
            CommandSupportType::FileSystem
        );
        assert_eq!(
            tools.support(FileSystemType::Ext4, FsCapability::Move),
            FileSystemType::Ext4.default_support(FsCapability::Move)
        );
    }

    #[test]
    fn failing_actions_are_still_recorded() {
        let tools = MemoryFileSystemTools::new();
        tools.fail(ToolAction::Check);
        let fs = FileSystem::new(FileSystemType::Xfs, 2048, 4095, 512);
        let mut report = Report::new("check");

        assert!(tools.check(&mut report, "/dev/sda1", &fs).is_err());
        assert!(tools.create(&mut report, "/dev/sda1", &fs).is_ok());
        assert_eq!(tools.calls_of(ToolAction::Check).len(), 1);
        assert!(report.contains_line("Check xfs on /dev/sda1"));
    }
}
