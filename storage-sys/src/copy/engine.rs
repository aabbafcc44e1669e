// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{CoreBackend, Report};

use super::{CopySource, CopySourceDevice, CopyTarget, CopyTargetDevice};
use crate::error::{Result, SysError};
use crate::progress::compute_progress_percent;

/// Block size used when no configuration says otherwise
pub const DEFAULT_BLOCK_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyProgress {
    pub bytes_copied: u64,
    pub total_bytes: u64,
}

impl CopyProgress {
    pub fn percent(&self) -> u8 {
        compute_progress_percent(self.bytes_copied, self.total_bytes).round() as u8
    }
}

fn same_device(source: &dyn CopySource, target: &dyn CopyTarget) -> bool {
    matches!((source.device_node(), target.device_node()), (Some(a), Some(b)) if a == b)
}

fn copy_one(
    source: &mut dyn CopySource,
    target: &mut dyn CopyTarget,
    buffer: &mut [u8],
    offset: u64,
) -> Result<()> {
    source.read_data(buffer, offset)?;
    target.write_data(buffer, offset)
}

/// Copy `source.length()` bytes from `source` to `target`, both already opened
///
/// When the target starts further into the same device than the source, blocks
/// are copied from the end backwards so no block is overwritten before it was
/// read. A trailing partial block is copied last in either direction.
pub fn copy_blocks(
    report: &mut Report,
    source: &mut dyn CopySource,
    target: &mut dyn CopyTarget,
    block_size: u64,
    progress: &mut dyn FnMut(CopyProgress),
) -> Result<()> {
    let total = source.length();
    if let Some(capacity) = target.capacity()
        && capacity < total
    {
        return Err(SysError::TargetTooSmall {
            target: target.describe(),
            capacity,
            needed: total,
        });
    }

    let block = block_size.clamp(1, total.max(1));
    let backward = same_device(source, target) && target.first_byte() > source.first_byte();
    let full_blocks = total / block;
    let remainder = total % block;

    report.line(format!(
        "Copying {full_blocks} blocks ({total} bytes) from {} to {}, direction: {}.",
        source.describe(),
        target.describe(),
        if backward { "backward" } else { "forward" }
    ));
    tracing::info!(total, block, backward, "block copy started");

    let mut buffer = vec![0u8; block as usize];
    let mut copied = 0u64;

    for i in 0..full_blocks {
        let offset = if backward { total - (i + 1) * block } else { i * block };
        if let Err(e) = copy_one(source, target, &mut buffer, offset) {
            report.line(format!("Copying block at offset {offset} failed: {e}"));
            return Err(e);
        }
        copied += block;
        progress(CopyProgress {
            bytes_copied: copied,
            total_bytes: total,
        });
    }

    if remainder > 0 {
        let offset = if backward { 0 } else { full_blocks * block };
        if let Err(e) = copy_one(source, target, &mut buffer[..remainder as usize], offset) {
            report.line(format!("Copying the last {remainder} bytes failed: {e}"));
            return Err(e);
        }
        copied += remainder;
        progress(CopyProgress {
            bytes_copied: copied,
            total_bytes: total,
        });
    }

    report.line(format!("Copying {copied} bytes finished."));
    Ok(())
}

/// Undo a partially completed copy between overlapping regions
///
/// The bytes already written to the target are copied back onto the part of the
/// source they came from, which restores whatever the partial copy overwrote.
/// Nothing is done when the regions never overlapped or nothing was written.
pub fn rollback_copy_blocks(
    report: &mut Report,
    backend: &dyn CoreBackend,
    source: &dyn CopySource,
    target: &dyn CopyTarget,
    block_size: u64,
) -> Result<()> {
    if !source.overlaps(target) {
        report.line("Source and target for copying do not overlap: rollback is not required.");
        return Ok(());
    }
    let written = target.bytes_written();
    if written == 0 {
        report.line("Nothing was written: rollback is not required.");
        return Ok(());
    }
    let Some(device) = source.device() else {
        return Ok(());
    };

    let (undo_source_first, undo_target_first) = if target.first_byte() > source.first_byte() {
        (
            target.first_byte() + source.length() - written,
            source.last_byte() + 1 - written,
        )
    } else {
        (target.first_byte(), source.first_byte())
    };
    let undo_source_last = undo_source_first + written - 1;
    let undo_target_last = undo_target_first + written - 1;

    report.line(format!(
        "Rollback from: first byte {undo_source_first}, last byte {undo_source_last}."
    ));
    report.line(format!(
        "Rollback to: first byte {undo_target_first}, last byte {undo_target_last}."
    ));
    tracing::warn!(
        device = %device.device_node,
        written,
        "rolling back partial block copy"
    );

    let mut undo_source = CopySourceDevice::new(backend, device, undo_source_first, undo_source_last);
    if let Err(e) = undo_source.open() {
        report.line(format!("Could not open device {} to rollback copying: {e}", device.device_node));
        return Err(e);
    }
    let mut undo_target = CopyTargetDevice::new(backend, device, undo_target_first, undo_target_last);
    if let Err(e) = undo_target.open() {
        report.line(format!("Could not open device {} to rollback copying: {e}", device.device_node));
        return Err(e);
    }

    copy_blocks(report, &mut undo_source, &mut undo_target, block_size, &mut |_| {})
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use storage_contracts::{BackendDevice, BackendPartitionTable, StorageError};
    use storage_types::{Device, TableType};

    use super::*;
    use crate::copy::{CopySourceFile, CopySourceShred, CopyTargetFile, ShredPattern};

    /// One RAM disk; writes start failing once `fail_after` bytes went through
    #[derive(Clone)]
    struct RamBackend {
        data: Arc<Mutex<Vec<u8>>>,
        writes: Arc<AtomicU64>,
        fail_after: Option<u64>,
    }

    struct RamDevice {
        node: String,
        backend: RamBackend,
    }

    impl RamBackend {
        fn new(size: usize) -> Self {
            let data = (0..size).map(|i| (i % 251) as u8).collect();
            Self {
                data: Arc::new(Mutex::new(data)),
                writes: Arc::new(AtomicU64::new(0)),
                fail_after: None,
            }
        }

        fn snapshot(&self) -> Vec<u8> {
            self.data.lock().unwrap().clone()
        }
    }

    impl CoreBackend for RamBackend {
        fn open_device(&self, device: &Device) -> std::result::Result<Box<dyn BackendDevice>, StorageError> {
            Ok(Box::new(RamDevice {
                node: device.device_node.clone(),
                backend: self.clone(),
            }))
        }

        fn open_device_exclusive(
            &self,
            device: &Device,
        ) -> std::result::Result<Box<dyn BackendDevice>, StorageError> {
            self.open_device(device)
        }
    }

    impl BackendDevice for RamDevice {
        fn device_node(&self) -> &str {
            &self.node
        }

        fn open_partition_table(
            &mut self,
        ) -> std::result::Result<Box<dyn BackendPartitionTable + '_>, StorageError> {
            Err(StorageError::unsupported("no table"))
        }

        fn create_partition_table(
            &mut self,
            _report: &mut Report,
            _table_type: TableType,
        ) -> std::result::Result<(), StorageError> {
            Err(StorageError::unsupported("no table"))
        }

        fn read_data(&mut self, buffer: &mut [u8], offset: u64) -> std::result::Result<(), StorageError> {
            let data = self.backend.data.lock().unwrap();
            let start = offset as usize;
            buffer.copy_from_slice(&data[start..start + buffer.len()]);
            Ok(())
        }

        fn write_data(&mut self, buffer: &[u8], offset: u64) -> std::result::Result<(), StorageError> {
            let done = self.backend.writes.load(Ordering::SeqCst);
            if self.backend.fail_after.is_some_and(|limit| done + buffer.len() as u64 > limit) {
                return Err(StorageError::io("simulated write failure"));
            }
            let mut data = self.backend.data.lock().unwrap();
            let start = offset as usize;
            data[start..start + buffer.len()].copy_from_slice(buffer);
            self.backend.writes.fetch_add(buffer.len() as u64, Ordering::SeqCst);
            Ok(())
        }
    }

    fn disk() -> Device {
        Device::disk("ram", "/dev/ram0", 512, 64)
    }

    fn copy(backend: &RamBackend, from: (u64, u64), to: (u64, u64), block: u64) -> Result<()> {
        let dev = disk();
        let mut source = CopySourceDevice::new(backend, &dev, from.0, from.1);
        let mut target = CopyTargetDevice::new(backend, &dev, to.0, to.1);
        source.open()?;
        target.open()?;
        copy_blocks(&mut Report::new("copy"), &mut source, &mut target, block, &mut |_| {})
    }

    #[test]
    fn overlaps_requires_same_device_and_shared_bytes() {
        let backend = RamBackend::new(32 * 1024);
        let dev = disk();
        let other = Device::disk("other", "/dev/ram1", 512, 64);

        let source = CopySourceDevice::new(&backend, &dev, 1000, 1999);
        assert!(source.overlaps(&CopyTargetDevice::new(&backend, &dev, 1999, 2999)));
        assert!(source.overlaps(&CopyTargetDevice::new(&backend, &dev, 0, 1000)));
        assert!(source.overlaps(&CopyTargetDevice::new(&backend, &dev, 0, 5000)));
        assert!(!source.overlaps(&CopyTargetDevice::new(&backend, &dev, 2000, 2999)));
        assert!(!source.overlaps(&CopyTargetDevice::new(&backend, &other, 1000, 1999)));

        let dir = tempfile::tempdir().unwrap();
        let file = CopySourceFile::new(dir.path().join("img"));
        assert!(!file.overlaps(&CopyTargetDevice::new(&backend, &dev, 0, 5000)));
        let shred = CopySourceShred::new(5000, ShredPattern::Zeros);
        assert!(!shred.overlaps(&CopyTargetDevice::new(&backend, &dev, 0, 5000)));
    }

    #[test]
    fn moving_right_over_itself_copies_backwards() {
        let backend = RamBackend::new(32 * 1024);
        let before = backend.snapshot();

        copy(&backend, (1000, 10_999), (4000, 13_999), 3000).unwrap();

        let after = backend.snapshot();
        assert_eq!(&after[4000..14_000], &before[1000..11_000]);
    }

    #[test]
    fn moving_left_over_itself_copies_forwards() {
        let backend = RamBackend::new(32 * 1024);
        let before = backend.snapshot();

        copy(&backend, (5000, 14_999), (1000, 10_999), 4096).unwrap();

        let after = backend.snapshot();
        assert_eq!(&after[1000..11_000], &before[5000..15_000]);
    }

    #[test]
    fn small_targets_are_rejected_before_any_write() {
        let backend = RamBackend::new(32 * 1024);
        let err = copy(&backend, (0, 9999), (20_000, 20_999), 4096).unwrap_err();
        assert!(matches!(err, SysError::TargetTooSmall { needed: 10_000, .. }));
        assert_eq!(backend.writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rollback_restores_overwritten_source_data() {
        let mut backend = RamBackend::new(32 * 1024);
        let before = backend.snapshot();
        backend.fail_after = Some(6000);

        let dev = disk();
        let mut source = CopySourceDevice::new(&backend, &dev, 8000, 17_999);
        let mut target = CopyTargetDevice::new(&backend, &dev, 10_000, 19_999);
        source.open().unwrap();
        target.open().unwrap();
        let mut report = Report::new("move");
        assert!(copy_blocks(&mut report, &mut source, &mut target, 2000, &mut |_| {}).is_err());
        assert_eq!(target.bytes_written(), 6000);
        assert_ne!(&backend.snapshot()[8000..18_000], &before[8000..18_000]);

        let rollback = RamBackend { fail_after: None, ..backend.clone() };
        rollback_copy_blocks(&mut report, &rollback, &source, &target, 2000).unwrap();

        assert_eq!(&backend.snapshot()[8000..18_000], &before[8000..18_000]);
    }

    #[test]
    fn rollback_without_overlap_does_no_io() {
        let backend = RamBackend::new(32 * 1024);
        let dev = disk();
        let source = CopySourceDevice::new(&backend, &dev, 0, 999);
        let target = CopyTargetDevice::new(&backend, &dev, 5000, 5999);

        let mut report = Report::new("copy");
        rollback_copy_blocks(&mut report, &backend, &source, &target, 512).unwrap();
        assert_eq!(backend.writes.load(Ordering::SeqCst), 0);
        assert!(report.contains_line("do not overlap"));
    }

    #[test]
    fn backup_and_restore_through_an_image_file() {
        let backend = RamBackend::new(32 * 1024);
        let before = backend.snapshot();
        let dev = disk();
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("part.img");

        let mut report = Report::new("backup");
        let mut source = CopySourceDevice::new(&backend, &dev, 2048, 6143);
        let mut file = CopyTargetFile::new(&image);
        source.open().unwrap();
        file.open().unwrap();
        copy_blocks(&mut report, &mut source, &mut file, 1000, &mut |_| {}).unwrap();
        file.sync().unwrap();
        assert_eq!(std::fs::metadata(&image).unwrap().len(), 4096);

        let mut restore = CopySourceFile::new(&image);
        let mut target = CopyTargetDevice::new(&backend, &dev, 20_000, 24_095);
        restore.open().unwrap();
        target.open().unwrap();
        let mut seen = Vec::new();
        copy_blocks(&mut report, &mut restore, &mut target, 1000, &mut |p| seen.push(p.percent()))
            .unwrap();

        assert_eq!(&backend.snapshot()[20_000..24_096], &before[2048..6144]);
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn shredding_writes_zeros() {
        let backend = RamBackend::new(32 * 1024);
        let dev = disk();
        let mut shred = CopySourceShred::new(3000, ShredPattern::Zeros);
        let mut target = CopyTargetDevice::new(&backend, &dev, 100, 3099);
        shred.open().unwrap();
        target.open().unwrap();
        copy_blocks(&mut Report::new("shred"), &mut shred, &mut target, 1024, &mut |_| {}).unwrap();
        assert!(backend.snapshot()[100..3100].iter().all(|b| *b == 0));
    }
}
