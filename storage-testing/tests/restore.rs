// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use storage_ops::{OperationStatus, RestoreOperation, RunnerEvent};
use storage_testing::fixtures::{MIB_SECTORS, Rig, SDA, populated_msdos};
use storage_testing::{BackendCall, ToolAction};
use storage_types::{FileSystemType, NodeRef, PartitionRef};

const IMAGE_LENGTH: usize = 1_000_000;

fn write_image(dir: &tempfile::TempDir) -> (PathBuf, Vec<u8>) {
    let image: Vec<u8> = (0..IMAGE_LENGTH).map(|i| (i % 251) as u8).collect();
    let path = dir.path().join("backup.img");
    std::fs::write(&path, &image).unwrap();
    (path, image)
}

fn queue_restore(rig: &Rig, start: u64, image: &Path) -> PartitionRef {
    let preview = rig.preview();
    let device = preview.device(SDA).unwrap();
    let partition =
        RestoreOperation::create_restore_partition(device, NodeRef::Root, start, image).unwrap();
    let operation = RestoreOperation::new(&preview, partition, image).unwrap();
    let restored = operation.partition().clone();
    rig.stack.push(operation).unwrap();
    restored
}

#[test]
fn restoring_over_a_partition_writes_the_image_and_detects_the_file_system() {
    let dir = tempfile::tempdir().unwrap();
    let (path, image) = write_image(&dir);
    let rig = Rig::new(populated_msdos().unwrap());
    rig.tools.fail(ToolAction::Resize);

    let restored = queue_restore(&rig, 2048, &path);
    let outcome = rig.apply();

    assert!(outcome.events.contains(&RunnerEvent::OpFinished {
        index: 0,
        status: OperationStatus::FinishedWarning,
    }));
    assert_eq!(outcome.last_event(), Some(&RunnerEvent::Finished));
    assert_eq!(
        rig.backend.read_bytes(SDA, 2048 * 512, IMAGE_LENGTH).unwrap(),
        image
    );
    assert!(outcome.report.contains_line("Maximizing file system"));

    let preview = rig.preview();
    let record = preview.partition(&restored).unwrap();
    assert_eq!(record.file_system.fs_type, FileSystemType::Ext4);
    assert_eq!(record.file_system.length(), 1954);
    assert_eq!(record.last_sector, 206_847);
}

#[test]
fn a_failed_restore_into_free_space_removes_the_new_partition() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = write_image(&dir);
    let rig = Rig::new(populated_msdos().unwrap());
    rig.backend.fail_writes_after(0);

    queue_restore(&rig, 900 * MIB_SECTORS, &path);
    let outcome = rig.apply();

    assert_eq!(outcome.last_event(), Some(&RunnerEvent::Error));
    let calls = rig.backend.calls();
    assert!(calls.iter().any(|c| matches!(c, BackendCall::CreatePartition { .. })));
    assert!(calls.iter().any(|c| matches!(c, BackendCall::DeletePartition { .. })));
    assert!(outcome.report.contains_line("Restoring file system failed."));
    assert_eq!(
        rig.backend.partitions(SDA).keys().copied().collect::<Vec<_>>(),
        vec![1, 2, 5, 6]
    );
}
