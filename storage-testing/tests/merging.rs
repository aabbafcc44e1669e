// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use storage_ops::{
    CopyOperation, DeleteOperation, NewOperation, PendingOperation, PushOutcome, RestoreOperation,
    RunnerEvent, SetFileSystemLabelOperation, SetPartFlagsOperation, ShredAction,
};
use storage_testing::fixtures::{MIB_SECTORS, Rig, SDA, empty_msdos, populated_msdos};
use storage_testing::{BackendCall, scenario};
use storage_types::{FileSystemType, NodeRef, PartitionFlag, PartitionFlags, PartitionRef};

fn scenario_file(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(format!("{name}.toml"))
}

#[test]
fn toggling_boot_on_and_off_queues_nothing() {
    let scenario = scenario::load_path(&scenario_file("flags-toggle")).unwrap();
    let rig = Rig::new(scenario.devices().unwrap());
    let before = rig.layout(SDA);

    let outcomes = scenario.queue(&rig.stack).unwrap();
    assert_eq!(outcomes, vec![PushOutcome::Appended, PushOutcome::Cancelled]);
    assert!(rig.stack.is_empty());
    assert_eq!(rig.layout(SDA), before);
}

#[test]
fn flags_changed_twice_keep_one_operation_with_the_first_original_flags() {
    let rig = Rig::new(populated_msdos().unwrap());
    let sda1 = rig.numbered(SDA, 1).unwrap();

    let boot = SetPartFlagsOperation::new(&rig.preview(), &sda1, PartitionFlag::Boot.into()).unwrap();
    rig.stack.push(boot).unwrap();
    let flags: PartitionFlags = PartitionFlag::Boot | PartitionFlag::Lba;
    let both = SetPartFlagsOperation::new(&rig.preview(), &sda1, flags).unwrap();
    assert_eq!(rig.stack.push(both).unwrap(), PushOutcome::Merged);
    assert_eq!(rig.stack.len(), 1);

    let outcome = rig.apply();
    assert_eq!(outcome.last_event(), Some(&RunnerEvent::Finished));
    assert_eq!(rig.backend.partitions(SDA)[&1].flags, flags);
}

#[test]
fn deleting_a_queued_new_partition_cancels_both() {
    let rig = Rig::new(empty_msdos());
    let before = rig.layout(SDA);
    let free = rig.free_at(SDA, 4096).unwrap();
    let new = NewOperation::new(NewOperation::create_new(&free, FileSystemType::Ext4));
    let created = new.partition().clone();
    rig.stack.push(new).unwrap();

    let delete = DeleteOperation::new(&rig.preview(), &created, ShredAction::None).unwrap();
    assert_eq!(rig.stack.push(delete).unwrap(), PushOutcome::Cancelled);
    assert!(rig.stack.is_empty());
    assert_eq!(rig.layout(SDA), before);

    let outcome = rig.apply();
    assert_eq!(outcome.events, vec![RunnerEvent::Finished]);
    assert!(rig.backend.calls().is_empty());
}

#[test]
fn deleting_a_copy_pasted_over_a_partition_deletes_that_partition() {
    let rig = Rig::new(populated_msdos().unwrap());
    let preview = rig.preview();
    let sda5 = rig.numbered(SDA, 5).unwrap();
    let sda6 = rig.numbered(SDA, 6).unwrap();
    let copied = CopyOperation::create_copy(
        preview.partition(&sda6).unwrap(),
        preview.partition(&sda5).unwrap(),
    );
    let copy = CopyOperation::new(&preview, copied, &sda5).unwrap();
    let copy_ref = copy.copied().clone();
    rig.stack.push(copy).unwrap();

    let delete = DeleteOperation::new(&rig.preview(), &copy_ref, ShredAction::None).unwrap();
    assert_eq!(rig.stack.push(delete).unwrap(), PushOutcome::Merged);
    assert_eq!(rig.stack.len(), 1);

    let outcome = rig.apply();
    assert_eq!(outcome.last_event(), Some(&RunnerEvent::Finished));
    assert!(rig.backend.calls().contains(&BackendCall::DeletePartition {
        device: SDA.to_string(),
        number: 6,
    }));
    assert!(!rig.backend.partitions(SDA).contains_key(&6));
}

/// Queue a restore of a small image starting at `start`
fn queue_restore(rig: &Rig, dir: &tempfile::TempDir, start: u64) -> PartitionRef {
    let image = dir.path().join("backup.img");
    std::fs::write(&image, vec![0x5a_u8; 512 * 1024]).unwrap();
    let preview = rig.preview();
    let partition = RestoreOperation::create_restore_partition(
        preview.device(SDA).unwrap(),
        NodeRef::Root,
        start,
        &image,
    )
    .unwrap();
    let restore = RestoreOperation::new(&preview, partition, &image).unwrap();
    let restored = restore.partition().clone();
    assert_eq!(rig.stack.push(restore).unwrap(), PushOutcome::Appended);
    restored
}

#[test]
fn deleting_a_restore_into_free_space_cancels_it_and_its_dependents() {
    let dir = tempfile::tempdir().unwrap();
    let rig = Rig::new(populated_msdos().unwrap());
    let before = rig.layout(SDA);

    let restored = queue_restore(&rig, &dir, 900 * MIB_SECTORS);
    let label = SetFileSystemLabelOperation::new(&rig.preview(), &restored, "restored").unwrap();
    assert_eq!(rig.stack.push(label).unwrap(), PushOutcome::Appended);
    assert_eq!(rig.stack.len(), 2);

    let delete = DeleteOperation::new(&rig.preview(), &restored, ShredAction::None).unwrap();
    assert_eq!(rig.stack.push(delete).unwrap(), PushOutcome::Cancelled);
    assert!(rig.stack.is_empty());
    assert_eq!(rig.layout(SDA), before);
}

#[test]
fn deleting_a_restore_over_a_partition_deletes_that_partition() {
    let dir = tempfile::tempdir().unwrap();
    let rig = Rig::new(populated_msdos().unwrap());
    let sda1 = rig.numbered(SDA, 1).unwrap();

    let restored = queue_restore(&rig, &dir, 2048);
    assert_ne!(restored, sda1);
    let delete = DeleteOperation::new(&rig.preview(), &restored, ShredAction::None).unwrap();
    assert_eq!(rig.stack.push(delete).unwrap(), PushOutcome::Merged);

    {
        let state = rig.stack.read();
        assert_eq!(state.operations().len(), 1);
        let PendingOperation::Delete(op) = &state.operations()[0] else {
            panic!("expected a delete operation");
        };
        assert_eq!(op.partition_ref(), sda1);
        assert!(state.devices().partition(&sda1).is_err());
        assert!(state.devices().partition(&restored).is_err());
    }

    let outcome = rig.apply();
    assert_eq!(outcome.last_event(), Some(&RunnerEvent::Finished));
    assert!(rig.backend.calls().contains(&BackendCall::DeletePartition {
        device: SDA.to_string(),
        number: 1,
    }));
    assert!(!rig.backend.partitions(SDA).contains_key(&1));
}
