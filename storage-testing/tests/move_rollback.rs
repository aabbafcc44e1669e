// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::Report;
use storage_ops::EngineConfig;
use storage_ops::jobs::{JobContext, JobProgress, MoveFileSystemJob, run_job};
use storage_testing::fixtures::SDA;
use storage_testing::{MemoryBackend, MemoryFileSystemTools};
use storage_types::{
    Device, DeviceSet, FileSystem, FileSystemType, NodeRef, Partition, PartitionRef,
    PartitionRole, PartitionTable, TableType,
};

const FS_BYTES: usize = 128 * 512;

/// 2 MiB disk with one partition from 1 MiB and a 64 KiB ext4 file system in it
fn small_disk() -> (DeviceSet, PartitionRef) {
    let device = Device::disk("Memory Disk", SDA, 512, 4096);
    let mut table = PartitionTable::with_defaults(TableType::MsdosSectorBased, &device.geometry());
    let fs = FileSystem::new(FileSystemType::Ext4, 2048, 2175, 512);
    let id = table
        .insert(
            Partition::new(SDA, NodeRef::Root, PartitionRole::Primary.into(), fs, 2048, 4095)
                .with_number(1),
        )
        .unwrap();
    let mut device = device.with_partition_table(table);
    device.update_unallocated();

    let mut devices = DeviceSet::new();
    devices.insert(device);
    (devices, PartitionRef::new(SDA, id))
}

fn move_to(devices: &mut DeviceSet, backend: &MemoryBackend, target: &PartitionRef, sector: u64) -> (bool, Report) {
    let tools = MemoryFileSystemTools::new();
    let config = EngineConfig {
        copy_block_size: 4096,
        ..EngineConfig::default()
    };
    let mut progress = |_: JobProgress| {};
    let mut ctx = JobContext::new(backend, &tools, devices, &config, &mut progress);
    let mut job = MoveFileSystemJob::new(target.clone(), sector);
    let mut report = Report::new("move");
    let ok = run_job(&mut job, &mut ctx, &mut report);
    (ok, report)
}

fn pattern() -> Vec<u8> {
    (0..FS_BYTES).map(|i| (i / 512) as u8 ^ (i % 7) as u8).collect()
}

#[test]
fn a_move_that_fails_halfway_leaves_the_original_data_intact() {
    let (mut devices, partition) = small_disk();
    let backend = MemoryBackend::for_devices(&devices);
    let original = pattern();
    backend.write_bytes(SDA, 2048 * 512, &original).unwrap();

    // three blocks land, the fourth fails; the second and third overwrite the source tail
    backend.fail_writes_after(12_288);
    let (ok, report) = move_to(&mut devices, &backend, &partition, 2056);

    assert!(!ok);
    assert!(report.contains_line("Rollback from"));
    assert_eq!(backend.read_bytes(SDA, 2048 * 512, FS_BYTES).unwrap(), original);
    assert_eq!(devices.partition(&partition).unwrap().file_system.first_sector, 2048);
}

#[test]
fn a_completed_move_shifts_the_data_and_the_model() {
    let (mut devices, partition) = small_disk();
    let backend = MemoryBackend::for_devices(&devices);
    let original = pattern();
    backend.write_bytes(SDA, 2048 * 512, &original).unwrap();

    let (ok, _) = move_to(&mut devices, &backend, &partition, 2056);

    assert!(ok);
    assert_eq!(backend.read_bytes(SDA, 2056 * 512, FS_BYTES).unwrap(), original);
    let fs = &devices.partition(&partition).unwrap().file_system;
    assert_eq!((fs.first_sector, fs.last_sector), (2056, 2183));
}
