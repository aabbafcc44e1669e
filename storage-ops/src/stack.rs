// SPDX-License-Identifier: GPL-3.0-only

//! The queue of pending operations and the preview model they edit
//!
//! Pushing an operation may fold it into one already queued (see `merge`) so the
//! queue never holds two operations that cancel or supersede each other.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use storage_types::{Device, DeviceSet, DeviceType};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{OperationError, Result};
use crate::merge;
use crate::operations::PendingOperation;

/// What became of a pushed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushOutcome {
    /// Queued and previewed as given
    Appended,
    /// Queued after taking over state from operations it replaced
    Merged,
    /// Folded into an operation already queued
    Absorbed,
    /// Cancelled out together with an operation already queued
    Cancelled,
}

/// Queued operations together with the devices as they will look after them
#[derive(Debug, Default)]
pub struct StackState {
    pub(crate) operations: Vec<PendingOperation>,
    pub(crate) devices: DeviceSet,
}

impl StackState {
    pub fn operations(&self) -> &[PendingOperation] {
        &self.operations
    }

    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    /// Operations and the preview, both mutable, for running operations
    pub(crate) fn split_mut(&mut self) -> (&mut Vec<PendingOperation>, &mut DeviceSet) {
        (&mut self.operations, &mut self.devices)
    }
}

#[derive(Debug, Default)]
pub struct OperationStack {
    state: RwLock<StackState>,
    config: EngineConfig,
}

impl OperationStack {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            state: RwLock::new(StackState::default()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn read(&self) -> RwLockReadGuard<'_, StackState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, StackState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start managing a device, replacing any device with the same node
    pub fn add_device(&self, mut device: Device) {
        if device.device_type() != DeviceType::Lvm {
            device.sector_alignment = self.config.sector_alignment;
        }
        device.update_unallocated();
        debug!(device = %device.device_node, "adding device to the operation stack");
        self.write().devices.insert(device);
    }

    pub fn clear_devices(&self) {
        let mut state = self.write();
        state.operations.clear();
        state.devices.clear();
    }

    /// A copy of the preview model
    pub fn preview_devices(&self) -> DeviceSet {
        self.read().devices.clone()
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.read()
            .operations
            .iter()
            .map(PendingOperation::description)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().operations.is_empty()
    }

    /// Merge `operation` into the queue or append it, previewing its effect
    ///
    /// On error the queue and the preview are left exactly as they were.
    pub fn push(&self, operation: impl Into<PendingOperation>) -> Result<PushOutcome> {
        let mut guard = self.write();
        let state: &mut StackState = &mut guard;
        let saved_operations = state.operations.clone();
        let saved_devices = state.devices.clone();

        let pushed = push_locked(state, operation.into());
        if let Err(e) = &pushed {
            warn!(error = %e, "pushing operation failed, restoring the queue");
            state.operations = saved_operations;
            state.devices = saved_devices;
        }
        pushed
    }

    /// Undo and remove the newest operation
    pub fn pop(&self) -> Result<PendingOperation> {
        let mut guard = self.write();
        let state: &mut StackState = &mut guard;
        let mut operation = state.operations.pop().ok_or(OperationError::EmptyStack)?;
        operation.as_operation_mut().undo(&mut state.devices)?;
        info!(operation = %operation.description(), "operation undone");
        Ok(operation)
    }

    /// Undo every pending operation, newest first
    pub fn clear_operations(&self) -> Result<()> {
        let mut guard = self.write();
        let state: &mut StackState = &mut guard;
        while let Some(mut operation) = state.operations.pop() {
            if operation.status().is_finished() {
                continue;
            }
            operation.as_operation_mut().undo(&mut state.devices)?;
        }
        Ok(())
    }

    /// Drop operations that already ran; their effect is now the real state
    pub fn discard_finished(&self) -> usize {
        let mut state = self.write();
        let before = state.operations.len();
        state.operations.retain(|op| !op.status().is_finished());
        before - state.operations.len()
    }
}

fn push_locked(state: &mut StackState, operation: PendingOperation) -> Result<PushOutcome> {
    let mut pushed = Some(operation);
    let mut outcome = if merge::discard_for_partition_table(state, &pushed)? {
        PushOutcome::Merged
    } else {
        PushOutcome::Appended
    };

    for index in (0..state.operations.len()).rev() {
        if let Some(result) = merge::merge(state, index, &mut pushed)? {
            outcome = result;
            break;
        }
    }

    let Some(mut operation) = pushed else {
        return Ok(outcome);
    };
    operation.as_operation_mut().preview(&mut state.devices)?;
    info!(operation = %operation.description(), "operation queued");
    state.operations.push(operation);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::fixtures::{
        SDA, by_number, empty_disk, free_at, layout, populated_disk, pv, volume_group,
    };
    use crate::operations::{
        CheckOperation, CopyOperation, CreateFileSystemOperation, CreatePartitionTableOperation,
        DeleteOperation, NewOperation, ResizeOperation, ResizeVolumeGroupOperation,
        SetFileSystemLabelOperation, SetPartFlagsOperation, ShredAction,
    };
    use storage_types::{FileSystemType, PartitionFlag, PartitionFlags, TableType};

    fn stack_with(devices: DeviceSet) -> OperationStack {
        let stack = OperationStack::new(EngineConfig::default());
        for device in devices.iter() {
            stack.add_device(device.clone());
        }
        stack
    }

    fn preview_layout(stack: &OperationStack) -> Vec<storage_types::LayoutEntry> {
        layout(&stack.read().devices)
    }

    fn push_new(stack: &OperationStack, sector: u64) -> storage_types::PartitionRef {
        let devices = stack.preview_devices();
        let free = free_at(&devices, sector);
        let mut partition = NewOperation::create_new(&free, FileSystemType::Ext4);
        partition.set_geometry(free.first_sector, free.first_sector + 204_799);
        partition.file_system.last_sector = partition.last_sector;
        let op = NewOperation::new(partition);
        let reference = op.partition().clone();
        assert_eq!(stack.push(op).unwrap(), PushOutcome::Appended);
        reference
    }

    #[test]
    fn add_device_stamps_the_configured_alignment() {
        let config = EngineConfig {
            sector_alignment: 4096,
            ..EngineConfig::default()
        };
        let stack = OperationStack::new(config);
        for device in empty_disk().iter() {
            stack.add_device(device.clone());
        }
        assert_eq!(stack.read().devices().device(SDA).unwrap().sector_alignment, 4096);
    }

    #[test]
    fn creating_then_deleting_a_partition_leaves_nothing_queued() {
        let stack = stack_with(empty_disk());
        let before = preview_layout(&stack);
        let created = push_new(&stack, 4096);

        let devices = stack.preview_devices();
        let delete = DeleteOperation::new(&devices, &created, ShredAction::None).unwrap();
        assert_eq!(stack.push(delete).unwrap(), PushOutcome::Cancelled);
        assert!(stack.is_empty());
        assert_eq!(preview_layout(&stack), before);
    }

    #[test]
    fn edits_to_a_new_partition_fold_into_its_operation() {
        let stack = stack_with(empty_disk());
        let created = push_new(&stack, 4096);
        let devices = stack.preview_devices();

        let resize = ResizeOperation::new(&devices, &created, 2048, 104_447).unwrap();
        assert_eq!(stack.push(resize).unwrap(), PushOutcome::Absorbed);

        let devices = stack.preview_devices();
        let label = SetFileSystemLabelOperation::new(&devices, &created, "data").unwrap();
        assert_eq!(stack.push(label).unwrap(), PushOutcome::Absorbed);
        let format = CreateFileSystemOperation::new(&devices, &created, FileSystemType::Xfs).unwrap();
        assert_eq!(stack.push(format).unwrap(), PushOutcome::Absorbed);
        let check = CheckOperation::new(&devices, &created).unwrap();
        assert_eq!(stack.push(check).unwrap(), PushOutcome::Absorbed);

        assert_eq!(stack.len(), 1);
        let state = stack.read();
        let p = state.devices().partition(&created).unwrap();
        assert_eq!((p.first_sector, p.last_sector), (2048, 104_447));
        assert_eq!(p.file_system.fs_type, FileSystemType::Xfs);
        assert_eq!(p.file_system.label, "data");
    }

    #[test]
    fn toggling_a_flag_back_cancels_both_operations() {
        let stack = stack_with(populated_disk());
        let before = preview_layout(&stack);
        let sda1 = by_number(&stack.preview_devices(), 1);

        let on = SetPartFlagsOperation::new(&stack.preview_devices(), &sda1, PartitionFlag::Boot.into())
            .unwrap();
        assert_eq!(stack.push(on).unwrap(), PushOutcome::Appended);
        let off = SetPartFlagsOperation::new(&stack.preview_devices(), &sda1, PartitionFlags::empty())
            .unwrap();
        assert_eq!(stack.push(off).unwrap(), PushOutcome::Cancelled);

        assert!(stack.is_empty());
        assert_eq!(preview_layout(&stack), before);
    }

    #[test]
    fn relabelling_keeps_a_single_operation_with_the_first_old_label() {
        let stack = stack_with(populated_disk());
        let sda1 = by_number(&stack.preview_devices(), 1);

        let first = SetFileSystemLabelOperation::new(&stack.preview_devices(), &sda1, "one").unwrap();
        stack.push(first).unwrap();
        let second = SetFileSystemLabelOperation::new(&stack.preview_devices(), &sda1, "two").unwrap();
        assert_eq!(stack.push(second).unwrap(), PushOutcome::Merged);

        let state = stack.read();
        assert_eq!(state.operations().len(), 1);
        let PendingOperation::SetFileSystemLabel(op) = &state.operations()[0] else {
            panic!("expected a label operation");
        };
        assert_eq!(op.old_label(), "");
        assert_eq!(op.new_label(), "two");
    }

    #[test]
    fn deleting_a_pasted_copy_removes_the_copy() {
        let stack = stack_with(populated_disk());
        let before = preview_layout(&stack);
        let devices = stack.preview_devices();
        let sda1 = by_number(&devices, 1);
        let source = devices.partition(&sda1).unwrap().clone();
        let copied = CopyOperation::create_copy(&free_at(&devices, 900_000), &source);
        let copy = CopyOperation::new(&devices, copied, &sda1).unwrap();
        let copied_ref = copy.copied().clone();
        stack.push(copy).unwrap();

        let delete =
            DeleteOperation::new(&stack.preview_devices(), &copied_ref, ShredAction::None).unwrap();
        assert_eq!(stack.push(delete).unwrap(), PushOutcome::Cancelled);
        assert!(stack.is_empty());
        assert_eq!(preview_layout(&stack), before);
    }

    #[test]
    fn deleting_a_copy_over_a_partition_deletes_the_overwritten_one() {
        let stack = stack_with(populated_disk());
        let devices = stack.preview_devices();
        let sda5 = by_number(&devices, 5);
        let sda6 = by_number(&devices, 6);
        let copied = CopyOperation::create_copy(
            devices.partition(&sda6).unwrap(),
            devices.partition(&sda5).unwrap(),
        );
        let copy = CopyOperation::new(&devices, copied, &sda5).unwrap();
        let copied_ref = copy.copied().clone();
        stack.push(copy).unwrap();

        let delete =
            DeleteOperation::new(&stack.preview_devices(), &copied_ref, ShredAction::None).unwrap();
        assert_eq!(stack.push(delete).unwrap(), PushOutcome::Merged);

        let state = stack.read();
        assert_eq!(state.operations().len(), 1);
        let PendingOperation::Delete(op) = &state.operations()[0] else {
            panic!("expected a delete operation");
        };
        assert_eq!(op.partition_ref(), sda6);
        assert!(state.devices().partition(&sda6).is_err());
    }

    #[test]
    fn copying_a_copy_reads_from_the_original() {
        let stack = stack_with(populated_disk());
        let devices = stack.preview_devices();
        let sda1 = by_number(&devices, 1);
        let source = devices.partition(&sda1).unwrap().clone();
        let first = CopyOperation::new(
            &devices,
            CopyOperation::create_copy(&free_at(&devices, 900_000), &source),
            &sda1,
        )
        .unwrap();
        let first_copy = first.copied().clone();
        stack.push(first).unwrap();

        let devices = stack.preview_devices();
        let intermediate = devices.partition(&first_copy).unwrap().clone();
        let free = free_at(&devices, intermediate.last_sector + 4096);
        let second = CopyOperation::new(
            &devices,
            CopyOperation::create_copy(&free, &intermediate),
            &first_copy,
        )
        .unwrap();
        assert_eq!(stack.push(second).unwrap(), PushOutcome::Appended);

        let state = stack.read();
        let PendingOperation::Copy(op) = &state.operations()[1] else {
            panic!("expected a copy operation");
        };
        assert_eq!(op.source(), &sda1);
    }

    #[test]
    fn a_new_partition_table_discards_everything_queued_for_the_device() {
        let stack = stack_with(populated_disk());
        let before = preview_layout(&stack);
        let devices = stack.preview_devices();
        let sda1 = by_number(&devices, 1);
        stack
            .push(SetPartFlagsOperation::new(&devices, &sda1, PartitionFlag::Boot.into()).unwrap())
            .unwrap();
        push_new(&stack, 900_000);
        assert_eq!(stack.len(), 2);

        let table =
            CreatePartitionTableOperation::new(&stack.preview_devices(), SDA, TableType::Gpt).unwrap();
        assert_eq!(stack.push(table).unwrap(), PushOutcome::Merged);
        assert_eq!(stack.len(), 1);

        stack.pop().unwrap();
        assert_eq!(preview_layout(&stack), before);
    }

    fn group_layout(stack: &OperationStack) -> (Vec<storage_types::LayoutEntry>, u64) {
        let state = stack.read();
        let device = state.devices().device("/dev/vg0").unwrap();
        (device.partition_table().unwrap().layout(), device.total_logical_sectors)
    }

    #[test]
    fn resizing_a_volume_group_back_cancels_both_operations() {
        let stack = stack_with(volume_group());
        let before = group_layout(&stack);

        let grow = ResizeVolumeGroupOperation::new(
            &stack.preview_devices(),
            "/dev/vg0",
            vec![pv("/dev/sdb1", 100), pv("/dev/sdc1", 100), pv("/dev/sdd1", 50)],
        )
        .unwrap();
        assert_eq!(stack.push(grow).unwrap(), PushOutcome::Appended);
        assert_eq!(group_layout(&stack).1, 250);

        let back = ResizeVolumeGroupOperation::new(
            &stack.preview_devices(),
            "/dev/vg0",
            vec![pv("/dev/sdb1", 100), pv("/dev/sdc1", 100)],
        )
        .unwrap();
        assert_eq!(stack.push(back).unwrap(), PushOutcome::Cancelled);
        assert_eq!(stack.len(), 0);
        assert_eq!(group_layout(&stack), before);
    }

    #[test]
    fn resizing_a_volume_group_twice_keeps_the_first_original() {
        let stack = stack_with(volume_group());
        let grow = ResizeVolumeGroupOperation::new(
            &stack.preview_devices(),
            "/dev/vg0",
            vec![pv("/dev/sdb1", 100), pv("/dev/sdc1", 100), pv("/dev/sdd1", 50)],
        )
        .unwrap();
        stack.push(grow).unwrap();

        let swap = ResizeVolumeGroupOperation::new(
            &stack.preview_devices(),
            "/dev/vg0",
            vec![pv("/dev/sdb1", 100), pv("/dev/sdd1", 50)],
        )
        .unwrap();
        assert_eq!(stack.push(swap).unwrap(), PushOutcome::Merged);
        assert_eq!(group_layout(&stack).1, 150);

        let state = stack.read();
        assert_eq!(state.operations().len(), 1);
        let PendingOperation::ResizeVolumeGroup(op) = &state.operations()[0] else {
            panic!("expected a volume group operation");
        };
        assert_eq!(op.original(), &[pv("/dev/sdb1", 100), pv("/dev/sdc1", 100)][..]);
    }

    #[test]
    fn a_failed_push_leaves_the_queue_untouched() {
        let stack = stack_with(populated_disk());
        let sda1 = by_number(&stack.preview_devices(), 1);
        let on = SetPartFlagsOperation::new(&stack.preview_devices(), &sda1, PartitionFlag::Boot.into())
            .unwrap();
        stack.push(on).unwrap();
        let before_delete = stack.preview_devices();
        let delete = DeleteOperation::new(&before_delete, &sda1, ShredAction::None).unwrap();
        assert_eq!(stack.push(delete).unwrap(), PushOutcome::Appended);
        let after_delete = preview_layout(&stack);

        // Merging drops the queued flags operation, but undoing it needs sda1 in the preview.
        let stale = SetPartFlagsOperation::new(
            &before_delete,
            &sda1,
            PartitionFlag::Boot | PartitionFlag::Lba,
        )
        .unwrap();
        assert!(stack.push(stale).is_err());

        assert_eq!(stack.len(), 2);
        assert!(matches!(stack.read().operations()[0], PendingOperation::SetPartFlags(_)));
        assert_eq!(preview_layout(&stack), after_delete);
    }

    #[test]
    fn pop_and_clear_undo_in_reverse_order() {
        let stack = stack_with(populated_disk());
        let before = preview_layout(&stack);
        let devices = stack.preview_devices();
        let sda5 = by_number(&devices, 5);
        stack
            .push(DeleteOperation::new(&devices, &sda5, ShredAction::None).unwrap())
            .unwrap();
        push_new(&stack, 900_000);
        assert_eq!(stack.descriptions().len(), 2);

        stack.pop().unwrap();
        assert_eq!(stack.len(), 1);
        stack.clear_operations().unwrap();
        assert!(stack.is_empty());
        assert_eq!(preview_layout(&stack), before);
        assert!(matches!(stack.pop(), Err(OperationError::EmptyStack)));
    }
}
