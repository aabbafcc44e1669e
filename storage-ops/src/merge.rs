// SPDX-License-Identifier: GPL-3.0-only

//! Folding a pushed operation into the ones already queued
//!
//! Each rule looks at one queued operation and the pushed one. A rule returns
//! `Some` when scanning stops; `pushed` is `None` afterwards if nothing is left to
//! append.

use storage_types::PartitionRef;
use tracing::info;

use crate::error::Result;
use crate::operations::{Operation, PendingOperation};
use crate::stack::{PushOutcome, StackState};

/// A new partition table wipes out everything queued for the device
pub(crate) fn discard_for_partition_table(
    state: &mut StackState,
    pushed: &Option<PendingOperation>,
) -> Result<bool> {
    let Some(PendingOperation::CreatePartitionTable(op)) = pushed else {
        return Ok(false);
    };
    let device_node = op.device_node().to_string();
    let mut discarded = false;
    for index in (0..state.operations.len()).rev() {
        if state.operations[index].as_operation().targets_device(&device_node) {
            let mut queued = state.operations.remove(index);
            queued.as_operation_mut().undo(&mut state.devices)?;
            info!(
                device = %device_node,
                operation = %queued.description(),
                "Creating a new partition table: discarding queued operation."
            );
            discarded = true;
        }
    }
    Ok(discarded)
}

pub(crate) fn merge(
    state: &mut StackState,
    index: usize,
    pushed: &mut Option<PendingOperation>,
) -> Result<Option<PushOutcome>> {
    if pushed.is_none() {
        return Ok(None);
    }
    match &state.operations[index] {
        PendingOperation::New(_) => merge_new(state, index, pushed),
        PendingOperation::Copy(_) => merge_copy(state, index, pushed),
        PendingOperation::Restore(_) => merge_restore(state, index, pushed),
        PendingOperation::SetPartFlags(_) => merge_flags(state, index, pushed),
        PendingOperation::SetFileSystemLabel(_) => merge_label(state, index, pushed),
        PendingOperation::ResizeVolumeGroup(_) => merge_volume_group(state, index, pushed),
        _ => Ok(None),
    }
}

/// Undo and remove queued operations after `index` that touch `partition`
fn discard_dependents(state: &mut StackState, index: usize, partition: &PartitionRef) -> Result<()> {
    for later in (index + 1..state.operations.len()).rev() {
        if state.operations[later].as_operation().targets_partition(partition) {
            let mut queued = state.operations.remove(later);
            queued.as_operation_mut().undo(&mut state.devices)?;
            info!(
                operation = %queued.description(),
                "Discarding operation on a partition that will no longer be created."
            );
        }
    }
    Ok(())
}

/// Undo and remove the operation at `index`
fn take_queued(state: &mut StackState, index: usize) -> Result<PendingOperation> {
    let mut queued = state.operations.remove(index);
    queued.as_operation_mut().undo(&mut state.devices)?;
    Ok(queued)
}

fn merge_new(
    state: &mut StackState,
    index: usize,
    pushed: &mut Option<PendingOperation>,
) -> Result<Option<PushOutcome>> {
    let PendingOperation::New(new_op) = &state.operations[index] else {
        return Ok(None);
    };
    let target = new_op.partition().clone();

    match pushed.as_ref() {
        Some(PendingOperation::Delete(delete))
            if delete.partition_ref() == target && !delete.is_extended() =>
        {
            info!("Deleting a partition just created: undoing the operation to create the partition.");
            *pushed = None;
            discard_dependents(state, index, &target)?;
            take_queued(state, index)?;
            Ok(Some(PushOutcome::Cancelled))
        }
        Some(PendingOperation::Resize(resize))
            if resize.partition() == &target && !resize.is_extended() =>
        {
            let (first, last) = (resize.new_first(), resize.new_last());
            info!("Resizing a partition just created: updating start and end in existing operation.");
            *pushed = None;
            if let PendingOperation::New(new_op) = &mut state.operations[index] {
                new_op.resize(&mut state.devices, first, last)?;
            }
            Ok(Some(PushOutcome::Absorbed))
        }
        Some(PendingOperation::SetFileSystemLabel(label)) if label.partition() == &target => {
            let label = label.new_label().to_string();
            info!("Changing label for a new partition: no new operation required.");
            *pushed = None;
            if let PendingOperation::New(new_op) = &mut state.operations[index] {
                new_op.set_file_system_label(&mut state.devices, &label)?;
            }
            Ok(Some(PushOutcome::Absorbed))
        }
        Some(PendingOperation::CreateFileSystem(create)) if create.partition() == &target => {
            let fs_type = create.new_type();
            info!("Changing file system for a new partition: no new operation required.");
            *pushed = None;
            if let PendingOperation::New(new_op) = &mut state.operations[index] {
                new_op.set_file_system_type(&mut state.devices, fs_type)?;
            }
            Ok(Some(PushOutcome::Absorbed))
        }
        Some(PendingOperation::Check(check)) if check.partition() == &target => {
            info!("Checking file systems is automatically done when creating them: no new operation required.");
            *pushed = None;
            Ok(Some(PushOutcome::Absorbed))
        }
        _ => Ok(None),
    }
}

fn merge_copy(
    state: &mut StackState,
    index: usize,
    pushed: &mut Option<PendingOperation>,
) -> Result<Option<PushOutcome>> {
    let PendingOperation::Copy(copy) = &state.operations[index] else {
        return Ok(None);
    };
    let copied = copy.copied().clone();
    let original_source = copy.source().clone();
    let overwritten = copy.overwritten().cloned();

    match pushed {
        Some(PendingOperation::Delete(delete)) if delete.partition_ref() == copied => {
            discard_dependents(state, index, &copied)?;
            take_queued(state, index)?;
            match overwritten {
                Some(overwritten) => {
                    info!("Deleting a partition just copied over an existing partition: removing the copy and deleting the existing partition.");
                    delete.retarget(state.devices.partition(&overwritten)?.clone());
                    Ok(Some(PushOutcome::Merged))
                }
                None => {
                    info!("Deleting a partition just copied: removing the copy.");
                    *pushed = None;
                    Ok(Some(PushOutcome::Cancelled))
                }
            }
        }
        Some(PendingOperation::Copy(pushed_copy)) if pushed_copy.source() == &copied => {
            info!("Copying a partition that is itself a copy: copying the original source partition instead.");
            pushed_copy.set_source(&state.devices, original_source)?;
            Ok(None)
        }
        _ => Ok(None),
    }
}

fn merge_restore(
    state: &mut StackState,
    index: usize,
    pushed: &mut Option<PendingOperation>,
) -> Result<Option<PushOutcome>> {
    let PendingOperation::Restore(restore) = &state.operations[index] else {
        return Ok(None);
    };
    let restored = restore.partition().clone();
    let overwritten = restore.overwritten().cloned();

    let Some(PendingOperation::Delete(delete)) = pushed else {
        return Ok(None);
    };
    if delete.partition_ref() != restored {
        return Ok(None);
    }

    discard_dependents(state, index, &restored)?;
    take_queued(state, index)?;
    match overwritten {
        Some(overwritten) => {
            info!("Deleting a partition just restored over an existing partition: removing the restore and deleting the existing partition.");
            delete.retarget(state.devices.partition(&overwritten)?.clone());
            Ok(Some(PushOutcome::Merged))
        }
        None => {
            info!("Deleting a partition just restored: removing the restore operation.");
            *pushed = None;
            Ok(Some(PushOutcome::Cancelled))
        }
    }
}

fn merge_flags(
    state: &mut StackState,
    index: usize,
    pushed: &mut Option<PendingOperation>,
) -> Result<Option<PushOutcome>> {
    let PendingOperation::SetPartFlags(queued) = &state.operations[index] else {
        return Ok(None);
    };
    let Some(PendingOperation::SetPartFlags(flags)) = pushed else {
        return Ok(None);
    };
    if flags.partition() != queued.partition() {
        return Ok(None);
    }

    info!("Changing flags again for the same partition: removing old operation.");
    flags.set_orig_flags(queued.orig_flags());
    let noop = flags.is_noop();
    take_queued(state, index)?;
    if noop {
        *pushed = None;
        return Ok(Some(PushOutcome::Cancelled));
    }
    Ok(Some(PushOutcome::Merged))
}

fn merge_label(
    state: &mut StackState,
    index: usize,
    pushed: &mut Option<PendingOperation>,
) -> Result<Option<PushOutcome>> {
    let PendingOperation::SetFileSystemLabel(queued) = &state.operations[index] else {
        return Ok(None);
    };
    let Some(PendingOperation::SetFileSystemLabel(label)) = pushed else {
        return Ok(None);
    };
    if label.partition() != queued.partition() {
        return Ok(None);
    }

    info!("Changing label again for the same partition: removing old operation.");
    label.set_old_label(queued.old_label());
    let noop = label.is_noop();
    take_queued(state, index)?;
    if noop {
        *pushed = None;
        return Ok(Some(PushOutcome::Cancelled));
    }
    Ok(Some(PushOutcome::Merged))
}

fn merge_volume_group(
    state: &mut StackState,
    index: usize,
    pushed: &mut Option<PendingOperation>,
) -> Result<Option<PushOutcome>> {
    let PendingOperation::ResizeVolumeGroup(queued) = &state.operations[index] else {
        return Ok(None);
    };
    let Some(PendingOperation::ResizeVolumeGroup(resize)) = pushed else {
        return Ok(None);
    };
    if resize.device_node() != queued.device_node() {
        return Ok(None);
    }

    info!("Resizing a volume group again: removing old operation.");
    resize.set_original(queued.original().to_vec());
    let noop = resize.is_noop();
    take_queued(state, index)?;
    if noop {
        *pushed = None;
        return Ok(Some(PushOutcome::Cancelled));
    }
    Ok(Some(PushOutcome::Merged))
}
