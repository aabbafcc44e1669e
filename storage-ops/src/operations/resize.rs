// SPDX-License-Identifier: GPL-3.0-only

use enumflags2::{BitFlags, bitflags};
use storage_contracts::{FileSystemTools, Report};
use storage_types::{
    CommandSupportType, DeviceSet, FsCapability, NodeRef, Partition, PartitionRef,
    PartitionRole, PartitionState, PartitionTable, sector_count,
};

use super::{Operation, OperationStatus, finish, operation_status, refresh_preview};
use crate::error::Result;
use crate::jobs::{
    CheckFileSystemJob, Job, JobContext, MoveFileSystemJob, ResizeFileSystemJob,
    SetPartGeometryJob, run_job,
};

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeAction {
    Shrink,
    Grow,
    MoveLeft,
    MoveRight,
}

pub type ResizeActions = BitFlags<ResizeAction>;

/// Grow, shrink or move a partition together with its file system
///
/// The file system is shrunk before the partition, and the partition is grown
/// before the file system. Moving shifts the partition first and copies the data
/// afterwards so a logical partition's boot record is never overwritten.
#[derive(Debug, Clone)]
pub struct ResizeOperation {
    device_node: String,
    partition: PartitionRef,
    path: String,
    orig_first: u64,
    orig_last: u64,
    new_first: u64,
    new_last: u64,
    /// Partition length once shrinking is done, the length that gets moved
    moved_length: u64,
    extended: bool,
    check_original: CheckFileSystemJob,
    move_extended: Option<SetPartGeometryJob>,
    shrink_resize: Option<ResizeFileSystemJob>,
    shrink_set_geometry: Option<SetPartGeometryJob>,
    move_set_geometry: Option<SetPartGeometryJob>,
    move_file_system: Option<MoveFileSystemJob>,
    grow_set_geometry: Option<SetPartGeometryJob>,
    grow_resize: Option<ResizeFileSystemJob>,
    check_resized: Option<CheckFileSystemJob>,
    status: OperationStatus,
}

impl ResizeOperation {
    pub fn new(
        devices: &DeviceSet,
        target: &PartitionRef,
        new_first: u64,
        new_last: u64,
    ) -> Result<Self> {
        let partition = devices.partition(target)?;
        let orig_first = partition.first_sector;
        let orig_last = partition.last_sector;
        let orig_length = partition.length();
        let new_length = sector_count(new_first, new_last);
        let actions = resize_actions(orig_first, orig_last, new_first, new_last);
        let extended = partition.is_extended();
        let moved_length = if actions.contains(ResizeAction::Shrink) {
            new_length
        } else {
            orig_length
        };

        let mut op = Self {
            device_node: partition.device_path.clone(),
            partition: target.clone(),
            path: partition.partition_path(),
            orig_first,
            orig_last,
            new_first,
            new_last,
            moved_length,
            extended,
            check_original: CheckFileSystemJob::new(target.clone()),
            move_extended: None,
            shrink_resize: None,
            shrink_set_geometry: None,
            move_set_geometry: None,
            move_file_system: None,
            grow_set_geometry: None,
            grow_resize: None,
            check_resized: None,
            status: OperationStatus::Pending,
        };

        if extended {
            op.move_extended = Some(SetPartGeometryJob::new(target.clone(), new_first, new_length));
            return Ok(op);
        }

        if actions.contains(ResizeAction::Shrink) {
            op.shrink_resize = Some(ResizeFileSystemJob::new(target.clone(), new_length));
            op.shrink_set_geometry =
                Some(SetPartGeometryJob::new(target.clone(), orig_first, new_length));
        }
        if actions.intersects(ResizeAction::MoveLeft | ResizeAction::MoveRight) {
            op.move_set_geometry =
                Some(SetPartGeometryJob::new(target.clone(), new_first, moved_length));
            op.move_file_system = Some(MoveFileSystemJob::new(target.clone(), new_first));
        }
        if actions.contains(ResizeAction::Grow) {
            op.grow_set_geometry =
                Some(SetPartGeometryJob::new(target.clone(), new_first, new_length));
            op.grow_resize = Some(ResizeFileSystemJob::new(target.clone(), new_length));
        }
        op.check_resized = Some(CheckFileSystemJob::new(target.clone()));
        Ok(op)
    }

    pub fn partition(&self) -> &PartitionRef {
        &self.partition
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn new_first(&self) -> u64 {
        self.new_first
    }

    pub fn new_last(&self) -> u64 {
        self.new_last
    }

    pub fn orig_first(&self) -> u64 {
        self.orig_first
    }

    pub fn orig_last(&self) -> u64 {
        self.orig_last
    }

    pub fn actions(&self) -> ResizeActions {
        resize_actions(self.orig_first, self.orig_last, self.new_first, self.new_last)
    }

    pub fn can_grow(tools: &dyn FileSystemTools, partition: &Partition) -> bool {
        if partition.state == PartitionState::New && !partition.roles.contains(PartitionRole::Luks) {
            return true;
        }
        let fs = partition.file_system.fs_type;
        if partition.is_mounted() {
            return tools.support(fs, FsCapability::GrowOnline) != CommandSupportType::None;
        }
        tools.support(fs, FsCapability::Grow) != CommandSupportType::None
    }

    pub fn can_shrink(tools: &dyn FileSystemTools, partition: &Partition) -> bool {
        match partition.state {
            PartitionState::New if !partition.roles.contains(PartitionRole::Luks) => return true,
            PartitionState::Copy | PartitionState::Restore => return false,
            _ => {}
        }
        let fs = partition.file_system.fs_type;
        if partition.is_mounted() {
            return tools.support(fs, FsCapability::ShrinkOnline) != CommandSupportType::None;
        }
        tools.support(fs, FsCapability::Shrink) != CommandSupportType::None
    }

    pub fn can_move(tools: &dyn FileSystemTools, table: &PartitionTable, partition: &Partition) -> bool {
        if partition.state == PartitionState::New {
            return true;
        }
        if partition.is_mounted() {
            return false;
        }
        if partition.is_extended()
            && table
                .children(NodeRef::Partition(partition.id()))
                .iter()
                .filter_map(|id| table.partition(*id))
                .any(|child| !child.is_unallocated())
        {
            return false;
        }
        tools.support(partition.file_system.fs_type, FsCapability::Move) != CommandSupportType::None
    }

    fn set_preview_geometry(&self, devices: &mut DeviceSet, first: u64, last: u64) -> Result<()> {
        let partition = devices.partition_mut(&self.partition)?;
        if partition.first_sector == first && partition.last_sector == last {
            return Ok(());
        }
        partition.set_geometry(first, last);
        let parent = partition.parent();
        refresh_preview(devices, &self.device_node, parent)
    }

    fn shrink(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        if let Some(job) = &mut self.shrink_resize
            && !run_job(job, ctx, report)
        {
            report.line(format!(
                "Resize/move failed: Could not resize file system to shrink partition {}.",
                self.path
            ));
            return false;
        }
        if let Some(job) = &mut self.shrink_set_geometry
            && !run_job(job, ctx, report)
        {
            report.line(format!(
                "Resize/move failed: Could not shrink partition {}.",
                self.path
            ));
            return false;
        }
        true
    }

    fn move_partition(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        if let Some(job) = &mut self.move_set_geometry
            && !run_job(job, ctx, report)
        {
            report.line(format!("Moving partition {} failed.", self.path));
            return false;
        }
        if let Some(job) = &mut self.move_file_system
            && !run_job(job, ctx, report)
        {
            report.line(format!(
                "Moving the file system for partition {} failed. Rolling back.",
                self.path
            ));
            let mut rollback =
                SetPartGeometryJob::new(self.partition.clone(), self.orig_first, self.moved_length);
            if !run_job(&mut rollback, ctx, report) {
                report.line(format!(
                    "Moving back partition {} to its original position failed.",
                    self.path
                ));
            }
            return false;
        }
        true
    }

    fn grow(&mut self, ctx: &mut JobContext<'_>, report: &mut Report) -> bool {
        if let Some(job) = &mut self.grow_set_geometry
            && !run_job(job, ctx, report)
        {
            report.line(format!(
                "Resize/move failed: Could not grow partition {}.",
                self.path
            ));
            return false;
        }
        if let Some(job) = &mut self.grow_resize
            && !run_job(job, ctx, report)
        {
            report.line(format!(
                "Resize/move failed: Could not resize the file system on partition {}.",
                self.path
            ));
            let mut rollback =
                SetPartGeometryJob::new(self.partition.clone(), self.new_first, self.moved_length);
            if !run_job(&mut rollback, ctx, report) {
                report.line(format!(
                    "Could not restore old partition size for partition {}.",
                    self.path
                ));
            }
            return false;
        }
        true
    }
}

/// What turns `orig_first..=orig_last` into `new_first..=new_last`
pub fn resize_actions(orig_first: u64, orig_last: u64, new_first: u64, new_last: u64) -> ResizeActions {
    let orig_length = sector_count(orig_first, orig_last);
    let new_length = sector_count(new_first, new_last);
    let mut actions = ResizeActions::empty();
    if new_length < orig_length {
        actions |= ResizeAction::Shrink;
    }
    if new_length > orig_length {
        actions |= ResizeAction::Grow;
    }
    if new_first < orig_first {
        actions |= ResizeAction::MoveLeft;
    }
    if new_first > orig_first {
        actions |= ResizeAction::MoveRight;
    }
    actions
}

impl Operation for ResizeOperation {
    fn description(&self) -> String {
        let orig_length = sector_count(self.orig_first, self.orig_last);
        let new_length = sector_count(self.new_first, self.new_last);
        let actions = self.actions();
        let moved = actions.intersects(ResizeAction::MoveLeft | ResizeAction::MoveRight);
        let resized = actions.intersects(ResizeAction::Shrink | ResizeAction::Grow);
        match (moved, resized) {
            (true, true) => format!(
                "Resize partition {} from {orig_length} to {new_length} sectors and move it from sector {} to {}",
                self.path, self.orig_first, self.new_first
            ),
            (true, false) => format!(
                "Move partition {} from sector {} to {}",
                self.path, self.orig_first, self.new_first
            ),
            (false, true) => format!(
                "Resize partition {} from {orig_length} to {new_length} sectors",
                self.path
            ),
            (false, false) => format!("Leave partition {} unchanged", self.path),
        }
    }

    operation_status!();

    fn preview(&mut self, devices: &mut DeviceSet) -> Result<()> {
        self.set_preview_geometry(devices, self.new_first, self.new_last)
    }

    fn undo(&mut self, devices: &mut DeviceSet) -> Result<()> {
        self.set_preview_geometry(devices, self.orig_first, self.orig_last)
    }

    fn targets_device(&self, device_node: &str) -> bool {
        self.device_node == device_node
    }

    fn targets_partition(&self, partition: &PartitionRef) -> bool {
        self.partition == *partition
    }

    fn jobs(&self) -> Vec<&dyn Job> {
        let mut jobs: Vec<&dyn Job> = vec![&self.check_original];
        if let Some(job) = &self.move_extended {
            jobs.push(job);
        }
        if let Some(job) = &self.shrink_resize {
            jobs.push(job);
        }
        if let Some(job) = &self.shrink_set_geometry {
            jobs.push(job);
        }
        if let Some(job) = &self.move_set_geometry {
            jobs.push(job);
        }
        if let Some(job) = &self.move_file_system {
            jobs.push(job);
        }
        if let Some(job) = &self.grow_set_geometry {
            jobs.push(job);
        }
        if let Some(job) = &self.grow_resize {
            jobs.push(job);
        }
        if let Some(job) = &self.check_resized {
            jobs.push(job);
        }
        jobs
    }

    fn jobs_mut(&mut self) -> Vec<&mut dyn Job> {
        let mut jobs: Vec<&mut dyn Job> = vec![&mut self.check_original];
        if let Some(job) = &mut self.move_extended {
            jobs.push(job);
        }
        if let Some(job) = &mut self.shrink_resize {
            jobs.push(job);
        }
        if let Some(job) = &mut self.shrink_set_geometry {
            jobs.push(job);
        }
        if let Some(job) = &mut self.move_set_geometry {
            jobs.push(job);
        }
        if let Some(job) = &mut self.move_file_system {
            jobs.push(job);
        }
        if let Some(job) = &mut self.grow_set_geometry {
            jobs.push(job);
        }
        if let Some(job) = &mut self.grow_resize {
            jobs.push(job);
        }
        if let Some(job) = &mut self.check_resized {
            jobs.push(job);
        }
        jobs
    }

    fn execute(&mut self, ctx: &mut JobContext<'_>, parent: &mut Report) -> bool {
        let description = self.description();
        let report = parent.child(description.clone());

        let ok = if !run_job(&mut self.check_original, ctx, report) {
            report.line(format!(
                "Checking partition {} before resize/move failed.",
                self.path
            ));
            false
        } else if let Some(job) = &mut self.move_extended {
            run_job(job, ctx, report)
        } else if self.shrink(ctx, report) && self.move_partition(ctx, report) && self.grow(ctx, report) {
            match &mut self.check_resized {
                Some(job) => {
                    let checked = run_job(job, ctx, report);
                    if !checked {
                        report.line(format!(
                            "Checking partition {} after resize/move failed.",
                            self.path
                        ));
                    }
                    checked
                }
                None => true,
            }
        } else {
            report.line(format!("Resizing/moving partition {} failed.", self.path));
            false
        };

        let status = if ok {
            OperationStatus::FinishedSuccess
        } else {
            OperationStatus::Error
        };
        finish(self, report, &description, status);
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::fixtures::{by_number, free_at, layout, populated_disk};

    #[test]
    fn actions_follow_the_geometry_change() {
        assert_eq!(resize_actions(100, 199, 100, 149), ResizeAction::Shrink);
        assert_eq!(resize_actions(100, 199, 100, 299), ResizeAction::Grow);
        assert_eq!(
            resize_actions(100, 199, 50, 199),
            ResizeAction::Grow | ResizeAction::MoveLeft
        );
        assert_eq!(resize_actions(100, 199, 200, 299), ResizeAction::MoveRight);
        assert!(resize_actions(100, 199, 100, 199).is_empty());
    }

    #[test]
    fn shrinking_and_moving_queues_jobs_in_safe_order() {
        let devices = populated_disk();
        let sda1 = by_number(&devices, 1);
        let op = ResizeOperation::new(&devices, &sda1, 4096, 104_447).unwrap();
        let descriptions: Vec<String> = op.jobs().iter().map(|j| j.description()).collect();

        assert_eq!(descriptions.len(), 6);
        assert!(descriptions[1].starts_with("Resize file system"));
        assert!(descriptions[3].contains("sector 4096"));
        assert!(descriptions[4].starts_with("Move the file system"));
    }

    #[test]
    fn preview_round_trips_through_undo() {
        let mut devices = populated_disk();
        let before = layout(&devices);
        let sda1 = by_number(&devices, 1);

        let mut op = ResizeOperation::new(&devices, &sda1, 2048, 104_447).unwrap();
        op.preview(&mut devices).unwrap();
        op.preview(&mut devices).unwrap();
        assert_eq!(devices.partition(&sda1).unwrap().last_sector, 104_447);
        assert_eq!(free_at(&devices, 104_448).first_sector, 104_448);

        op.undo(&mut devices).unwrap();
        op.undo(&mut devices).unwrap();
        assert_eq!(layout(&devices), before);
    }
}
