// SPDX-License-Identifier: GPL-3.0-only

//! Operation engine: queue partitioning changes, preview them, apply them
//!
//! Changes are built as [`operations`], each a fixed list of [`jobs`]. Pushing one
//! onto the [`OperationStack`] edits the stack's preview model right away, possibly
//! merging it with operations already queued. The [`OperationRunner`] later executes
//! the queue against a [`storage_contracts::CoreBackend`], reporting progress as
//! [`RunnerEvent`]s and collecting diagnostics in a [`storage_contracts::Report`] tree.

pub mod config;
pub mod error;
pub mod jobs;
mod merge;
pub mod operations;
pub mod runner;
pub mod stack;

pub use config::{CONFIG_ENV, ConfigError, EngineConfig};
pub use error::{OperationError, Result};
pub use jobs::{Job, JobContext, JobProgress, JobStatus};
pub use operations::{
    BackupOperation, CheckOperation, CopyOperation, CreateFileSystemOperation,
    CreatePartitionTableOperation, DeleteOperation, NewOperation, Operation, OperationStatus,
    PendingOperation, ResizeOperation, ResizeVolumeGroupOperation, RestoreOperation,
    SetFileSystemLabelOperation, SetPartFlagsOperation, ShredAction,
};
pub use runner::{OperationRunner, RunnerEvent, RunnerHandle};
pub use stack::{OperationStack, PushOutcome, StackState};
