// SPDX-License-Identifier: GPL-3.0-only

//! Contracts between the operation engine and its collaborators
//!
//! The engine never talks to devices itself. It goes through a [`CoreBackend`]
//! for partition-table edits and raw block I/O, and through [`FileSystemTools`]
//! for anything file-system specific. Results come back as
//! `Result<_, StorageError>` while human-readable diagnostics accumulate in a
//! [`Report`].

pub mod protocol;
pub mod traits;

pub use protocol::{Report, StorageError, StorageErrorKind};
pub use traits::{BackendDevice, BackendPartitionTable, CoreBackend, FileSystemTools};
