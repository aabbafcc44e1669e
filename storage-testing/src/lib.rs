// SPDX-License-Identifier: GPL-3.0-only

//! Test doubles and a scenario harness for the operation engine
//!
//! [`MemoryBackend`] keeps each device as sparse bytes in memory and records every
//! partition table call; faults can be armed to make opens, commits, partition
//! creation or writes fail. [`MemoryFileSystemTools`] answers capability queries
//! from a table the test controls. [`scenario`] loads a TOML description of a
//! disk plus queued operations so whole runs can be replayed from the `harness`
//! binary.

pub mod backend;
pub mod errors;
pub mod fixtures;
pub mod scenario;
pub mod tools;

pub use backend::{BackendCall, MemoryBackend};
pub use errors::{Result, TestingError};
pub use tools::{MemoryFileSystemTools, ToolAction, ToolCall};
