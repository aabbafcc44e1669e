// SPDX-License-Identifier: GPL-3.0-only

pub mod backend;
pub mod filesystem;

pub use backend::{BackendDevice, BackendPartitionTable, CoreBackend};
pub use filesystem::FileSystemTools;
