// SPDX-License-Identifier: GPL-3.0-only

//! Raw block I/O for the storage operation engine
//!
//! This crate moves bytes and nothing else:
//! - Copying a byte range between devices, image files and synthetic streams
//! - Choosing a copy direction that is safe for overlapping regions
//! - Rolling back a partially completed copy
//!
//! Device access goes through the backend from `storage-contracts`; image files
//! are opened directly.

pub mod copy;
pub mod error;
pub mod image;
pub mod progress;

pub use copy::{
    CopyProgress, CopySource, CopySourceDevice, CopySourceFile, CopySourceShred, CopyTarget,
    CopyTargetDevice, CopyTargetFile, DEFAULT_BLOCK_SIZE, ShredPattern, copy_blocks,
    rollback_copy_blocks,
};
pub use error::{Result, SysError};
