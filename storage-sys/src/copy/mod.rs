// SPDX-License-Identifier: GPL-3.0-only

//! Block copies between devices, image files and synthetic streams

pub mod engine;
pub mod source;
pub mod target;

pub use engine::{CopyProgress, DEFAULT_BLOCK_SIZE, copy_blocks, rollback_copy_blocks};
pub use source::{CopySource, CopySourceDevice, CopySourceFile, CopySourceShred, ShredPattern};
pub use target::{CopyTarget, CopyTargetDevice, CopyTargetFile};
