// SPDX-License-Identifier: GPL-3.0-only

pub mod error;
pub mod report;

pub use error::{StorageError, StorageErrorKind};
pub use report::Report;
