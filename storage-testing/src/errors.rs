// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use storage_ops::{ConfigError, OperationError};
use storage_types::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TestingError {
    #[error("scenario not found: {path:?}")]
    ScenarioNotFound { path: PathBuf },
    #[error("invalid scenario '{name}': {reason}")]
    ScenarioInvalid { name: String, reason: String },
    #[error("operation {index} of scenario '{name}' refers to partition {number}, which does not exist")]
    UnknownPartition {
        name: String,
        index: usize,
        number: u32,
    },
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Operation(#[from] OperationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, TestingError>;
