//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt storage, read invalid line {line} [{content}]: {reason}")]
    Corrupt {
        line: usize,
        content: String,
        reason: String,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),
}
