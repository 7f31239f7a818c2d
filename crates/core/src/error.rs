// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for td-core operations.

use thiserror::Error;

/// All possible errors that can occur in td-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid run: '{0}'\n  hint: runs are encoded as r<count>, d<text> or i<text>")]
    InvalidRun(String),

    #[error("deleted text mismatch at offset {offset}: expected {expected:?}, got {actual:?}")]
    DeleteMismatch {
        offset: usize,
        expected: String,
        actual: String,
    },

    #[error("length mismatch: runs consume {consumed} characters but the base text has {base}")]
    LengthMismatch { consumed: usize, base: usize },

    #[error("unknown document: {0}")]
    UnknownDocument(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for td-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
