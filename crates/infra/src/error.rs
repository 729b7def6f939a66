use thiserror::Error;

use bookshelf_auth::TokenError;
use bookshelf_core::PaginationError;

/// Failure of a store operation.
///
/// `NotFound`, `EditConflict`, `DuplicateEmail` and `InvalidSort` are expected
/// outcomes the caller maps to a specific response. `Timeout`, `Storage` and
/// `Token` are server faults: log them, never show their detail to a client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// The conditional update matched no row at the expected version.
    #[error("edit conflict")]
    EditConflict,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error(transparent)]
    InvalidSort(#[from] PaginationError),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("storage error in {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl StoreError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }
}
