//! Store Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;
use tome_model::{BookId, FileId};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// The not-found kinds are only ever raised by lookups that were asked for a
/// specific row; they are never used to report a failing query.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// `create` was pointed at a database that already holds a library.
    #[display("library database already initialized")]
    AlreadyInitialized,
    /// `open` was pointed at a file that does not hold a library.
    #[display("library database not initialized")]
    NotInitialized,
    #[display("book not found: {_0}")]
    BookNotFound(#[error(not(source))] BookId),
    #[display("file not found: {_0}")]
    FileNotFound(#[error(not(source))] FileId),
    #[display("no file with filename: {}", _0.display())]
    FilenameNotFound(#[error(not(source))] PathBuf),
    /// A value could not be converted to or from its stored form.
    #[display("invalid data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BookNotFound(_) | Self::FileNotFound(_) | Self::FilenameNotFound(_))
    }
}
