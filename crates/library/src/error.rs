//! Library Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Errors from the store and storage crates are kept as
//! children in the tree.

use derive_more::{Display, Error};
use tome_model::BookId;
use tome_store::error::Error as StoreError;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong, from the caller's point of view.
///
/// ### Conditions a batch import can report and skip
/// - [`ErrorKind::Duplicate`]
/// - [`ErrorKind::BookExists`]
///
/// ### Caller errors
/// - [`ErrorKind::Validation`]
/// - [`ErrorKind::NotFound`]
///
/// ### Operational errors
/// - [`ErrorKind::Store`], [`ErrorKind::Filesystem`], [`ErrorKind::Template`],
///   [`ErrorKind::Path`], [`ErrorKind::Converter`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The request itself is malformed.
    #[display("invalid request: {_0}")]
    Validation(#[error(not(source))] &'static str),
    /// A file with the same content hash is already in the library.
    #[display("a duplicate file already exists in book {_0}")]
    Duplicate(#[error(not(source))] BookId),
    /// Another book already has the requested title and authors.
    #[display("book {_0} already has that title and those authors")]
    BookExists(#[error(not(source))] BookId),
    /// The book, file or filename asked for does not exist.
    #[display("not found")]
    NotFound,
    #[display("metadata store error")]
    Store,
    #[display("filesystem error")]
    Filesystem,
    /// The output template could not be compiled or rendered.
    #[display("issue with path generation from template")]
    Template,
    /// No valid, free destination path could be built.
    #[display("could not build a destination path")]
    Path,
    /// The external converter is missing or failed.
    #[display("ebook conversion failed")]
    Converter,
}

impl ErrorKind {
    /// Wrap a store error, keeping it as a child of the new error. Store
    /// not-found errors become [`ErrorKind::NotFound`].
    #[track_caller]
    pub(crate) fn store(err: StoreError) -> Error {
        let kind = match err.is_not_found() {
            true => ErrorKind::NotFound,
            false => ErrorKind::Store,
        };
        err.raise(kind)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store)
    }

    /// Returns `true` for conflicts with existing library content, which
    /// batch callers usually report and move past.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Duplicate(_) | Self::BookExists(_))
    }
}
