//! Value records passed into and returned from library operations.
//!
//! A [`Book`] is a logical work, identified by its title and the *ordered*
//! list of its authors. Each physical file (one format or edition of the
//! work) is a [`BookFile`] owned by exactly one book. Neither type holds a
//! connection or any other long-lived handle; they are plain data.

mod book;
mod file;

pub use crate::book::Book;
pub use crate::file::BookFile;

/// Surrogate key of a row in the `books` table.
pub type BookId = i64;
/// Surrogate key of a row in the `files` table.
pub type FileId = i64;

/// Separator used whenever an ordered author list is flattened to one string.
pub const AUTHOR_SEPARATOR: &str = " & ";
