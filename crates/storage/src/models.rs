use derive_more::Display;
use std::path::PathBuf;
use time::OffsetDateTime;

/// Facts about a source file gathered before it is imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
    /// BLAKE3 hash of the file content, hex encoded
    pub file_hash: String,
}

/// How a file is brought into the library.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transfer {
    /// Source is removed once the file is in place.
    #[default]
    #[display("move")]
    Move,
    /// Source is left untouched.
    #[display("copy")]
    Copy,
}

/// What actually happened during a [`Transfer`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Transferred {
    /// Atomic rename; source and destination share a filesystem.
    #[display("renamed")]
    Renamed,
    /// Rename failed, so the file was copied and the source removed (or at
    /// least an attempt was made; see the warning log).
    #[display("copied and deleted")]
    CopiedAndDeleted,
    #[display("copied")]
    Copied,
}
