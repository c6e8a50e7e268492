use crate::{BookId, FileId};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// One physical file belonging to a [`Book`](crate::Book).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookFile {
    /// Zero until the file has been stored.
    pub id: FileId,
    /// Owning book; zero until stored.
    pub book_id: BookId,
    /// Extension without the leading dot (`"epub"`, `"mobi"`).
    pub extension: String,
    /// Where the file was imported from.
    pub original_filename: PathBuf,
    /// Location relative to the library root. Empty until the file is imported.
    pub current_filename: PathBuf,
    pub file_size: u64,
    /// Modification time of the source file at import.
    pub file_mtime: OffsetDateTime,
    /// Content hash of the file's bytes; unique across the library.
    pub hash: String,
    /// Where the file came from (a shop, a friend, a scan).
    pub source: Option<String>,
    pub tags: Vec<String>,
}
impl BookFile {
    pub fn new(
        original_filename: impl Into<PathBuf>,
        file_size: u64,
        file_mtime: OffsetDateTime,
        hash: impl Into<String>,
    ) -> Self {
        let original_filename = original_filename.into();
        Self {
            id: 0,
            book_id: 0,
            extension: Self::extension_of(&original_filename),
            original_filename,
            current_filename: PathBuf::new(),
            file_size,
            file_mtime,
            hash: hash.into(),
            source: None,
            tags: Vec::new(),
        }
    }

    pub fn with_extension(mut self, extension: impl AsRef<str>) -> Self {
        self.extension = extension.as_ref().trim().trim_start_matches('.').to_lowercase();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into()).filter(|s: &String| !s.trim().is_empty());
        self
    }

    pub fn with_tags<T: Into<String>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Lower-cased extension of a path, without the leading dot.
    pub fn extension_of(path: impl AsRef<Path>) -> String {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default()
    }
}
