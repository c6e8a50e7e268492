use crate::error::{Error, ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tome_model::{BookFile, BookId, FileId};

pub(crate) fn sqlx_hates_paths(path: impl AsRef<Path>) -> Result<String> {
    Ok(path.as_ref().to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string())
}

pub(crate) fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[derive(sqlx::FromRow)]
pub(crate) struct BookRow {
    pub id: BookId,
    pub series: Option<String>,
    pub title: String,
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    pub id: FileId,
    pub book_id: BookId,
    pub extension: String,
    pub original_filename: String,
    pub filename: String,
    pub file_size: i64,
    pub file_mtime: i64,
    pub hash: String,
    pub source: Option<String>,
}
impl TryFrom<&BookFile> for FileRow {
    type Error = Error;
    fn try_from(file: &BookFile) -> Result<Self> {
        Ok(Self {
            id: file.id,
            book_id: file.book_id,
            extension: file.extension.clone(),
            original_filename: sqlx_hates_paths(&file.original_filename)?,
            filename: sqlx_hates_paths(&file.current_filename)?,
            file_size: i64::try_from(file.file_size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            file_mtime: file.file_mtime.unix_timestamp(),
            hash: file.hash.clone(),
            source: file.source.clone(),
        })
    }
}
impl TryFrom<FileRow> for BookFile {
    type Error = Error;
    fn try_from(row: FileRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            book_id: row.book_id,
            extension: row.extension,
            original_filename: PathBuf::from(row.original_filename),
            current_filename: PathBuf::from(row.filename),
            file_size: u64::try_from(row.file_size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            file_mtime: OffsetDateTime::from_unix_timestamp(row.file_mtime)
                .or_raise(|| ErrorKind::InvalidData("file modification time"))?,
            hash: row.hash,
            source: row.source,
            // Loaded separately.
            tags: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_to_model() {
        let mtime = OffsetDateTime::now_utc();
        let row = FileRow {
            id: 3,
            book_id: 1,
            extension: "epub".to_string(),
            original_filename: "/downloads/the-shining.epub".to_string(),
            filename: "Stephen King/The Shining.epub".to_string(),
            file_size: 1024,
            file_mtime: mtime.unix_timestamp(),
            hash: "6f1b17063da8508541eb76dac260748a2d815c2c88b27cefb6205c90ae16fef5".to_string(),
            source: None,
        };
        let model = BookFile::try_from(row).unwrap();
        assert_eq!(model.current_filename, Path::new("Stephen King/The Shining.epub"));
        assert_eq!(model.file_size, 1024);
        // Converting to a Unix timestamp (measured in seconds) inherently strips the nanoseconds component.
        assert_eq!(model.file_mtime, mtime.replace_nanosecond(0).unwrap());
    }

    #[test]
    fn test_model_to_row() {
        let model = BookFile::new("/downloads/carrie.mobi", 2048, OffsetDateTime::now_utc(), "abc")
            .with_source("Humble Bundle");
        let row = FileRow::try_from(&model).unwrap();
        assert_eq!(row.extension, "mobi");
        assert_eq!(row.original_filename, "/downloads/carrie.mobi");
        assert_eq!(row.filename, "");
        assert_eq!(row.source.as_deref(), Some("Humble Bundle"));
    }

    #[test]
    fn test_file_size_out_of_range() {
        let model = BookFile::new("/huge.pdf", u64::MAX, OffsetDateTime::now_utc(), "abc");
        let err = FileRow::try_from(&model).err().unwrap();
        assert!(matches!(&*err, ErrorKind::InvalidData("file size")));
    }
}
