//! Relational primitives, all scoped to one transaction.
//!
//! Nothing here decides *when* to cascade, clean up, or reindex; the library
//! composes these in the order each operation needs.

use crate::error::{ErrorKind, Result};
use crate::models::{BookRow, FileRow, now, sqlx_hates_paths};
use exn::{OptionExt, ResultExt};
use sqlx::Sqlite;
use std::path::Path;
use tome_model::{Book, BookFile, BookId, FileId};

/// An open SQLite transaction.
///
/// Dropping it without calling [`commit`](Self::commit) rolls back every
/// change made through it.
pub struct Transaction {
    pub(crate) inner: sqlx::Transaction<'static, Sqlite>,
}
impl Transaction {
    pub(crate) fn new(inner: sqlx::Transaction<'static, Sqlite>) -> Self {
        Self { inner }
    }

    pub async fn commit(self) -> Result<()> {
        self.inner.commit().await.or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Books
    // =========================================================================

    /// Find the book with exactly this title and exactly these authors, in this order.
    pub async fn find_book(&mut self, title: &str, authors: &[String]) -> Result<Option<BookId>> {
        let candidates: Vec<BookId> = sqlx::query_scalar(include_str!("../queries/book_ids_by_title.sql"))
            .bind(title)
            .fetch_all(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for id in candidates {
            if self.authors_for_book(id).await? == authors {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    pub async fn insert_book(&mut self, title: &str, series: Option<&str>) -> Result<BookId> {
        let now = now();
        let result = sqlx::query(include_str!("../queries/insert_book.sql"))
            .bind(now)
            .bind(now)
            .bind(series)
            .bind(title)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update_book_title(&mut self, id: BookId, title: &str) -> Result<()> {
        sqlx::query(include_str!("../queries/update_book_title.sql"))
            .bind(now())
            .bind(title)
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn update_book_series(&mut self, id: BookId, series: Option<&str>) -> Result<()> {
        sqlx::query(include_str!("../queries/update_book_series.sql"))
            .bind(now())
            .bind(series)
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Delete a book. Its files and author links go with it.
    pub async fn delete_book(&mut self, id: BookId) -> Result<()> {
        sqlx::query(include_str!("../queries/delete_book.sql"))
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Load a book with its authors, files and their tags.
    pub async fn get_book(&mut self, id: BookId) -> Result<Book> {
        self.find_book_by_id(id).await?.ok_or_raise(|| ErrorKind::BookNotFound(id))
    }

    /// Load books in the order given. Unknown ids are skipped.
    pub async fn get_books(&mut self, ids: &[BookId]) -> Result<Vec<Book>> {
        let mut books = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(book) = self.find_book_by_id(id).await? {
                books.push(book);
            }
        }
        Ok(books)
    }

    pub(crate) async fn find_book_by_id(&mut self, id: BookId) -> Result<Option<Book>> {
        let row: Option<BookRow> = sqlx::query_as(include_str!("../queries/select_book.sql"))
            .bind(id)
            .fetch_optional(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Book {
            id: row.id,
            title: row.title,
            series: row.series,
            authors: self.authors_for_book(id).await?,
            files: self.files_for_book(id).await?,
        }))
    }

    // =========================================================================
    // Authors
    // =========================================================================

    /// Author names of a book in display order.
    pub async fn authors_for_book(&mut self, book_id: BookId) -> Result<Vec<String>> {
        sqlx::query_scalar(include_str!("../queries/select_authors_for_book.sql"))
            .bind(book_id)
            .fetch_all(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Find or create each author and link it to the book, preserving order.
    /// Repeated names collapse into one link.
    pub async fn link_authors(&mut self, book_id: BookId, authors: &[String]) -> Result<()> {
        for name in authors {
            let now = now();
            sqlx::query(include_str!("../queries/insert_author.sql"))
                .bind(now)
                .bind(now)
                .bind(name)
                .execute(&mut *self.inner)
                .await
                .or_raise(|| ErrorKind::Database)?;
            let author_id: i64 = sqlx::query_scalar(include_str!("../queries/author_id_by_name.sql"))
                .bind(name)
                .fetch_one(&mut *self.inner)
                .await
                .or_raise(|| ErrorKind::Database)?;
            sqlx::query(include_str!("../queries/link_author.sql"))
                .bind(now)
                .bind(now)
                .bind(book_id)
                .bind(author_id)
                .execute(&mut *self.inner)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Ok(())
    }

    pub async fn unlink_authors(&mut self, book_id: BookId) -> Result<()> {
        sqlx::query(include_str!("../queries/unlink_authors.sql"))
            .bind(book_id)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Delete the authors whose only book is `book_id`. Must run before the
    /// book (and with it the links) is deleted.
    pub async fn delete_sole_authors(&mut self, book_id: BookId) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/delete_sole_authors.sql"))
            .bind(book_id)
            .bind(book_id)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    /// Delete every author with no remaining book.
    pub async fn delete_orphaned_authors(&mut self) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/delete_orphaned_authors.sql"))
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Book owning the file with this content hash, if any.
    pub async fn book_id_by_hash(&mut self, hash: &str) -> Result<Option<BookId>> {
        sqlx::query_scalar(include_str!("../queries/book_id_by_hash.sql"))
            .bind(hash)
            .fetch_optional(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Insert a file row under `book_id` using the file's `current_filename`.
    /// Tags are linked separately with [`link_tags`](Self::link_tags).
    pub async fn insert_file(&mut self, book_id: BookId, file: &BookFile) -> Result<FileId> {
        let row = FileRow::try_from(file)?;
        let now = now();
        let result = sqlx::query(include_str!("../queries/insert_file.sql"))
            .bind(now)
            .bind(now)
            .bind(book_id)
            .bind(row.extension)
            .bind(row.original_filename)
            .bind(row.filename)
            .bind(row.file_size)
            .bind(row.file_mtime)
            .bind(row.hash)
            .bind(row.source)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_file(&mut self, id: FileId) -> Result<BookFile> {
        self.find_file_by_id(id).await?.ok_or_raise(|| ErrorKind::FileNotFound(id))
    }

    /// Load files in the order given. Unknown ids are skipped.
    pub async fn get_files(&mut self, ids: &[FileId]) -> Result<Vec<BookFile>> {
        let mut files = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(file) = self.find_file_by_id(id).await? {
                files.push(file);
            }
        }
        Ok(files)
    }

    async fn find_file_by_id(&mut self, id: FileId) -> Result<Option<BookFile>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/select_file.sql"))
            .bind(id)
            .fetch_optional(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => {
                let mut file = BookFile::try_from(row)?;
                file.tags = self.tags_for_file(id).await?;
                Ok(Some(file))
            },
            None => Ok(None),
        }
    }

    /// Files of a book, oldest first, with their tags.
    pub async fn files_for_book(&mut self, book_id: BookId) -> Result<Vec<BookFile>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/select_files_for_book.sql"))
            .bind(book_id)
            .fetch_all(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut files = Vec::with_capacity(rows.len());
        for row in rows {
            let mut file = BookFile::try_from(row)?;
            file.tags = self.tags_for_file(file.id).await?;
            files.push(file);
        }
        Ok(files)
    }

    pub async fn count_files(&mut self, book_id: BookId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_files_for_book.sql"))
            .bind(book_id)
            .fetch_one(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("file count"))
    }

    /// Whether a file row already claims this library-relative filename,
    /// including rows written earlier in this same transaction.
    pub async fn filename_exists(&mut self, filename: impl AsRef<Path>) -> Result<bool> {
        sqlx::query_scalar(include_str!("../queries/filename_exists.sql"))
            .bind(sqlx_hates_paths(filename)?)
            .fetch_one(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    pub async fn file_id_by_filename(&mut self, filename: impl AsRef<Path>) -> Result<FileId> {
        let filename = filename.as_ref();
        let id: Option<FileId> = sqlx::query_scalar(include_str!("../queries/file_id_by_filename.sql"))
            .bind(sqlx_hates_paths(filename)?)
            .fetch_optional(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        id.ok_or_raise(|| ErrorKind::FilenameNotFound(filename.to_path_buf()))
    }

    pub async fn book_id_by_filename(&mut self, filename: impl AsRef<Path>) -> Result<BookId> {
        let filename = filename.as_ref();
        let id: Option<BookId> = sqlx::query_scalar(include_str!("../queries/book_id_by_filename.sql"))
            .bind(sqlx_hates_paths(filename)?)
            .fetch_optional(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        id.ok_or_raise(|| ErrorKind::FilenameNotFound(filename.to_path_buf()))
    }

    /// Move every file of book `from` to book `to`.
    pub async fn reassign_files(&mut self, from: BookId, to: BookId) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/reassign_files.sql"))
            .bind(now())
            .bind(to)
            .bind(from)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    /// Delete a file row. Its tag links go with it; the tags themselves do not.
    pub async fn delete_file(&mut self, id: FileId) -> Result<()> {
        sqlx::query(include_str!("../queries/delete_file.sql"))
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // Tags
    // =========================================================================

    pub async fn tags_for_file(&mut self, file_id: FileId) -> Result<Vec<String>> {
        sqlx::query_scalar(include_str!("../queries/select_tags_for_file.sql"))
            .bind(file_id)
            .fetch_all(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Find or create each tag and link it to the file.
    pub async fn link_tags(&mut self, file_id: FileId, tags: &[String]) -> Result<()> {
        for name in tags {
            let now = now();
            sqlx::query(include_str!("../queries/insert_tag.sql"))
                .bind(now)
                .bind(now)
                .bind(name)
                .execute(&mut *self.inner)
                .await
                .or_raise(|| ErrorKind::Database)?;
            let tag_id: i64 = sqlx::query_scalar(include_str!("../queries/tag_id_by_name.sql"))
                .bind(name)
                .fetch_one(&mut *self.inner)
                .await
                .or_raise(|| ErrorKind::Database)?;
            sqlx::query(include_str!("../queries/link_tag.sql"))
                .bind(now)
                .bind(now)
                .bind(file_id)
                .bind(tag_id)
                .execute(&mut *self.inner)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Ok(())
    }

    /// Delete the tags whose only file is `file_id`. Must run before the file
    /// row (and with it the links) is deleted.
    pub async fn cleanup_tags(&mut self, file_id: FileId) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/cleanup_tags.sql"))
            .bind(file_id)
            .bind(file_id)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }
}
