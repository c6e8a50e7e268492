use crate::Library;
use crate::error::{ErrorKind, Result};
use std::path::Path;
use tome_model::{Book, BookFile, BookId, FileId};

impl Library {
    /// Books with the given ids, in that order. Unknown ids are skipped.
    pub async fn get_books_by_id(&self, ids: &[BookId]) -> Result<Vec<Book>> {
        let mut tx = self.begin().await?;
        let books = tx.get_books(ids).await.map_err(ErrorKind::store)?;
        tx.commit().await.map_err(ErrorKind::store)?;
        Ok(books)
    }

    /// Files with the given ids, in that order. Unknown ids are skipped.
    pub async fn get_files_by_id(&self, ids: &[FileId]) -> Result<Vec<BookFile>> {
        let mut tx = self.begin().await?;
        let files = tx.get_files(ids).await.map_err(ErrorKind::store)?;
        tx.commit().await.map_err(ErrorKind::store)?;
        Ok(files)
    }

    /// The book with exactly this title and these authors, in this order.
    pub async fn get_book_id_by_title_and_authors(&self, title: &str, authors: &[String]) -> Result<Option<BookId>> {
        let mut tx = self.begin().await?;
        let id = tx.find_book(title, authors).await.map_err(ErrorKind::store)?;
        tx.commit().await.map_err(ErrorKind::store)?;
        Ok(id)
    }

    /// # Errors
    /// [`NotFound`](ErrorKind::NotFound) if no file has this library-relative path.
    pub async fn get_file_id_by_filename(&self, filename: impl AsRef<Path>) -> Result<FileId> {
        let mut tx = self.begin().await?;
        let id = tx.file_id_by_filename(filename).await.map_err(ErrorKind::store)?;
        tx.commit().await.map_err(ErrorKind::store)?;
        Ok(id)
    }

    /// # Errors
    /// [`NotFound`](ErrorKind::NotFound) if no file has this library-relative path.
    pub async fn get_book_id_by_filename(&self, filename: impl AsRef<Path>) -> Result<BookId> {
        let mut tx = self.begin().await?;
        let id = tx.book_id_by_filename(filename).await.map_err(ErrorKind::store)?;
        tx.commit().await.map_err(ErrorKind::store)?;
        Ok(id)
    }
}
