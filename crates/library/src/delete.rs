use crate::Library;
use crate::error::{ErrorKind, Result};
use tome_model::{BookId, FileId};
use tome_store::Transaction;
use tracing::instrument;

impl Library {
    /// Delete a file from the library and from disk.
    ///
    /// Tags used only by this file are deleted with it. When it was the last
    /// file of its book, the book goes too, along with any author who wrote
    /// nothing else. The book's search document is rebuilt from whatever
    /// files remain.
    ///
    /// Removing the file from disk is best effort: a failure is logged and the
    /// metadata is deleted regardless. Conversely, once the file is gone from
    /// disk it stays gone even if the transaction later fails.
    #[instrument(skip(self))]
    pub async fn delete_file(&self, file_id: FileId) -> Result<()> {
        let mut tx = self.begin().await?;
        self.delete_file_in(&mut tx, file_id).await?;
        tx.commit().await.map_err(ErrorKind::store)?;
        Ok(())
    }

    /// Delete a book by deleting each of its files; the last one takes the
    /// book with it. All in one transaction.
    #[instrument(skip(self))]
    pub async fn delete_book(&self, book_id: BookId) -> Result<()> {
        let mut tx = self.begin().await?;
        let book = tx.get_book(book_id).await.map_err(ErrorKind::store)?;
        if book.files.is_empty() {
            // Not reachable through the library's own operations, but a book
            // without files would otherwise never be deleted.
            delete_book_row(&mut tx, book_id).await?;
            tx.rebuild_document(book_id).await.map_err(ErrorKind::store)?;
        }
        for file in &book.files {
            self.delete_file_in(&mut tx, file.id).await?;
        }
        tx.commit().await.map_err(ErrorKind::store)?;
        tracing::info!(title = %book.title, files = book.files.len(), "book deleted");
        Ok(())
    }

    /// Whether `file_id` is the only file of its book, which means deleting
    /// it deletes the book as well.
    pub async fn is_last_file(&self, file_id: FileId) -> Result<bool> {
        let mut tx = self.begin().await?;
        let file = tx.get_file(file_id).await.map_err(ErrorKind::store)?;
        let count = tx.count_files(file.book_id).await.map_err(ErrorKind::store)?;
        tx.commit().await.map_err(ErrorKind::store)?;
        Ok(count <= 1)
    }

    async fn delete_file_in(&self, tx: &mut Transaction, file_id: FileId) -> Result<()> {
        let file = tx.get_file(file_id).await.map_err(ErrorKind::store)?;
        let is_last = tx.count_files(file.book_id).await.map_err(ErrorKind::store)? <= 1;

        let tags = tx.cleanup_tags(file_id).await.map_err(ErrorKind::store)?;
        tx.delete_file(file_id).await.map_err(ErrorKind::store)?;
        if let Err(err) = self.root.delete(&file.current_filename).await {
            tracing::warn!(path = %file.current_filename.display(), error = %err, "could not delete file from disk");
        }
        if is_last {
            delete_book_row(tx, file.book_id).await?;
        }
        tx.rebuild_document(file.book_id).await.map_err(ErrorKind::store)?;
        tracing::info!(
            file_id,
            book_id = file.book_id,
            book_deleted = is_last,
            tags_removed = tags,
            path = %file.current_filename.display(),
            "file deleted",
        );
        Ok(())
    }
}

/// Delete a book along with the authors who have no other book. The author
/// cleanup has to come first; it counts the links this book still holds.
async fn delete_book_row(tx: &mut Transaction, book_id: BookId) -> Result<()> {
    let authors = tx.delete_sole_authors(book_id).await.map_err(ErrorKind::store)?;
    tx.delete_book(book_id).await.map_err(ErrorKind::store)?;
    tracing::debug!(book_id, authors_removed = authors, "book row deleted");
    Ok(())
}
