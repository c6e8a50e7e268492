use crate::Library;
use crate::error::{ErrorKind, Result};
use tome_model::{Book, BookId};
use tracing::instrument;

impl Library {
    /// Change a book's title and authors, and its series when `update_series`
    /// is set. Files, tags and paths on disk are left alone.
    ///
    /// Repeated author names count once. Nothing is written when the stored
    /// book already matches. Authors that are no longer linked to any book
    /// afterwards are deleted.
    ///
    /// # Errors
    /// - [`NotFound`](ErrorKind::NotFound) if `book.id` does not exist.
    /// - [`BookExists`](ErrorKind::BookExists) if another book already has the
    ///   new title and authors.
    #[instrument(skip_all, fields(book_id = book.id))]
    pub async fn update(&self, book: &Book, update_series: bool) -> Result<()> {
        if book.title.trim().is_empty() {
            exn::bail!(ErrorKind::Validation("title must not be empty"));
        }
        let mut wanted = book.clone();
        wanted.dedup_authors();
        let book = &wanted;

        let mut tx = self.begin().await?;
        let current = tx.get_book(book.id).await.map_err(ErrorKind::store)?;

        let authors_changed = current.authors != book.authors;
        let series_changed = update_series && current.series != book.series;
        if current.is_identified_by(&book.title, &book.authors) && !series_changed {
            tracing::debug!("book unchanged");
            return Ok(());
        }

        if let Some(other) = tx.find_book(&book.title, &book.authors).await.map_err(ErrorKind::store)?
            && other != book.id
        {
            exn::bail!(ErrorKind::BookExists(other));
        }

        tx.update_book_title(book.id, &book.title).await.map_err(ErrorKind::store)?;
        if update_series {
            tx.update_book_series(book.id, book.series.as_deref()).await.map_err(ErrorKind::store)?;
        }
        let mut orphans = 0;
        if authors_changed {
            tx.unlink_authors(book.id).await.map_err(ErrorKind::store)?;
            tx.link_authors(book.id, &book.authors).await.map_err(ErrorKind::store)?;
            orphans = tx.delete_orphaned_authors().await.map_err(ErrorKind::store)?;
        }

        tx.update_document_identity(book.id, &book.title, &book.authors).await.map_err(ErrorKind::store)?;
        if update_series {
            tx.update_document_series(book.id, book.series.as_deref()).await.map_err(ErrorKind::store)?;
        }
        tx.commit().await.map_err(ErrorKind::store)?;
        tracing::info!(title = %book.title, authors_removed = orphans, "book updated");
        Ok(())
    }

    /// Fold several books into the first one.
    ///
    /// Every file of `ids[1..]` is moved (in the database; paths on disk do
    /// not change) to `ids[0]`, the absorbed books are deleted and the
    /// target's search document is rebuilt from its full set of files.
    /// Repeated ids are ignored. Authors left without a book are deleted.
    ///
    /// Returns the id of the surviving book.
    ///
    /// # Errors
    /// - [`Validation`](ErrorKind::Validation) for fewer than two distinct ids.
    /// - [`NotFound`](ErrorKind::NotFound) if any of the books does not exist.
    #[instrument(skip(self))]
    pub async fn merge(&self, ids: &[BookId]) -> Result<BookId> {
        let mut distinct: Vec<BookId> = Vec::with_capacity(ids.len());
        for &id in ids {
            if !distinct.contains(&id) {
                distinct.push(id);
            }
        }
        let (target, absorbed) = match distinct.as_slice() {
            [target, absorbed @ ..] if !absorbed.is_empty() => (*target, absorbed),
            _ => exn::bail!(ErrorKind::Validation("merge needs at least two books")),
        };

        let mut tx = self.begin().await?;
        for &id in &distinct {
            tx.get_book(id).await.map_err(ErrorKind::store)?;
        }
        let mut moved = 0;
        for &id in absorbed {
            moved += tx.reassign_files(id, target).await.map_err(ErrorKind::store)?;
            tx.delete_book(id).await.map_err(ErrorKind::store)?;
        }
        tx.remove_documents(absorbed).await.map_err(ErrorKind::store)?;
        tx.rebuild_document(target).await.map_err(ErrorKind::store)?;
        let orphans = tx.delete_orphaned_authors().await.map_err(ErrorKind::store)?;
        tx.commit().await.map_err(ErrorKind::store)?;
        tracing::info!(book_id = target, files_moved = moved, authors_removed = orphans, "books merged");
        Ok(target)
    }
}
