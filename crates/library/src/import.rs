use crate::error::{ErrorKind, Result};
use crate::filename::{self, Candidate};
use crate::{Library, PathGenerator};
use exn::ResultExt;
use tome_model::Book;
use tome_storage::Transfer;
use tracing::instrument;

impl Library {
    /// Bring a single file into the library.
    ///
    /// `book` must carry exactly one file whose `original_filename` is the
    /// absolute path of the source. The file joins the existing book with the
    /// same title and authors (in the same order) or a new book is created
    /// for it; repeated author names count once. Its destination is rendered
    /// from `template` and made unique, and the source is moved or copied
    /// there as `transfer` asks.
    ///
    /// Returns `book` as stored: its id, and its one file with id, book id
    /// and library-relative `current_filename` filled in.
    ///
    /// # Errors
    /// - [`Validation`](ErrorKind::Validation) when there is not exactly one
    ///   file or the title is blank.
    /// - [`Duplicate`](ErrorKind::Duplicate) with the owning book's id when a
    ///   file with the same content hash is already in the library. Nothing
    ///   is written in that case.
    #[instrument(skip_all, fields(title = %book.title, transfer = %transfer))]
    pub async fn import(&self, mut book: Book, template: &PathGenerator, transfer: Transfer) -> Result<Book> {
        if book.files.len() != 1 {
            exn::bail!(ErrorKind::Validation("import takes exactly one file"));
        }
        if book.title.trim().is_empty() {
            exn::bail!(ErrorKind::Validation("title must not be empty"));
        }
        let mut file = book.files.remove(0);
        book.dedup_authors();

        let mut tx = self.begin().await?;
        if let Some(existing) = tx.book_id_by_hash(&file.hash).await.map_err(ErrorKind::store)? {
            tracing::info!(book_id = existing, hash = %file.hash, "duplicate file");
            exn::bail!(ErrorKind::Duplicate(existing));
        }

        let existing = tx.find_book(&book.title, &book.authors).await.map_err(ErrorKind::store)?;
        book.id = match existing {
            Some(id) => id,
            None => {
                let id = tx.insert_book(&book.title, book.series.as_deref()).await.map_err(ErrorKind::store)?;
                tx.link_authors(id, &book.authors).await.map_err(ErrorKind::store)?;
                id
            },
        };

        let rendered = template.generate(&book, &file)?;
        let candidate = Candidate::new(&rendered, &file.extension)?;
        file.current_filename = filename::resolve(&mut tx, &self.root, &candidate).await?;
        file.book_id = book.id;
        file.id = tx.insert_file(book.id, &file).await.map_err(ErrorKind::store)?;
        tx.link_tags(file.id, &file.tags).await.map_err(ErrorKind::store)?;

        let source = file.original_filename.clone();
        let destination = file.current_filename.clone();
        match existing {
            Some(book_id) => {
                tx.append_to_document(book_id, &file).await.map_err(ErrorKind::store)?;
                book.files.push(file);
            },
            None => {
                book.files.push(file);
                tx.insert_document(&book).await.map_err(ErrorKind::store)?;
            },
        }

        self.root.transfer(&source, &destination, transfer).await.or_raise(|| ErrorKind::Filesystem)?;
        tx.commit().await.map_err(ErrorKind::store)?;
        tracing::info!(
            book_id = book.id,
            new_book = existing.is_none(),
            destination = %destination.display(),
            "imported",
        );
        Ok(book)
    }
}
