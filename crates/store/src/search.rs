//! Full-text search index maintenance.
//!
//! Each book has exactly one FTS4 document (`docid` = book id). Adding a file
//! to a book appends to the existing document. Anything that *removes* text
//! (deleting or moving files, merging books) throws the document away and
//! rebuilds it from the book's current files, since FTS4 offers no way to
//! subtract a term from a column.

use crate::Transaction;
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use tome_model::{Book, BookFile, BookId};

/// The text indexed for one book.
#[derive(Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct Document {
    /// Authors joined with `" & "`.
    pub author: String,
    pub series: Option<String>,
    pub title: String,
    /// Space separated.
    pub extension: String,
    /// Space separated.
    pub tags: String,
    /// Space separated library-relative paths.
    pub filename: String,
    /// Space separated.
    pub source: String,
}
impl Document {
    /// Build the complete document for a book from all of its files.
    ///
    /// Extensions are deduplicated; tags, filenames and sources are listed
    /// once per file.
    pub fn from_book(book: &Book) -> Self {
        let mut doc = Self {
            author: book.joined_authors(),
            series: book.series.clone(),
            title: book.title.clone(),
            ..Self::default()
        };
        let mut extensions: Vec<&str> = Vec::new();
        for file in &book.files {
            if !extensions.contains(&file.extension.as_str()) {
                extensions.push(&file.extension);
            }
            doc.append_file_text(file);
        }
        doc.extension = extensions.join(" ");
        doc
    }

    /// Add one file's tags, extension, filename and source to the document.
    pub fn append(&mut self, file: &BookFile) {
        push_words(&mut self.extension, [file.extension.as_str()]);
        self.append_file_text(file);
    }

    fn append_file_text(&mut self, file: &BookFile) {
        push_words(&mut self.tags, file.tags.iter().map(String::as_str));
        push_words(&mut self.filename, file.current_filename.to_str());
        push_words(&mut self.source, file.source.as_deref());
    }
}

fn push_words<'a>(field: &mut String, words: impl IntoIterator<Item = &'a str>) {
    for word in words.into_iter().map(str::trim).filter(|w| !w.is_empty()) {
        if !field.is_empty() {
            field.push(' ');
        }
        field.push_str(word);
    }
}

impl Transaction {
    /// Index a book that has no document yet.
    pub async fn insert_document(&mut self, book: &Book) -> Result<()> {
        let doc = Document::from_book(book);
        sqlx::query(include_str!("../queries/insert_document.sql"))
            .bind(book.id)
            .bind(doc.author)
            .bind(doc.series)
            .bind(doc.title)
            .bind(doc.extension)
            .bind(doc.tags)
            .bind(doc.filename)
            .bind(doc.source)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn document(&mut self, book_id: BookId) -> Result<Option<Document>> {
        sqlx::query_as(include_str!("../queries/select_document.sql"))
            .bind(book_id)
            .fetch_optional(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Add a newly imported file to its book's existing document.
    pub async fn append_to_document(&mut self, book_id: BookId, file: &BookFile) -> Result<()> {
        let mut doc = self.document(book_id).await?.ok_or_raise(|| ErrorKind::BookNotFound(book_id))?;
        doc.append(file);
        sqlx::query(include_str!("../queries/update_document_files.sql"))
            .bind(doc.extension)
            .bind(doc.tags)
            .bind(doc.filename)
            .bind(doc.source)
            .bind(book_id)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Replace a book's document with one built from its current files, or
    /// just remove it if the book no longer exists.
    pub async fn rebuild_document(&mut self, book_id: BookId) -> Result<()> {
        self.remove_documents(&[book_id]).await?;
        if let Some(book) = self.find_book_by_id(book_id).await? {
            self.insert_document(&book).await?;
        }
        Ok(())
    }

    /// Rewrite the title and author columns in place.
    pub async fn update_document_identity(&mut self, book_id: BookId, title: &str, authors: &[String]) -> Result<()> {
        sqlx::query(include_str!("../queries/update_document_identity.sql"))
            .bind(title)
            .bind(authors.join(tome_model::AUTHOR_SEPARATOR))
            .bind(book_id)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn update_document_series(&mut self, book_id: BookId, series: Option<&str>) -> Result<()> {
        sqlx::query(include_str!("../queries/update_document_series.sql"))
            .bind(series)
            .bind(book_id)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn remove_documents(&mut self, book_ids: &[BookId]) -> Result<()> {
        for &id in book_ids {
            sqlx::query(include_str!("../queries/delete_document.sql"))
                .bind(id)
                .execute(&mut *self.inner)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Ok(())
    }

    /// Ids of the books matching an FTS4 `MATCH` expression, in match order.
    ///
    /// `limit` of `None` returns every match and ignores `offset`. Values
    /// past what SQLite can bind are clamped to `i64::MAX`.
    pub async fn search(&mut self, terms: &str, limit: Option<u64>, offset: u64) -> Result<Vec<BookId>> {
        match limit {
            None => sqlx::query_scalar(include_str!("../queries/search.sql"))
                .bind(terms)
                .fetch_all(&mut *self.inner)
                .await
                .or_raise(|| ErrorKind::Database),
            Some(limit) => {
                let limit = i64::try_from(limit).unwrap_or(i64::MAX);
                let offset = i64::try_from(offset).unwrap_or(i64::MAX);
                sqlx::query_scalar(include_str!("../queries/search_paged.sql"))
                    .bind(terms)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&mut *self.inner)
                    .await
                    .or_raise(|| ErrorKind::Database)
            },
        }
    }
}
