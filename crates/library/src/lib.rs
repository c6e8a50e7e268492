//! The ebook library engine.
//!
//! A [`Library`] ties together the metadata [store](tome_store), the books
//! directory on disk ([`LibraryRoot`]) and a per-library conversion cache.
//! Every mutating operation runs in exactly one database transaction, so a
//! failure part way through leaves the tables (books, files, authors, tags and
//! the search index) as they were. The one exception is the removal of a file
//! from disk while deleting it, which cannot be undone.
//!
//! ```no_run
//! use tome_library::{Library, PathGenerator, Transfer};
//! use tome_model::{Book, BookFile};
//! # async fn run() -> tome_library::error::Result<()> {
//! let library = Library::open("/books/library.db", "/books").await?;
//! let template: PathGenerator = "{{ author }}/{{ title }}".parse()?;
//!
//! let info = tome_storage::inspect("/downloads/the-shining.epub").await.unwrap();
//! let file = BookFile::new(info.path, info.size, info.modified, info.file_hash);
//! let book = Book::new("The Shining", ["Stephen King"]).with_file(file);
//! let stored = library.import(book, &template, Transfer::Move).await?;
//!
//! let found = library.search("author:King").await?;
//! assert!(found.iter().any(|b| b.id == stored.id));
//! # Ok(())
//! # }
//! ```

mod converter;
mod delete;
pub mod error;
mod filename;
mod import;
mod lookup;
mod search;
mod template;
mod update;

pub use crate::filename::{Candidate, MAX_COMPONENT_BYTES, MAX_DISAMBIGUATOR};
pub use crate::search::SearchResults;
pub use crate::template::{DEFAULT_TEMPLATE, PathGenerator};
pub use tome_storage::{Transfer, Transferred};

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tome_config::Config;
use tome_storage::LibraryRoot;
use tome_store::Database;
use tracing::instrument;

/// Directory, next to the database file, holding converted copies of books.
const CACHE_DIR: &str = "cache";

pub struct Library {
    db: Database,
    root: LibraryRoot,
    cache_dir: PathBuf,
}
impl Library {
    /// Assemble a library from an already connected database and root.
    ///
    /// Converted files are cached in `cache/` beside the database file, or in
    /// `.cache/` under the books root when the database has no file.
    pub fn new(db: Database, root: LibraryRoot) -> Self {
        let cache_dir = match db.path().and_then(Path::parent) {
            Some(dir) => dir.join(CACHE_DIR),
            None => root.path().join(format!(".{CACHE_DIR}")),
        };
        Self { db, root, cache_dir }
    }

    /// Initialize a new library database and open the books root.
    ///
    /// The books root is only created once the database is, so a failed
    /// create leaves no directory behind.
    #[instrument(skip_all, fields(database = %database.as_ref().display()))]
    pub async fn create(database: impl AsRef<Path>, books_root: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(database).await.map_err(ErrorKind::store)?;
        let root = Self::open_root(&db, books_root).await?;
        tracing::info!(root = %root.path().display(), "library created");
        Ok(Self::new(db, root))
    }

    /// Open an existing library.
    #[instrument(skip_all, fields(database = %database.as_ref().display()))]
    pub async fn open(database: impl AsRef<Path>, books_root: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open(database).await.map_err(ErrorKind::store)?;
        let root = Self::open_root(&db, books_root).await?;
        Ok(Self::new(db, root))
    }

    async fn open_root(db: &Database, books_root: impl AsRef<Path>) -> Result<LibraryRoot> {
        match LibraryRoot::new(books_root) {
            Ok(root) => Ok(root),
            Err(err) => {
                db.close().await;
                Err(err.raise(ErrorKind::Filesystem))
            },
        }
    }

    /// Open the configured library, creating it the first time.
    pub async fn from_config(config: &Config) -> Result<Self> {
        match config.database.is_file() {
            true => Self::open(&config.database, &config.books_root).await,
            false => {
                if let Some(parent) = config.database.parent() {
                    tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Filesystem)?;
                }
                Self::create(&config.database, &config.books_root).await
            },
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn root(&self) -> &LibraryRoot {
        &self.root
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Close the database connections.
    pub async fn close(&self) {
        self.db.close().await;
    }

    async fn begin(&self) -> Result<tome_store::Transaction> {
        self.db.begin().await.map_err(ErrorKind::store)
    }
}
