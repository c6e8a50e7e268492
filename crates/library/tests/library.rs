use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tome_library::error::ErrorKind;
use tome_library::{DEFAULT_TEMPLATE, Library, PathGenerator, Transfer};
use tome_model::{Book, BookFile, BookId};

struct Fixture {
    dir: TempDir,
    library: Library,
    template: PathGenerator,
}
impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("downloads")).unwrap();
        let library = Library::create(dir.path().join("library.db"), dir.path().join("books")).await.unwrap();
        Self { dir, library, template: DEFAULT_TEMPLATE.parse().unwrap() }
    }

    fn books_root(&self) -> &Path {
        self.library.root().path()
    }

    fn download(&self, name: &str) -> PathBuf {
        self.dir.path().join("downloads").join(name)
    }

    /// Write a source file and describe it as a single-file book.
    async fn record(&self, name: &str, content: &str, title: &str, authors: &[&str]) -> Book {
        let path = self.download(name);
        std::fs::write(&path, content).unwrap();
        let info = tome_storage::inspect(&path).await.unwrap();
        let file = BookFile::new(info.path, info.size, info.modified, info.file_hash);
        Book::new(title, authors.iter().copied()).with_file(file)
    }

    async fn import(&self, name: &str, content: &str, title: &str, authors: &[&str]) -> Book {
        let book = self.record(name, content, title, authors).await;
        self.library.import(book, &self.template, Transfer::Move).await.unwrap()
    }

    async fn count(&self, table: &str) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        sqlx::query_scalar(&sql).fetch_one(self.library.database().pool()).await.unwrap()
    }

    async fn document(&self, book_id: BookId) -> Option<tome_store::search::Document> {
        let mut tx = self.library.database().begin().await.unwrap();
        tx.document(book_id).await.unwrap()
    }

    async fn search_ids(&self, terms: &str) -> Vec<BookId> {
        self.library.search(terms).await.unwrap().into_iter().map(|b| b.id).collect()
    }
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn test_shining_end_to_end() {
    let fx = Fixture::new().await;

    let a = fx.import("shining.epub", "first edition", "The Shining", &["Stephen King"]).await;
    let file_a = &a.files[0];
    assert_ne!(a.id, 0);
    assert_eq!(file_a.book_id, a.id);
    assert_eq!(file_a.current_filename, Path::new("Stephen King/The Shining.epub"));
    assert!(fx.books_root().join(&file_a.current_filename).is_file());
    assert!(!fx.download("shining.epub").exists());
    let doc = fx.document(a.id).await.unwrap();
    assert_eq!(doc.author, "Stephen King");
    assert_eq!(doc.title, "The Shining");

    let b = fx.import("shining.mobi", "second edition", "The Shining", &["Stephen King"]).await;
    let file_b = &b.files[0];
    assert_eq!(b.id, a.id);
    assert_eq!(fx.count("books").await, 1);
    assert_eq!(fx.count("files").await, 2);
    let doc = fx.document(a.id).await.unwrap();
    assert_eq!(doc.extension, "epub mobi");
    assert!(doc.filename.contains("The Shining.mobi"));

    fx.library.delete_file(file_a.id).await.unwrap();
    assert_eq!(fx.count("books").await, 1);
    assert!(!fx.books_root().join(&file_a.current_filename).exists());
    let doc = fx.document(a.id).await.unwrap();
    assert_eq!(doc.extension, "mobi");
    assert!(!doc.filename.contains("The Shining.epub"));
    assert_eq!(fx.search_ids("Shining").await, vec![a.id]);

    fx.library.delete_file(file_b.id).await.unwrap();
    assert_eq!(fx.count("books").await, 0);
    assert_eq!(fx.count("files").await, 0);
    assert_eq!(fx.count("authors").await, 0);
    assert_eq!(fx.document(a.id).await, None);
    assert!(fx.search_ids("Shining").await.is_empty());
}

#[tokio::test]
async fn test_duplicate_hash_leaves_nothing_behind() {
    let fx = Fixture::new().await;
    let first = fx.import("carrie.epub", "same bytes", "Carrie", &["Stephen King"]).await;

    let mut copy = fx.record("copy.epub", "same bytes", "Not Carrie", &["Someone Else"]).await;
    copy.files[0].tags = names(&["horror"]);
    let err = fx.library.import(copy, &fx.template, Transfer::Move).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Duplicate(id) if *id == first.id));
    assert!(err.is_conflict());

    assert_eq!(fx.count("books").await, 1);
    assert_eq!(fx.count("files").await, 1);
    assert_eq!(fx.count("authors").await, 1);
    assert_eq!(fx.count("tags").await, 0);
    assert_eq!(fx.count("books_fts").await, 1);
    assert!(fx.download("copy.epub").exists());
}

#[tokio::test]
async fn test_failed_transfer_rolls_back_import() {
    let fx = Fixture::new().await;
    let book = fx.record("gone.epub", "content", "Cujo", &["Stephen King"]).await;
    std::fs::remove_file(fx.download("gone.epub")).unwrap();

    let err = fx.library.import(book, &fx.template, Transfer::Move).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Filesystem));
    assert_eq!(fx.count("books").await, 0);
    assert_eq!(fx.count("authors").await, 0);
    assert_eq!(fx.count("files").await, 0);
    assert_eq!(fx.count("books_fts").await, 0);
}

#[tokio::test]
async fn test_import_validation() {
    let fx = Fixture::new().await;

    let no_files = Book::new("Misery", ["Stephen King"]);
    let err = fx.library.import(no_files, &fx.template, Transfer::Move).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Validation(_)));

    let one = fx.record("a.epub", "a", "Misery", &["Stephen King"]).await;
    let two = fx.record("b.epub", "b", "Misery", &["Stephen King"]).await;
    let both = one.with_file(two.files[0].clone());
    let err = fx.library.import(both, &fx.template, Transfer::Move).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Validation(_)));

    let blank = fx.record("c.epub", "c", "  ", &["Stephen King"]).await;
    let err = fx.library.import(blank, &fx.template, Transfer::Move).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Validation(_)));

    assert_eq!(fx.count("books").await, 0);
}

#[tokio::test]
async fn test_copy_leaves_source_and_keeps_tags() {
    let fx = Fixture::new().await;
    let mut book = fx.record("it.epub", "clown", "It", &["Stephen King"]).await;
    book.files[0].tags = names(&["horror", "clowns"]);
    book.files[0].source = Some("Attic".to_string());

    let stored = fx.library.import(book, &fx.template, Transfer::Copy).await.unwrap();
    assert!(fx.download("it.epub").exists());
    assert!(fx.books_root().join(&stored.files[0].current_filename).exists());

    let files = fx.library.get_files_by_id(&[stored.files[0].id]).await.unwrap();
    assert_eq!(files[0].tags, names(&["horror", "clowns"]));
    assert_eq!(files[0].source.as_deref(), Some("Attic"));
    assert_eq!(fx.search_ids("tags:clowns").await, vec![stored.id]);
    assert_eq!(fx.search_ids("source:attic").await, vec![stored.id]);
}

#[tokio::test]
async fn test_filename_collisions_are_disambiguated() {
    let fx = Fixture::new().await;
    let first = fx.import("1.epub", "one", "The Stand", &["Stephen King"]).await;
    let second = fx.import("2.epub", "two", "The Stand", &["Stephen King"]).await;
    let third = fx.import("3.epub", "three", "The Stand", &["Stephen King"]).await;
    assert_eq!(first.files[0].current_filename, Path::new("Stephen King/The Stand.epub"));
    assert_eq!(second.files[0].current_filename, Path::new("Stephen King/The Stand (1).epub"));
    assert_eq!(third.files[0].current_filename, Path::new("Stephen King/The Stand (2).epub"));

    // A stray file the library knows nothing about still counts as taken.
    std::fs::write(fx.books_root().join("Stephen King/Carrie.epub"), "stray").unwrap();
    let carrie = fx.import("carrie.epub", "carrie", "Carrie", &["Stephen King"]).await;
    assert_eq!(carrie.files[0].current_filename, Path::new("Stephen King/Carrie (1).epub"));
    assert_eq!(std::fs::read_to_string(fx.books_root().join("Stephen King/Carrie.epub")).unwrap(), "stray");
}

#[tokio::test]
async fn test_noop_update_writes_nothing() {
    let fx = Fixture::new().await;
    let book = fx.import("dune.epub", "spice", "Dune", &["Frank Herbert"]).await;
    sqlx::query("UPDATE books SET updated_on = 0").execute(fx.library.database().pool()).await.unwrap();
    let before = fx.document(book.id).await;

    let mut same = fx.library.get_books_by_id(&[book.id]).await.unwrap().remove(0);
    same.files.clear();
    fx.library.update(&same, true).await.unwrap();

    let updated_on: i64 = sqlx::query_scalar("SELECT updated_on FROM books")
        .fetch_one(fx.library.database().pool())
        .await
        .unwrap();
    assert_eq!(updated_on, 0);
    assert_eq!(fx.document(book.id).await, before);
}

#[tokio::test]
async fn test_repeated_author_names_count_once() {
    let fx = Fixture::new().await;
    let a = fx.import("omens.epub", "hardback", "Good Omens", &["Terry Pratchett", "Terry Pratchett"]).await;
    assert_eq!(a.authors, names(&["Terry Pratchett"]));

    let b = fx.import("omens.mobi", "paperback", "Good Omens", &["Terry Pratchett", "Terry Pratchett"]).await;
    assert_eq!(b.id, a.id);
    assert_eq!(fx.count("books").await, 1);
    assert_eq!(fx.count("authors").await, 1);
    assert_eq!(fx.document(a.id).await.unwrap().author, "Terry Pratchett");
    let found = fx.library.get_book_id_by_title_and_authors("Good Omens", &names(&["Terry Pratchett"])).await.unwrap();
    assert_eq!(found, Some(a.id));

    sqlx::query("UPDATE books SET updated_on = 0").execute(fx.library.database().pool()).await.unwrap();
    let repeated = Book::new("Good Omens", ["Terry Pratchett", "Terry Pratchett"]);
    fx.library.update(&Book { id: a.id, ..repeated }, false).await.unwrap();
    let updated_on: i64 = sqlx::query_scalar("SELECT updated_on FROM books")
        .fetch_one(fx.library.database().pool())
        .await
        .unwrap();
    assert_eq!(updated_on, 0);
}

#[tokio::test]
async fn test_update_relinks_authors_and_reindexes() {
    let fx = Fixture::new().await;
    let book = fx.import("thinner.epub", "thin", "Thinner", &["Richard Bachman"]).await;

    let mut changed = book.clone();
    changed.title = "Thinner (Revised)".to_string();
    changed.authors = names(&["Stephen King"]);
    changed.series = Some("Bachman Books".to_string());
    fx.library.update(&changed, false).await.unwrap();

    let stored = fx.library.get_books_by_id(&[book.id]).await.unwrap().remove(0);
    assert_eq!(stored.title, "Thinner (Revised)");
    assert_eq!(stored.authors, names(&["Stephen King"]));
    assert_eq!(stored.series, None);
    assert_eq!(fx.count("authors").await, 1);
    assert_eq!(fx.search_ids("author:king").await, vec![book.id]);
    assert!(fx.search_ids("author:bachman").await.is_empty());
    // Files stay where they were.
    assert_eq!(stored.files[0].current_filename, book.files[0].current_filename);

    fx.library.update(&changed, true).await.unwrap();
    let stored = fx.library.get_books_by_id(&[book.id]).await.unwrap().remove(0);
    assert_eq!(stored.series.as_deref(), Some("Bachman Books"));
    assert_eq!(fx.search_ids("series:bachman").await, vec![book.id]);
}

#[tokio::test]
async fn test_update_conflicts_and_missing_books() {
    let fx = Fixture::new().await;
    let carrie = fx.import("carrie.epub", "c", "Carrie", &["Stephen King"]).await;
    let misery = fx.import("misery.epub", "m", "Misery", &["Stephen King"]).await;

    let mut clash = misery.clone();
    clash.title = "Carrie".to_string();
    let err = fx.library.update(&clash, false).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::BookExists(id) if *id == carrie.id));

    let mut missing = misery.clone();
    missing.id = 9999;
    let err = fx.library.update(&missing, false).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound));
}

#[tokio::test]
async fn test_deleting_last_file_keeps_shared_authors() {
    let fx = Fixture::new().await;
    let talisman = fx.import("talisman.epub", "t", "The Talisman", &["Stephen King", "Peter Straub"]).await;
    let carrie = fx.import("carrie.epub", "c", "Carrie", &["Stephen King"]).await;
    let mut tagged = fx.record("tagged.epub", "x", "Ghost Story", &["Peter Straub"]).await;
    tagged.files[0].tags = names(&["ghosts"]);
    let ghost = fx.library.import(tagged, &fx.template, Transfer::Move).await.unwrap();

    assert!(fx.library.is_last_file(talisman.files[0].id).await.unwrap());
    fx.library.delete_file(talisman.files[0].id).await.unwrap();
    assert!(fx.library.get_books_by_id(&[talisman.id]).await.unwrap().is_empty());
    assert_eq!(fx.count("authors").await, 2);

    fx.library.delete_file(ghost.files[0].id).await.unwrap();
    assert_eq!(fx.count("authors").await, 1);
    assert_eq!(fx.count("tags").await, 0);

    let remaining = fx.library.get_books_by_id(&[carrie.id]).await.unwrap();
    assert_eq!(remaining[0].authors, names(&["Stephen King"]));
}

#[tokio::test]
async fn test_delete_file_survives_missing_disk_file() {
    let fx = Fixture::new().await;
    let book = fx.import("cujo.epub", "dog", "Cujo", &["Stephen King"]).await;
    std::fs::remove_file(fx.books_root().join(&book.files[0].current_filename)).unwrap();

    fx.library.delete_file(book.files[0].id).await.unwrap();
    assert_eq!(fx.count("files").await, 0);

    let err = fx.library.delete_file(book.files[0].id).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound));
}

#[tokio::test]
async fn test_delete_book_removes_every_file() {
    let fx = Fixture::new().await;
    let a = fx.import("a.epub", "a", "Christine", &["Stephen King"]).await;
    let b = fx.import("b.pdf", "b", "Christine", &["Stephen King"]).await;
    assert!(!fx.library.is_last_file(a.files[0].id).await.unwrap());

    fx.library.delete_book(a.id).await.unwrap();
    assert_eq!(fx.count("books").await, 0);
    assert_eq!(fx.count("files").await, 0);
    assert_eq!(fx.count("authors").await, 0);
    assert!(!fx.books_root().join(&a.files[0].current_filename).exists());
    assert!(!fx.books_root().join(&b.files[0].current_filename).exists());
}

#[tokio::test]
async fn test_merge_moves_files_to_first_book() {
    let fx = Fixture::new().await;
    let mut first = fx.record("thinner.epub", "1", "Thinner", &["Stephen King"]).await;
    first.files[0].tags = names(&["horror"]);
    let target = fx.library.import(first, &fx.template, Transfer::Move).await.unwrap();
    let mut second = fx.record("thinner-bachman.epub", "2", "Thinner", &["Richard Bachman"]).await;
    second.files[0].tags = names(&["horror", "curse"]);
    let absorbed = fx.library.import(second, &fx.template, Transfer::Move).await.unwrap();

    let merged = fx.library.merge(&[target.id, absorbed.id, target.id]).await.unwrap();
    assert_eq!(merged, target.id);

    let books = fx.library.get_books_by_id(&[target.id, absorbed.id]).await.unwrap();
    assert_eq!(books.len(), 1);
    let ids: Vec<_> = books[0].files.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![target.files[0].id, absorbed.files[0].id]);
    assert_eq!(books[0].authors, names(&["Stephen King"]));

    assert_eq!(fx.count("authors").await, 1);
    assert_eq!(fx.count("tags").await, 2);
    assert_eq!(fx.document(absorbed.id).await, None);
    assert_eq!(fx.search_ids("tags:curse").await, vec![target.id]);
    assert_eq!(fx.search_ids("filename:bachman").await, vec![target.id]);
}

#[tokio::test]
async fn test_merge_validation() {
    let fx = Fixture::new().await;
    let book = fx.import("a.epub", "a", "Firestarter", &["Stephen King"]).await;

    for ids in [vec![], vec![book.id], vec![book.id, book.id]] {
        let err = fx.library.merge(&ids).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(_)));
    }
    let err = fx.library.merge(&[book.id, 4242]).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound));
    assert_eq!(fx.count("books").await, 1);
}

#[tokio::test]
async fn test_search_paging() {
    let fx = Fixture::new().await;
    let mut ids = Vec::new();
    for title in ["Carrie", "Christine", "Cujo", "Misery", "It"] {
        ids.push(fx.import(&format!("{title}.epub"), title, title, &["Stephen King"]).await.id);
    }
    fx.import("dune.epub", "dune", "Dune", &["Frank Herbert"]).await;

    let all = fx.library.search_paged("author:king", 0, 0, 10).await.unwrap();
    assert_eq!(all.books.len(), 5);
    assert_eq!(all.more_results, 0);

    let page = fx.library.search_paged("author:king", 0, 2, 2).await.unwrap();
    assert_eq!(page.books.len(), 2);
    assert_eq!(page.more_results, 2);

    let page = fx.library.search_paged("author:king", 2, 2, 10).await.unwrap();
    assert_eq!(page.books.len(), 2);
    assert_eq!(page.more_results, 1);

    let last = fx.library.search_paged("author:king", 4, 2, 10).await.unwrap();
    assert_eq!(last.books.len(), 1);
    assert_eq!(last.more_results, 0);

    let everything = fx.library.search_paged("author:king", 0, u64::MAX, u64::MAX).await.unwrap();
    assert_eq!(everything.books.len(), 5);
    assert_eq!(everything.more_results, 0);
    assert!(fx.library.search_paged("author:king", u64::MAX, 2, 10).await.unwrap().books.is_empty());

    let mut found = fx.search_ids("author:king").await;
    found.sort();
    assert_eq!(found, ids);
    assert!(fx.search_ids("author:king title:dune").await.is_empty());
}

#[tokio::test]
async fn test_lookups() {
    let fx = Fixture::new().await;
    let book = fx.import("talisman.epub", "t", "The Talisman", &["Stephen King", "Peter Straub"]).await;
    let file = &book.files[0];

    assert_eq!(fx.library.get_file_id_by_filename(&file.current_filename).await.unwrap(), file.id);
    assert_eq!(fx.library.get_book_id_by_filename(&file.current_filename).await.unwrap(), book.id);
    let err = fx.library.get_book_id_by_filename("nowhere.epub").await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound));

    let authors = names(&["Stephen King", "Peter Straub"]);
    let found = fx.library.get_book_id_by_title_and_authors("The Talisman", &authors).await.unwrap();
    assert_eq!(found, Some(book.id));
    let reversed = names(&["Peter Straub", "Stephen King"]);
    let found = fx.library.get_book_id_by_title_and_authors("The Talisman", &reversed).await.unwrap();
    assert_eq!(found, None);

    assert!(fx.library.get_files_by_id(&[12345]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_convert_returns_cached_copy() {
    let fx = Fixture::new().await;
    let book = fx.import("salem.epub", "lot", "'Salem's Lot", &["Stephen King"]).await;
    let file = &book.files[0];
    assert_eq!(fx.library.cache_dir(), fx.dir.path().join("cache"));

    let cached = fx.library.cache_dir().join(format!("{}.mobi", file.hash));
    std::fs::create_dir_all(fx.library.cache_dir()).unwrap();
    std::fs::write(&cached, "converted").unwrap();
    assert_eq!(fx.library.convert(file, ".MOBI").await.unwrap(), cached);

    let err = fx.library.convert(file, "").await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Validation(_)));
}

#[tokio::test]
async fn test_create_and_open() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("library.db");
    let root = dir.path().join("books");

    let err = Library::open(&db, &root).await.err().unwrap();
    assert!(matches!(&*err, ErrorKind::Store));

    let library = Library::create(&db, &root).await.unwrap();
    library.close().await;
    let err = Library::create(&db, &root).await.err().unwrap();
    assert!(matches!(&*err, ErrorKind::Store));

    let library = Library::open(&db, &root).await.unwrap();
    assert!(library.search_paged("anything", 0, 10, 10).await.unwrap().books.is_empty());
}

#[tokio::test]
async fn test_failed_create_leaves_no_books_root() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("library.db");
    Library::create(&db, dir.path().join("books")).await.unwrap().close().await;

    let other = dir.path().join("other books");
    let err = Library::create(&db, &other).await.err().unwrap();
    assert!(matches!(&*err, ErrorKind::Store));
    assert!(!other.exists());

    let missing = dir.path().join("missing.db");
    let err = Library::open(&missing, &other).await.err().unwrap();
    assert!(matches!(&*err, ErrorKind::Store));
    assert!(!other.exists());
}

#[tokio::test]
async fn test_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = tome_config::Config {
        database: dir.path().join("state/library.db"),
        books_root: dir.path().join("books"),
        output_template: "{{ title|slug }}".to_string(),
        transfer: tome_config::TransferMode::Copy,
        ..Default::default()
    };
    let template = PathGenerator::try_from(&config).unwrap();

    let library = Library::from_config(&config).await.unwrap();
    assert_eq!(library.cache_dir(), dir.path().join("state/cache"));
    let source = dir.path().join("misery.epub");
    std::fs::write(&source, "annie").unwrap();
    let info = tome_storage::inspect(&source).await.unwrap();
    let book = Book::new("Misery", ["Stephen King"])
        .with_file(BookFile::new(info.path, info.size, info.modified, info.file_hash));
    let stored = library.import(book, &template, config.transfer.into()).await.unwrap();
    assert_eq!(stored.files[0].current_filename, Path::new("misery.epub"));
    assert!(source.exists());
    library.close().await;

    // Second time round the existing database is opened, not recreated.
    let library = Library::from_config(&config).await.unwrap();
    assert_eq!(library.search("misery").await.unwrap().len(), 1);
}
