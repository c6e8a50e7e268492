use crate::{AUTHOR_SEPARATOR, BookFile, BookId};

/// A logical work made up of one or more [`BookFile`]s.
///
/// Two books are the same book when their titles are equal and their author
/// lists are equal *in order*: "King & Straub" and "Straub & King" are
/// distinct books.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Book {
    /// Zero until the book has been stored.
    pub id: BookId,
    pub title: String,
    pub series: Option<String>,
    /// Author names, in the order they should be displayed.
    pub authors: Vec<String>,
    pub files: Vec<BookFile>,
}
impl Book {
    pub fn new<A: Into<String>>(title: impl Into<String>, authors: impl IntoIterator<Item = A>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            series: None,
            authors: authors.into_iter().map(Into::into).collect(),
            files: Vec::new(),
        }
    }

    pub fn with_series(mut self, series: impl Into<String>) -> Self {
        self.series = Some(series.into()).filter(|s: &String| !s.trim().is_empty());
        self
    }

    pub fn with_file(mut self, file: BookFile) -> Self {
        self.files.push(file);
        self
    }

    /// Author names flattened for display and indexing (`"Niven & Pournelle"`).
    pub fn joined_authors(&self) -> String {
        self.authors.join(AUTHOR_SEPARATOR)
    }

    /// Drop repeated author names, keeping the first occurrence of each.
    ///
    /// Stored books never list an author twice, so a record has to be
    /// deduplicated before it can be compared with one.
    pub fn dedup_authors(&mut self) {
        let mut seen: Vec<String> = Vec::with_capacity(self.authors.len());
        self.authors.retain(|name| match seen.contains(name) {
            true => false,
            false => {
                seen.push(name.clone());
                true
            },
        });
    }

    /// Whether this book has the given title and exactly the given authors, in order.
    pub fn is_identified_by(&self, title: &str, authors: &[String]) -> bool {
        self.title == title && self.authors == authors
    }
}
