use crate::Library;
use crate::error::{ErrorKind, Result};
use tome_model::Book;
use tracing::instrument;

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    /// Matching books in match order.
    pub books: Vec<Book>,
    /// How many more matches follow this page, capped at the
    /// `more_results_limit` the search was made with.
    pub more_results: u64,
}

impl Library {
    /// Every book matching an FTS4 query such as `author:King title:Shining`.
    pub async fn search(&self, terms: &str) -> Result<Vec<Book>> {
        Ok(self.search_paged(terms, 0, 0, 0).await?.books)
    }

    /// Up to `limit` matching books starting at `offset`, plus a count of the
    /// matches after them (up to `more_results_limit`) so a caller can tell
    /// whether a next page exists without counting everything.
    ///
    /// A `limit` of zero returns all matches and ignores `offset`.
    #[instrument(skip(self))]
    pub async fn search_paged(
        &self,
        terms: &str,
        offset: u64,
        limit: u64,
        more_results_limit: u64,
    ) -> Result<SearchResults> {
        let mut tx = self.begin().await?;
        let (ids, more_results) = match limit {
            0 => (tx.search(terms, None, 0).await.map_err(ErrorKind::store)?, 0),
            limit => {
                let mut ids = tx
                    .search(terms, Some(limit.saturating_add(more_results_limit)), offset)
                    .await
                    .map_err(ErrorKind::store)?;
                let extra = (ids.len() as u64).saturating_sub(limit);
                ids.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
                (ids, extra.min(more_results_limit))
            },
        };
        let books = tx.get_books(&ids).await.map_err(ErrorKind::store)?;
        tx.commit().await.map_err(ErrorKind::store)?;
        tracing::debug!(found = books.len(), more_results, "search");
        Ok(SearchResults { books, more_results })
    }
}
