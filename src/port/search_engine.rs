use crate::error::IndexError;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

type IndexFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, IndexError>> + Send + 'a>>;

/// The three search-engine calls the index publisher relies on.
pub trait SearchEngine: Send + Sync {
    /// `Ok(true)` when the index exists, `Ok(false)` on a 404.
    fn index_exists<'a>(&'a self, index: &'a str) -> IndexFuture<'a, bool>;

    /// Create an index. An index created concurrently by someone else is not an error.
    fn create_index<'a>(&'a self, index: &'a str) -> IndexFuture<'a, ()>;

    /// Submit an `application/x-ndjson` bulk body and return the decoded acknowledgement.
    fn bulk<'a>(&'a self, index: &'a str, body: String) -> IndexFuture<'a, Value>;
}
