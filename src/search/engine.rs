//! Engine facade shared by every backend

use crate::search::config::EngineBackend;
use crate::search::document::Document;
use crate::search::error::SearchEngineResult;
use crate::search::query::SearchRequest;
use crate::search::response::SearchResult;
use async_trait::async_trait;

/// Options for write operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Make the change visible to searches before returning
    pub refresh: bool,
}

impl WriteOptions {
    pub fn refresh() -> Self {
        Self { refresh: true }
    }
}

/// A search index backed by one engine
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Backend serving this index
    fn backend(&self) -> EngineBackend;

    /// Backend-side name of the index (prefix included)
    fn index_name(&self) -> &str;

    /// Upsert documents keyed by their logical id
    ///
    /// Every document is encoded before anything is written, so an encoding
    /// failure leaves the index untouched.
    async fn index(&self, documents: &[Document], options: WriteOptions) -> SearchEngineResult<()>;

    /// Delete documents by logical id; unknown ids are not an error
    async fn remove(&self, ids: &[String], options: WriteOptions) -> SearchEngineResult<()>;

    /// Execute a canonical request
    async fn search(&self, request: &SearchRequest) -> SearchEngineResult<SearchResult>;

    /// Free-text search with default paging and no filters
    async fn search_string(&self, query: &str) -> SearchEngineResult<SearchResult> {
        self.search(&SearchRequest::text(query)).await
    }
}
