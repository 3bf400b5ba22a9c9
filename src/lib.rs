//! Faceted search over Elasticsearch and Meilisearch behind one request model.

pub mod config;
pub mod search;

pub use config::Config;
pub use search::{
    create_engine, Document, EngineBackend, EngineConfig, FacetResult, SearchEngine,
    SearchEngineError, SearchRequest, SearchResult,
};
