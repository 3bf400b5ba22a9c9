//! Backend-agnostic faceted search over Elasticsearch and Meilisearch
//!
//! Client code builds one canonical [`SearchRequest`] and receives one canonical
//! [`SearchResult`], whichever backend serves the index:
//!
//! - **Free text**: query string matched against the configured content fields
//! - **Filters**: equality, inclusive ranges, "equals or absent" passthroughs
//! - **Exclusions**: negated values, logical ids mapped to primary keys
//! - **Facets**: per-field term counts with top-N truncation and an `other` bucket
//! - **Multi-value facets**: each facet counted without its own filters
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │           SearchEngine (trait)                   │
//! ├─────────────────────────────────────────────────┤
//! │  - index()         - remove()                    │
//! │  - search()        - search_string()             │
//! └─────────────────────────────────────────────────┘
//!                      │
//!          ┌───────────┴────────────┐
//!          ▼                        ▼
//! ┌──────────────────────┐ ┌──────────────────────┐
//! │  Elasticsearch       │ │  Meilisearch         │
//! ├──────────────────────┤ ├──────────────────────┤
//! │  translate → DSL     │ │  translate → params  │
//! │  global aggregation  │ │  + supplementary     │
//! │  normalize           │ │  normalize + merge   │
//! └──────────────────────┘ └──────────────────────┘
//!          │                        │
//!          ▼                        ▼
//! ┌─────────────────────────────────────────────────┐
//! │    Transports (HTTP via reqwest, or fakes)       │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use faceted_search::search::{create_engine, EngineBackend, EngineConfigBuilder, SearchRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfigBuilder::new()
//!         .backend(EngineBackend::Meilisearch)
//!         .build();
//!     let engine = create_engine(&config, "courseware_content")?;
//!
//!     let request = SearchRequest::text("physics")
//!         .with_field("language", ["en"])
//!         .with_aggregation("language", None)
//!         .with_aggregation("org", Some(10))
//!         .multivalue(true);
//!
//!     let results = engine.search(&request).await?;
//!     println!("Found {} documents", results.total);
//!
//!     Ok(())
//! }
//! ```

mod config;
pub mod document;
pub mod elasticsearch;
mod engine;
mod error;
mod factory;
pub mod meilisearch;
pub mod metrics;
mod query;
mod response;

pub use config::{
    ElasticsearchConfig, EngineBackend, EngineConfig, EngineConfigBuilder, MeilisearchConfig,
};
pub use document::{
    decode, encode, encode_fields, primary_key, to_ascii_json, Document, DocumentValue,
    EncodedDocument, ID_FIELD_NAME, PRIMARY_KEY_FIELD_NAME, UTC_OFFSET_SUFFIX,
};
pub use elasticsearch::{ElasticsearchEngine, ElasticsearchTransport, HttpElasticsearchClient};
pub use engine::{SearchEngine, WriteOptions};
pub use error::{
    EncodeError, SearchEngineError, SearchEngineResult, TransportError, TransportResult,
};
pub use factory::create_engine;
pub use meilisearch::{HttpMeilisearchClient, MeilisearchEngine, MeilisearchTransport};
pub use query::{
    AggregationRequest, ExclusionSpec, FilterSpec, FilterValue, RangeSpec, SearchRequest,
    SortField, SortOrder, DEFAULT_PAGE_SIZE,
};
pub use response::{FacetResult, SearchHit, SearchResult, DOCUMENT_TYPE};
