//! Elasticsearch backend
//!
//! Every search is a single request. Multi-value facets use a `global`
//! aggregation holding one `filter` sub-aggregation per facet, each built from
//! the request with that facet's own filters removed.

mod engine;
pub mod normalize;
mod transport;
pub mod translate;

pub use engine::ElasticsearchEngine;
pub use transport::{
    bulk_body, BulkItemResult, BulkOperation, BulkResponse, ElasticsearchTransport,
    HttpElasticsearchClient,
};
pub use translate::{ElasticsearchTranslator, RESERVED_CHARACTERS};
