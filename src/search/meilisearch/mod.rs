//! Meilisearch backend
//!
//! Meilisearch has no global aggregations. In multi-value mode every requested
//! facet that carries a filter gets its own zero-hit query with that facet's
//! filters removed; its distribution replaces the primary one.

mod engine;
pub mod normalize;
mod transport;
pub mod translate;

pub use engine::MeilisearchEngine;
pub use transport::{
    HttpMeilisearchClient, MeilisearchTransport, Task, TaskError, TaskInfo, TaskStatus,
};
pub use translate::{
    translate, FilterRule, MeilisearchQuerySet, RuleKind, SearchParams, SupplementaryQuery,
};
