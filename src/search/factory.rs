use crate::search::config::{EngineBackend, EngineConfig};
use crate::search::elasticsearch::{
    ElasticsearchEngine, ElasticsearchTranslator, HttpElasticsearchClient,
};
use crate::search::engine::SearchEngine;
use crate::search::error::{SearchEngineError, SearchEngineResult};
use crate::search::meilisearch::{HttpMeilisearchClient, MeilisearchEngine};
use std::sync::Arc;

/// Create a search engine for `index_name` based on configuration
///
/// Fails with [`SearchEngineError::Configuration`] when no backend is selected
/// for the index.
pub fn create_engine(config: &EngineConfig, index_name: &str) -> SearchEngineResult<Arc<dyn SearchEngine>> {
    let backend = config.backend_for(index_name).ok_or_else(|| {
        SearchEngineError::Configuration(format!(
            "No search engine configured for index '{}'",
            index_name
        ))
    })?;

    match backend {
        EngineBackend::Elasticsearch => {
            let es = &config.elasticsearch;
            let full_name = format!("{}{}", es.index_prefix, index_name);

            tracing::info!(url = %es.url, index = %full_name, "Initializing Elasticsearch search backend");

            let transport = HttpElasticsearchClient::new(es)?;
            Ok(Arc::new(ElasticsearchEngine::new(
                full_name,
                Arc::new(transport),
                ElasticsearchTranslator::new(es.query_fields.clone()),
            )))
        }

        EngineBackend::Meilisearch => {
            let meili = &config.meilisearch;
            let full_name = format!("{}{}", meili.index_prefix, index_name);

            tracing::info!(url = %meili.url, index = %full_name, "Initializing Meilisearch search backend");

            let transport = HttpMeilisearchClient::new(meili)?;
            Ok(Arc::new(
                MeilisearchEngine::new(full_name, Arc::new(transport))
                    .with_task_polling(meili.task_poll_interval(), meili.task_timeout()),
            ))
        }
    }
}
