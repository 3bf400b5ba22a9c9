//! Elasticsearch-backed search engine

use super::normalize::normalize;
use super::transport::{BulkOperation, ElasticsearchTransport};
use super::translate::ElasticsearchTranslator;
use crate::search::config::EngineBackend;
use crate::search::document::{encode, primary_key, Document};
use crate::search::engine::{SearchEngine, WriteOptions};
use crate::search::error::{SearchEngineError, SearchEngineResult};
use crate::search::metrics::{observe, SEARCH_METRICS};
use crate::search::query::SearchRequest;
use crate::search::response::SearchResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Search engine over one Elasticsearch index
pub struct ElasticsearchEngine {
    index_name: String,
    transport: Arc<dyn ElasticsearchTransport>,
    translator: ElasticsearchTranslator,
}

impl ElasticsearchEngine {
    pub fn new(
        index_name: impl Into<String>,
        transport: Arc<dyn ElasticsearchTransport>,
        translator: ElasticsearchTranslator,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            transport,
            translator,
        }
    }

    async fn write(
        &self,
        operations: Vec<BulkOperation>,
        ids_by_key: HashMap<String, String>,
        options: WriteOptions,
        removing: bool,
    ) -> SearchEngineResult<()> {
        let failure = |message: String, failed_ids: Vec<String>, source| {
            if removing {
                SearchEngineError::Remove {
                    message,
                    failed_ids,
                    source,
                }
            } else {
                SearchEngineError::Index {
                    message,
                    failed_ids,
                    source,
                }
            }
        };

        let response = self
            .transport
            .bulk(&self.index_name, &operations, options.refresh)
            .await
            .map_err(|e| {
                failure(
                    "bulk request failed".to_string(),
                    ids_by_key.values().cloned().collect(),
                    Some(e),
                )
            })?;

        let failures = response.failures();
        if failures.is_empty() {
            return Ok(());
        }

        let failed_ids: Vec<String> = failures
            .iter()
            .map(|item| {
                ids_by_key
                    .get(&item.id)
                    .cloned()
                    .unwrap_or_else(|| item.id.clone())
            })
            .collect();
        let reason = failures
            .iter()
            .find_map(|item| item.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| format!("status {}", failures[0].status));

        Err(failure(
            format!("bulk request had errors: {}", reason),
            failed_ids,
            None,
        ))
    }
}

#[async_trait]
impl SearchEngine for ElasticsearchEngine {
    fn backend(&self) -> EngineBackend {
        EngineBackend::Elasticsearch
    }

    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn index(&self, documents: &[Document], options: WriteOptions) -> SearchEngineResult<()> {
        let started = Instant::now();

        let encoded = documents
            .iter()
            .map(encode)
            .collect::<Result<Vec<_>, _>>()
            .map_err(SearchEngineError::from);

        let result = match encoded {
            Ok(encoded) => {
                let ids_by_key = encoded
                    .iter()
                    .map(|doc| (doc.primary_key.clone(), doc.id.clone()))
                    .collect();
                let operations = encoded
                    .into_iter()
                    .map(|doc| BulkOperation::Index {
                        id: doc.primary_key,
                        source: serde_json::Value::Object(doc.fields),
                    })
                    .collect();
                self.write(operations, ids_by_key, options, false).await
            }
            Err(e) => Err(e),
        };

        observe(self.backend(), "index", started, &result);
        match &result {
            Ok(()) => {
                SEARCH_METRICS
                    .documents_indexed
                    .with_label_values(&[self.backend().as_str()])
                    .inc_by(documents.len() as f64);
                info!(
                    index = %self.index_name,
                    documents = documents.len(),
                    refresh = options.refresh,
                    "Indexed documents"
                );
            }
            Err(e) => error!(index = %self.index_name, error = %e, "Failed to index documents"),
        }
        result
    }

    async fn remove(&self, ids: &[String], options: WriteOptions) -> SearchEngineResult<()> {
        let started = Instant::now();

        let ids_by_key: HashMap<String, String> =
            ids.iter().map(|id| (primary_key(id), id.clone())).collect();
        let operations = ids
            .iter()
            .map(|id| BulkOperation::Delete {
                id: primary_key(id),
            })
            .collect();

        let result = self.write(operations, ids_by_key, options, true).await;

        observe(self.backend(), "remove", started, &result);
        match &result {
            Ok(()) => {
                SEARCH_METRICS
                    .documents_removed
                    .with_label_values(&[self.backend().as_str()])
                    .inc_by(ids.len() as f64);
                info!(index = %self.index_name, documents = ids.len(), "Removed documents");
            }
            Err(e) => error!(index = %self.index_name, error = %e, "Failed to remove documents"),
        }
        result
    }

    async fn search(&self, request: &SearchRequest) -> SearchEngineResult<SearchResult> {
        let started = Instant::now();

        let result = async {
            let body = self.translator.translate(request)?;
            debug!(index = %self.index_name, body = %body, "Translated Elasticsearch query");

            let response = self
                .transport
                .search(&self.index_name, &body)
                .await
                .map_err(|e| SearchEngineError::search("Elasticsearch search request failed", e))?;

            normalize(&response, &self.index_name, request)
        }
        .await;

        observe(self.backend(), "search", started, &result);
        if let Err(e) = &result {
            error!(index = %self.index_name, error = %e, "Search failed");
        }
        result
    }
}
