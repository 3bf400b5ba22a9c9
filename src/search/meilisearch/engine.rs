//! Meilisearch-backed search engine

use super::normalize::{facet_distribution, normalize, Distribution};
use super::transport::{MeilisearchTransport, TaskInfo, TaskStatus};
use super::translate::translate;
use crate::search::config::EngineBackend;
use crate::search::document::{encode, primary_key, Document, PRIMARY_KEY_FIELD_NAME};
use crate::search::engine::{SearchEngine, WriteOptions};
use crate::search::error::{SearchEngineError, SearchEngineResult, TransportError};
use crate::search::metrics::{observe, SEARCH_METRICS};
use crate::search::query::SearchRequest;
use crate::search::response::SearchResult;
use async_trait::async_trait;
use futures::future::{try_join, try_join_all};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Search engine over one Meilisearch index
pub struct MeilisearchEngine {
    index_name: String,
    transport: Arc<dyn MeilisearchTransport>,
    task_poll_interval: Duration,
    task_timeout: Duration,
}

impl MeilisearchEngine {
    pub fn new(index_name: impl Into<String>, transport: Arc<dyn MeilisearchTransport>) -> Self {
        Self {
            index_name: index_name.into(),
            transport,
            task_poll_interval: Duration::from_millis(50),
            task_timeout: Duration::from_secs(5),
        }
    }

    /// Set how refreshing writes wait for their task
    pub fn with_task_polling(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.task_poll_interval = poll_interval;
        self.task_timeout = timeout;
        self
    }

    /// Wait for an enqueued write when a refresh was requested
    async fn settle(&self, task: TaskInfo, options: WriteOptions) -> Result<(), TransportError> {
        if !options.refresh {
            return Ok(());
        }
        let task = self
            .transport
            .wait_for_task(task.task_uid, self.task_poll_interval, self.task_timeout)
            .await?;
        match task.status {
            TaskStatus::Succeeded => Ok(()),
            status => Err(TransportError::Task(match task.error {
                Some(error) => format!("{} ({})", error.message, error.code),
                None => format!("task {} ended as {:?}", task.uid, status),
            })),
        }
    }
}

#[async_trait]
impl SearchEngine for MeilisearchEngine {
    fn backend(&self) -> EngineBackend {
        EngineBackend::Meilisearch
    }

    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn index(&self, documents: &[Document], options: WriteOptions) -> SearchEngineResult<()> {
        let started = Instant::now();

        let result = async {
            let encoded = documents
                .iter()
                .map(encode)
                .collect::<Result<Vec<_>, _>>()?;
            let ids: Vec<String> = encoded.iter().map(|doc| doc.id.clone()).collect();
            let bodies: Vec<_> = encoded.iter().map(|doc| doc.body_with_primary_key()).collect();

            let written = async {
                let task = self
                    .transport
                    .add_documents(&self.index_name, &bodies, PRIMARY_KEY_FIELD_NAME)
                    .await?;
                self.settle(task, options).await
            }
            .await;

            written.map_err(|e| SearchEngineError::Index {
                message: "document addition failed".to_string(),
                failed_ids: ids,
                source: Some(e),
            })
        }
        .await;

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
        let keys: Vec<String> = ids.iter().map(|id| primary_key(id)).collect();

        let written = async {
            let task = self
                .transport
                .delete_documents(&self.index_name, &keys)
                .await?;
            self.settle(task, options).await
        }
        .await;
        let result = written.map_err(|e| SearchEngineError::Remove {
            message: "document deletion failed".to_string(),
            failed_ids: ids.to_vec(),
            source: Some(e),
        });

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
            let queries = translate(request)?;
            debug!(
                index = %self.index_name,
                filter = ?queries.primary.filter,
                supplementary = queries.supplementary.len(),
                "Translated Meilisearch query"
            );

            if !queries.supplementary.is_empty() {
                SEARCH_METRICS
                    .supplementary_queries
                    .with_label_values(&[self.backend().as_str()])
                    .inc_by(queries.supplementary.len() as f64);
            }

            let primary = self.transport.search(&self.index_name, &queries.primary);
            let expansions = try_join_all(queries.supplementary.iter().map(|query| async move {
                let response = self.transport.search(&self.index_name, &query.params).await?;
                Ok::<_, TransportError>((
                    query.field.clone(),
                    facet_distribution(&response, &query.field),
                ))
            }));

            let (primary, expansions) = try_join(primary, expansions)
                .await
                .map_err(|e| SearchEngineError::search("Meilisearch search request failed", e))?;

            let expanded: BTreeMap<String, Distribution> = expansions.into_iter().collect();
            normalize(&primary, &expanded, &self.index_name, request)
        }
        .await;

        observe(self.backend(), "search", started, &result);
        if let Err(e) = &result {
            error!(index = %self.index_name, error = %e, "Search failed");
        }
        result
    }
}
