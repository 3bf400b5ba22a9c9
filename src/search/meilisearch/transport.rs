//! Meilisearch transport

use super::translate::SearchParams;
use crate::search::config::MeilisearchConfig;
use crate::search::document::to_ascii_json;
use crate::search::error::{SearchEngineError, SearchEngineResult, TransportError, TransportResult};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// Summary returned when a write is enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub task_uid: u64,
}

/// Lifecycle state of an asynchronous task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Canceled
        )
    }
}

/// Error attached to a failed task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub message: String,

    #[serde(default)]
    pub code: String,

    #[serde(rename = "type", default)]
    pub error_type: String,
}

/// State of an asynchronous task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub uid: u64,
    pub status: TaskStatus,
    #[serde(default)]
    pub error: Option<TaskError>,
}

/// Low-level access to a Meilisearch server
#[async_trait]
pub trait MeilisearchTransport: Send + Sync {
    /// Run one search
    async fn search(&self, index: &str, params: &SearchParams) -> TransportResult<Value>;

    /// Enqueue an upsert of documents identified by `primary_key`
    async fn add_documents(
        &self,
        index: &str,
        documents: &[Value],
        primary_key: &str,
    ) -> TransportResult<TaskInfo>;

    /// Enqueue a deletion by primary key
    async fn delete_documents(&self, index: &str, keys: &[String]) -> TransportResult<TaskInfo>;

    /// Current state of a task
    async fn get_task(&self, uid: u64) -> TransportResult<Task>;

    /// Poll a task until it finishes or `timeout` elapses
    async fn wait_for_task(
        &self,
        uid: u64,
        poll_interval: Duration,
        timeout: Duration,
    ) -> TransportResult<Task> {
        let started = Instant::now();
        loop {
            let task = self.get_task(uid).await?;
            if task.status.is_finished() {
                return Ok(task);
            }
            if started.elapsed() >= timeout {
                return Err(TransportError::Timeout(format!(
                    "task {} still {:?} after {:?}",
                    uid, task.status, timeout
                )));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// `reqwest` implementation of [`MeilisearchTransport`]
#[derive(Clone)]
pub struct HttpMeilisearchClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpMeilisearchClient {
    pub fn new(config: &MeilisearchConfig) -> SearchEngineResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                SearchEngineError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn post_json<B: Serialize + ?Sized, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> TransportResult<T> {
        let request = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(CONTENT_TYPE, "application/json")
            .body(to_ascii_json(body)?);
        let response = self.authorized(request).send().await?;
        Self::read_json(response).await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> TransportResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl MeilisearchTransport for HttpMeilisearchClient {
    async fn search(&self, index: &str, params: &SearchParams) -> TransportResult<Value> {
        debug!(index = %index, facets = ?params.facets, "Sending Meilisearch search request");
        self.post_json(&format!("/indexes/{}/search", index), params)
            .await
    }

    async fn add_documents(
        &self,
        index: &str,
        documents: &[Value],
        primary_key: &str,
    ) -> TransportResult<TaskInfo> {
        debug!(index = %index, documents = documents.len(), "Adding Meilisearch documents");
        self.post_json(
            &format!("/indexes/{}/documents?primaryKey={}", index, primary_key),
            documents,
        )
        .await
    }

    async fn delete_documents(&self, index: &str, keys: &[String]) -> TransportResult<TaskInfo> {
        debug!(index = %index, documents = keys.len(), "Deleting Meilisearch documents");
        self.post_json(&format!("/indexes/{}/documents/delete-batch", index), keys)
            .await
    }

    async fn get_task(&self, uid: u64) -> TransportResult<Task> {
        let request = self
            .client
            .get(format!("{}/tasks/{}", self.base_url, uid));
        let response = self.authorized(request).send().await?;
        Self::read_json(response).await
    }
}
