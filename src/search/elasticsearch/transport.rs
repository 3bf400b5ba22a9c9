//! Elasticsearch transport

use crate::search::config::ElasticsearchConfig;
use crate::search::document::to_ascii_json;
use crate::search::error::{SearchEngineError, SearchEngineResult, TransportError, TransportResult};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// One line pair of a `_bulk` request
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    Index { id: String, source: Value },
    Delete { id: String },
}

impl BulkOperation {
    pub fn id(&self) -> &str {
        match self {
            BulkOperation::Index { id, .. } | BulkOperation::Delete { id } => id,
        }
    }
}

/// Outcome of one bulk item
#[derive(Debug, Clone, Deserialize)]
pub struct BulkItemResult {
    #[serde(rename = "_id")]
    pub id: String,

    pub status: u16,

    #[serde(default)]
    pub error: Option<Value>,
}

/// Parsed `_bulk` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub errors: bool,

    /// One entry per operation, keyed by action name
    #[serde(default)]
    pub items: Vec<BTreeMap<String, BulkItemResult>>,
}

impl BulkResponse {
    /// Items that failed; deleting a missing document is not a failure
    pub fn failures(&self) -> Vec<&BulkItemResult> {
        self.items
            .iter()
            .flat_map(|item| item.iter())
            .filter(|(action, result)| {
                let missing_delete = action.as_str() == "delete" && result.status == 404;
                result.error.is_some() || (result.status >= 300 && !missing_delete)
            })
            .map(|(_, result)| result)
            .collect()
    }
}

/// Low-level access to an Elasticsearch cluster
#[async_trait]
pub trait ElasticsearchTransport: Send + Sync {
    /// Run a search body against an index
    async fn search(&self, index: &str, body: &Value) -> TransportResult<Value>;

    /// Apply index and delete operations in one request
    async fn bulk(
        &self,
        index: &str,
        operations: &[BulkOperation],
        refresh: bool,
    ) -> TransportResult<BulkResponse>;
}

/// `reqwest` implementation of [`ElasticsearchTransport`]
#[derive(Clone)]
pub struct HttpElasticsearchClient {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpElasticsearchClient {
    pub fn new(config: &ElasticsearchConfig) -> SearchEngineResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                SearchEngineError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_deref()),
            None => request,
        }
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

/// Newline-delimited body for the `_bulk` endpoint
pub fn bulk_body(index: &str, operations: &[BulkOperation]) -> TransportResult<String> {
    let mut body = String::new();
    for operation in operations {
        match operation {
            BulkOperation::Index { id, source } => {
                body.push_str(&to_ascii_json(&json!({"index": {"_index": index, "_id": id}}))?);
                body.push('\n');
                body.push_str(&to_ascii_json(source)?);
                body.push('\n');
            }
            BulkOperation::Delete { id } => {
                body.push_str(&to_ascii_json(&json!({"delete": {"_index": index, "_id": id}}))?);
                body.push('\n');
            }
        }
    }
    Ok(body)
}

#[async_trait]
impl ElasticsearchTransport for HttpElasticsearchClient {
    async fn search(&self, index: &str, body: &Value) -> TransportResult<Value> {
        debug!(index = %index, "Sending Elasticsearch search request");
        let response = self
            .post(&format!("/{}/_search", index))
            .header(CONTENT_TYPE, "application/json")
            .body(to_ascii_json(body)?)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn bulk(
        &self,
        index: &str,
        operations: &[BulkOperation],
        refresh: bool,
    ) -> TransportResult<BulkResponse> {
        if operations.is_empty() {
            return Ok(BulkResponse::default());
        }

        debug!(
            index = %index,
            operations = operations.len(),
            refresh,
            "Sending Elasticsearch bulk request"
        );
        let response = self
            .post(&format!("/_bulk?refresh={}", refresh))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(bulk_body(index, operations)?)
            .send()
            .await?;
        Self::read_json(response).await
    }
}
