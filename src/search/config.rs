//! Search engine configuration

use crate::search::query::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Search backend type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EngineBackend {
    /// Elasticsearch - native global aggregations
    Elasticsearch,
    /// Meilisearch - facets expanded through supplementary queries
    Meilisearch,
}

impl EngineBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineBackend::Elasticsearch => "elasticsearch",
            EngineBackend::Meilisearch => "meilisearch",
        }
    }
}

impl std::fmt::Display for EngineBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EngineBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "elasticsearch" => Ok(EngineBackend::Elasticsearch),
            "meilisearch" => Ok(EngineBackend::Meilisearch),
            other => Err(format!("unknown search backend `{}`", other)),
        }
    }
}

/// Elasticsearch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticsearchConfig {
    /// Cluster URL
    pub url: String,

    /// Basic auth username
    pub username: Option<String>,

    /// Basic auth password
    pub password: Option<String>,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Fields searched by the free-text query
    pub query_fields: Vec<String>,

    /// Prepended to every index name
    pub index_prefix: String,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            request_timeout_secs: 30,
            query_fields: vec!["content.*".to_string()],
            index_prefix: String::new(),
        }
    }
}

impl ElasticsearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Meilisearch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeilisearchConfig {
    /// Server URL
    pub url: String,

    /// API key sent as a bearer token
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Delay between task status polls in milliseconds
    pub task_poll_interval_ms: u64,

    /// Maximum time to wait for a task in milliseconds
    pub task_timeout_ms: u64,

    /// Prepended to every index name
    pub index_prefix: String,
}

impl Default for MeilisearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7700".to_string(),
            api_key: None,
            request_timeout_secs: 30,
            task_poll_interval_ms: 50,
            task_timeout_ms: 5000,
            index_prefix: String::new(),
        }
    }
}

impl MeilisearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn task_poll_interval(&self) -> Duration {
        Duration::from_millis(self.task_poll_interval_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }
}

/// Main search engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Backend used for indexes without an override; `None` disables search
    pub backend: Option<EngineBackend>,

    /// Per-index backend overrides
    pub index_backends: BTreeMap<String, EngineBackend>,

    /// Elasticsearch configuration
    pub elasticsearch: ElasticsearchConfig,

    /// Meilisearch configuration
    pub meilisearch: MeilisearchConfig,

    /// Page size the command line uses when `--size` is not given
    ///
    /// Library callers set [`SearchRequest::size`](crate::search::SearchRequest)
    /// directly; engines never read this value.
    pub default_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: None,
            index_backends: BTreeMap::new(),
            elasticsearch: ElasticsearchConfig::default(),
            meilisearch: MeilisearchConfig::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Backend selected for an index, honouring per-index overrides
    pub fn backend_for(&self, index_name: &str) -> Option<EngineBackend> {
        self.index_backends
            .get(index_name)
            .copied()
            .or(self.backend)
    }
}

/// Builder for EngineConfig
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn backend(mut self, backend: EngineBackend) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn index_backend(mut self, index_name: impl Into<String>, backend: EngineBackend) -> Self {
        self.config.index_backends.insert(index_name.into(), backend);
        self
    }

    pub fn elasticsearch(mut self, config: ElasticsearchConfig) -> Self {
        self.config.elasticsearch = config;
        self
    }

    pub fn elasticsearch_url(mut self, url: impl Into<String>) -> Self {
        self.config.elasticsearch.url = url.into();
        self
    }

    pub fn meilisearch(mut self, config: MeilisearchConfig) -> Self {
        self.config.meilisearch = config;
        self
    }

    pub fn meilisearch_url(mut self, url: impl Into<String>) -> Self {
        self.config.meilisearch.url = url.into();
        self
    }

    pub fn meilisearch_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.meilisearch.api_key = Some(api_key.into());
        self
    }

    pub fn default_page_size(mut self, size: usize) -> Self {
        self.config.default_page_size = size;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
