//! Error types for search operations

/// Result type for engine operations
pub type SearchEngineResult<T> = std::result::Result<T, SearchEngineError>;

/// Result type for transport calls
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors raised while converting a document into its backend representation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    /// The document has no usable logical `id`
    #[error("Document has no logical `id` field")]
    MissingId,

    /// A field holds a value that cannot be stored
    #[error("Field `{field}` cannot be encoded: {reason}")]
    UnencodableValue { field: String, reason: String },
}

/// Errors surfaced by the engine facade
///
/// Every backend failure is reported through one of these variants, with the
/// underlying transport error kept as the source.
#[derive(Debug, thiserror::Error)]
pub enum SearchEngineError {
    /// Document encoding failed before anything was written
    #[error("Document encoding failed: {0}")]
    Encode(#[from] EncodeError),

    /// Bulk or single document write failed
    #[error("Indexing failed for {} document(s): {message}", .failed_ids.len())]
    Index {
        message: String,
        failed_ids: Vec<String>,
        #[source]
        source: Option<TransportError>,
    },

    /// Document deletion failed
    #[error("Removal failed for {} document(s): {message}", .failed_ids.len())]
    Remove {
        message: String,
        failed_ids: Vec<String>,
        #[source]
        source: Option<TransportError>,
    },

    /// Query translation or execution failed
    #[error("Search failed: {message}")]
    Search {
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// No usable backend for the requested index
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SearchEngineError {
    /// Search failure caused by the backend
    pub fn search(message: impl Into<String>, source: TransportError) -> Self {
        SearchEngineError::Search {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Search failure detected before anything was sent
    pub fn invalid_query(message: impl Into<String>) -> Self {
        SearchEngineError::Search {
            message: message.into(),
            source: None,
        }
    }

    /// Logical ids that the backend reported as failed, if any
    pub fn failed_ids(&self) -> &[String] {
        match self {
            SearchEngineError::Index { failed_ids, .. }
            | SearchEngineError::Remove { failed_ids, .. } => failed_ids,
            _ => &[],
        }
    }

    /// True when the root cause is a transport timeout
    pub fn is_timeout(&self) -> bool {
        let source = match self {
            SearchEngineError::Index { source, .. }
            | SearchEngineError::Remove { source, .. }
            | SearchEngineError::Search { source, .. } => source.as_ref(),
            _ => None,
        };
        matches!(source, Some(TransportError::Timeout(_)))
    }
}

/// Errors raised by a backend transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The backend could not be reached
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The backend answered with a non-success status
    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend answered with something we cannot interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A request or response body could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An asynchronous backend task failed
    #[error("Backend task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else if err.is_decode() {
            TransportError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            TransportError::Connection(err.to_string())
        }
    }
}
