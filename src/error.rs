use thiserror::Error;

/// Failure kinds that abort a retrieval. Validation findings are not errors;
/// they travel as data inside `ValidationReport`.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("collection '{collection}' is unavailable: {reason}")]
    CollectionUnavailable { collection: String, reason: String },

    #[error("embedding request failed: {0}")]
    Embedding(String),

    #[error("similarity search failed: {0}")]
    Search(String),

    #[error("{operation} timed out after {limit_secs}s")]
    Timeout {
        operation: &'static str,
        limit_secs: u64,
    },
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;
