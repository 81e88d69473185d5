use crate::error::{RetrievalError, RetrievalResult};
use crate::model::MAX_TOP_K;

pub const DEFAULT_COHERE_API_URL: &str = "https://api.cohere.ai";
pub const DEFAULT_EMBEDDING_MODEL: &str = "embed-english-v3.0";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Validated configuration, built once in `main` and passed explicitly into
/// every component. No other code reads the environment.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub collection_name: String,
    pub cohere_api_key: String,
    pub cohere_api_url: String,
    pub embedding_model: String,
    pub default_top_k: usize,
    pub default_score_threshold: Option<f32>,
    pub request_timeout_secs: u64,
}

impl RetrievalConfig {
    pub fn from_env() -> RetrievalResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> RetrievalResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let qdrant_url = required(&lookup, "QDRANT_URL")?;
        let collection_name = required(&lookup, "QDRANT_COLLECTION_NAME")?;
        let cohere_api_key = required(&lookup, "COHERE_API_KEY")?;

        let default_top_k = match optional(&lookup, "DEFAULT_TOP_K") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|value| (1..=MAX_TOP_K).contains(value))
                .ok_or_else(|| {
                    RetrievalError::Configuration(format!(
                        "DEFAULT_TOP_K must be an integer in [1, {MAX_TOP_K}], got '{raw}'"
                    ))
                })?,
            None => DEFAULT_TOP_K,
        };

        let default_score_threshold = match optional(&lookup, "DEFAULT_SCORE_THRESHOLD") {
            Some(raw) => Some(
                raw.parse::<f32>()
                    .ok()
                    .filter(|value| (0.0..=1.0).contains(value))
                    .ok_or_else(|| {
                        RetrievalError::Configuration(format!(
                            "DEFAULT_SCORE_THRESHOLD must be a float in [0, 1], got '{raw}'"
                        ))
                    })?,
            ),
            None => None,
        };

        let request_timeout_secs = match optional(&lookup, "REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or_else(|| {
                    RetrievalError::Configuration(format!(
                        "REQUEST_TIMEOUT_SECS must be a positive integer, got '{raw}'"
                    ))
                })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            qdrant_url: qdrant_url.trim_end_matches('/').to_string(),
            qdrant_api_key: optional(&lookup, "QDRANT_API_KEY"),
            collection_name,
            cohere_api_key,
            cohere_api_url: optional(&lookup, "COHERE_API_URL")
                .unwrap_or_else(|| DEFAULT_COHERE_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            embedding_model: optional(&lookup, "EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            default_top_k,
            default_score_threshold,
            request_timeout_secs,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> RetrievalResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| {
        RetrievalError::Configuration(format!("{key} environment variable is required"))
    })
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
