use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::error::{RetrievalError, RetrievalResult};
use crate::util::preview;

/// Asymmetric encoding mode for queries; indexed documents were embedded
/// with the matching document mode, so this must not change independently.
const QUERY_INPUT_TYPE: &str = "search_query";

/// Turns query text into a fixed-dimension vector. The production
/// implementation calls the Cohere embed API; tests substitute an in-memory
/// embedder.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> RetrievalResult<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: Vec<&'a str>,
    model: &'a str,
    input_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Cohere REST embedding client. The model id must be the one the index was
/// built with; a mismatch degrades search quality silently, so it is part of
/// the validated configuration rather than a per-call parameter.
pub struct CohereEmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl CohereEmbeddingClient {
    pub fn new(config: &RetrievalConfig) -> RetrievalResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| {
                RetrievalError::Configuration(format!(
                    "failed to build embedding http client: {err}"
                ))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/embed", config.cohere_api_url),
            api_key: config.cohere_api_key.clone(),
            model: config.embedding_model.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> RetrievalError {
        if err.is_timeout() {
            RetrievalError::Timeout {
                operation: "embedding request",
                limit_secs: self.timeout_secs,
            }
        } else {
            RetrievalError::Embedding(err.to_string())
        }
    }
}

#[async_trait]
impl QueryEmbedder for CohereEmbeddingClient {
    async fn embed_query(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        let request = EmbedRequest {
            texts: vec![text],
            model: &self.model,
            input_type: QUERY_INPUT_TYPE,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|err| self.map_transport_error(err))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Embedding(format!(
                "embedding backend returned HTTP {status}: {}",
                preview(&body, 200)
            )));
        }

        let decoded: EmbedResponse = response.json().await.map_err(|err| {
            RetrievalError::Embedding(format!("malformed embedding response: {err}"))
        })?;

        let embedding = decoded.embeddings.into_iter().next().ok_or_else(|| {
            RetrievalError::Embedding("embedding backend returned no vectors".to_string())
        })?;
        if embedding.is_empty() {
            return Err(RetrievalError::Embedding(
                "embedding backend returned an empty vector".to_string(),
            ));
        }

        debug!(
            model = %self.model,
            dimensions = embedding.len(),
            query = %preview(text, 50),
            "generated query embedding"
        );
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::{EmbedRequest, EmbedResponse, QUERY_INPUT_TYPE};

    #[test]
    fn embed_request_serializes_to_the_cohere_wire_shape() {
        let request = EmbedRequest {
            texts: vec!["What is physical AI?"],
            model: "embed-english-v3.0",
            input_type: QUERY_INPUT_TYPE,
        };

        let encoded = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(
            encoded,
            serde_json::json!({
                "texts": ["What is physical AI?"],
                "model": "embed-english-v3.0",
                "input_type": "search_query",
            })
        );
    }

    #[test]
    fn embed_response_decodes_first_vector() {
        let raw = r#"{"id":"r-1","embeddings":[[0.1,0.2,0.3]],"meta":{"api_version":{"version":"1"}}}"#;
        let decoded: EmbedResponse = serde_json::from_str(raw).expect("response should decode");
        assert_eq!(decoded.embeddings.len(), 1);
        assert_eq!(decoded.embeddings[0], vec![0.1, 0.2, 0.3]);
    }
}
