use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::error::{RetrievalError, RetrievalResult};
use crate::util::preview;

/// Payload field names are the index's external contract; they must match
/// what the ingestion side wrote.
pub const PAYLOAD_URL: &str = "url";
pub const PAYLOAD_PAGE_TITLE: &str = "page_title";
pub const PAYLOAD_SECTION_HEADING: &str = "section_heading";
pub const PAYLOAD_CHUNK_INDEX: &str = "chunk_index";
pub const PAYLOAD_TEXT: &str = "text";

/// Conjunction of equality conditions over payload fields, in the Qdrant
/// REST filter shape: `{"must": [{"key": ..., "match": {"value": ...}}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadFilter {
    must: Vec<FieldCondition>,
}

impl PayloadFilter {
    pub fn condition_count(&self) -> usize {
        self.must.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct FieldCondition {
    key: String,
    #[serde(rename = "match")]
    value_match: MatchValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct MatchValue {
    value: String,
}

fn equals_condition(key: &str, value: &str) -> FieldCondition {
    FieldCondition {
        key: key.to_string(),
        value_match: MatchValue {
            value: value.to_string(),
        },
    }
}

/// Builds the search predicate from the optional query constraints. Both
/// absent (or blank) means no filter at all; present values AND together.
pub fn build_payload_filter(
    source_url: Option<&str>,
    section_heading: Option<&str>,
) -> Option<PayloadFilter> {
    let mut conditions = Vec::new();

    if let Some(url) = source_url.map(str::trim).filter(|value| !value.is_empty()) {
        conditions.push(equals_condition(PAYLOAD_URL, url));
    }

    if let Some(section) = section_heading
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        conditions.push(equals_condition(PAYLOAD_SECTION_HEADING, section));
    }

    if conditions.is_empty() {
        None
    } else {
        Some(PayloadFilter { must: conditions })
    }
}

/// Qdrant point ids are either unsigned integers or UUID strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Integer(u64),
    Text(String),
}

impl PointId {
    pub fn canonical(&self) -> String {
        match self {
            Self::Integer(value) => value.to_string(),
            Self::Text(value) => value.clone(),
        }
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.canonical())
    }
}

/// One raw nearest-neighbor hit as returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredHit {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
}

/// Payload-only point from a scroll, used by the status command.
#[derive(Debug, Clone, Deserialize)]
pub struct SampledPoint {
    pub id: PointId,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub collection: String,
    pub status: String,
    pub points_count: u64,
    pub distance_metric: Option<String>,
    pub vector_size: Option<u64>,
}

/// Executes probes and top-k searches against the vector index. The
/// production implementation talks to Qdrant over REST; tests substitute an
/// in-memory index.
#[async_trait]
pub trait VectorSearchClient: Send + Sync {
    async fn collection_status(&self) -> RetrievalResult<CollectionStatus>;

    /// Top-k nearest neighbors, descending score. The score threshold
    /// excludes candidates before the top-k cut, so fewer than `top_k` hits
    /// may come back; `top_k` itself is never exceeded.
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        score_threshold: Option<f32>,
        filter: Option<&PayloadFilter>,
        with_vectors: bool,
    ) -> RetrievalResult<Vec<ScoredHit>>;

    async fn sample_points(&self, limit: usize) -> RetrievalResult<Vec<SampledPoint>>;
}

#[derive(Debug, Serialize)]
struct QueryPointsRequest<'a> {
    query: &'a [f32],
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    score_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a PayloadFilter>,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Debug, Serialize)]
struct ScrollRequest {
    limit: usize,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionInfoBody {
    status: String,
    #[serde(default)]
    points_count: Option<u64>,
    #[serde(default)]
    config: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct QueryPointsBody {
    points: Vec<ScoredHit>,
}

#[derive(Debug, Deserialize)]
struct ScrollBody {
    points: Vec<SampledPoint>,
}

/// Qdrant REST client scoped to one collection.
pub struct QdrantHttpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    timeout_secs: u64,
}

impl QdrantHttpClient {
    pub fn new(config: &RetrievalConfig) -> RetrievalResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| {
                RetrievalError::Configuration(format!("failed to build qdrant http client: {err}"))
            })?;

        Ok(Self {
            client,
            base_url: config.qdrant_url.clone(),
            api_key: config.qdrant_api_key.clone(),
            collection: config.collection_name.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.with_auth(self.client.get(format!("{}{path}", self.base_url)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.with_auth(self.client.post(format!("{}{path}", self.base_url)))
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(api_key) => request.header("api-key", api_key),
            None => request,
        }
    }

    fn unavailable(&self, reason: impl Into<String>) -> RetrievalError {
        RetrievalError::CollectionUnavailable {
            collection: self.collection.clone(),
            reason: reason.into(),
        }
    }

    fn map_search_transport_error(
        &self,
        operation: &'static str,
        err: reqwest::Error,
    ) -> RetrievalError {
        if err.is_timeout() {
            RetrievalError::Timeout {
                operation,
                limit_secs: self.timeout_secs,
            }
        } else {
            RetrievalError::Search(err.to_string())
        }
    }
}

#[async_trait]
impl VectorSearchClient for QdrantHttpClient {
    async fn collection_status(&self) -> RetrievalResult<CollectionStatus> {
        let response = self
            .get(&format!("/collections/{}", self.collection))
            .send()
            .await
            .map_err(|err| self.unavailable(err.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(self.unavailable("collection does not exist"));
        }
        if !response.status().is_success() {
            return Err(self.unavailable(format!(
                "collection probe returned HTTP {}",
                response.status()
            )));
        }

        let decoded: ApiEnvelope<CollectionInfoBody> = response
            .json()
            .await
            .map_err(|err| self.unavailable(format!("malformed collection info: {err}")))?;
        let info = decoded.result;

        let status = CollectionStatus {
            collection: self.collection.clone(),
            status: info.status,
            points_count: info.points_count.unwrap_or(0),
            distance_metric: info
                .config
                .pointer("/params/vectors/distance")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            vector_size: info
                .config
                .pointer("/params/vectors/size")
                .and_then(serde_json::Value::as_u64),
        };

        debug!(
            collection = %status.collection,
            status = %status.status,
            points = status.points_count,
            "collection probe completed"
        );
        Ok(status)
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        score_threshold: Option<f32>,
        filter: Option<&PayloadFilter>,
        with_vectors: bool,
    ) -> RetrievalResult<Vec<ScoredHit>> {
        let request = QueryPointsRequest {
            query: vector,
            limit: top_k,
            score_threshold,
            filter,
            with_payload: true,
            with_vector: with_vectors,
        };

        let response = self
            .post(&format!("/collections/{}/points/query", self.collection))
            .json(&request)
            .send()
            .await
            .map_err(|err| self.map_search_transport_error("similarity search", err))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Search(format!(
                "search backend returned HTTP {status}: {}",
                preview(&body, 200)
            )));
        }

        let decoded: ApiEnvelope<QueryPointsBody> = response
            .json()
            .await
            .map_err(|err| RetrievalError::Search(format!("malformed search response: {err}")))?;

        let mut hits = decoded.result.points;
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn sample_points(&self, limit: usize) -> RetrievalResult<Vec<SampledPoint>> {
        let request = ScrollRequest {
            limit,
            with_payload: true,
            with_vector: false,
        };

        let response = self
            .post(&format!("/collections/{}/points/scroll", self.collection))
            .json(&request)
            .send()
            .await
            .map_err(|err| self.map_search_transport_error("point scroll", err))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(RetrievalError::Search(format!(
                "scroll returned HTTP {status}"
            )));
        }

        let decoded: ApiEnvelope<ScrollBody> = response
            .json()
            .await
            .map_err(|err| RetrievalError::Search(format!("malformed scroll response: {err}")))?;
        Ok(decoded.result.points)
    }
}
