use serde::Serialize;

use crate::error::{RetrievalError, RetrievalResult};

pub const MAX_TOP_K: usize = 100;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    Dot,
}

impl DistanceMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::Dot => "dot",
        }
    }

    /// Compares against the metric label a collection probe reports
    /// (Qdrant uses "Cosine", "Euclid"/"Euclidean", "Dot").
    pub fn matches_backend_label(self, label: &str) -> bool {
        let label = label.trim().to_ascii_lowercase();
        match self {
            Self::Cosine => label == "cosine",
            Self::Euclidean => label == "euclid" || label == "euclidean",
            Self::Dot => label == "dot",
        }
    }
}

/// One retrieval request. Immutable once constructed; the constructor is the
/// only place parameters are validated.
#[derive(Debug, Clone, Serialize)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
    pub score_threshold: Option<f32>,
    pub filter_by_source: Option<String>,
    pub filter_by_section: Option<String>,
    pub distance_metric: DistanceMetric,
}

impl SearchQuery {
    pub fn new(
        text: impl Into<String>,
        top_k: usize,
        score_threshold: Option<f32>,
        filter_by_source: Option<String>,
        filter_by_section: Option<String>,
        distance_metric: DistanceMetric,
    ) -> RetrievalResult<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(RetrievalError::Configuration(
                "query text must not be empty".to_string(),
            ));
        }

        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(RetrievalError::Configuration(format!(
                "top_k must be in [1, {MAX_TOP_K}], got {top_k}"
            )));
        }

        if let Some(threshold) = score_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(RetrievalError::Configuration(format!(
                    "score_threshold must be in [0, 1], got {threshold}"
                )));
            }
        }

        Ok(Self {
            text,
            top_k,
            score_threshold,
            filter_by_source: normalize_filter(filter_by_source),
            filter_by_section: normalize_filter(filter_by_section),
            distance_metric,
        })
    }
}

fn normalize_filter(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// A chunk of indexed book content reconstructed from one search hit.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub source_url: String,
    pub page_title: String,
    pub section_heading: String,
    pub chunk_index: u64,
    pub text: String,
    pub similarity_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// Outcome of validating a chunk sequence. `valid + invalid == total` and
/// `success == issues.is_empty()` always hold.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub success: bool,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub issues: Vec<String>,
    pub metadata_integrity: bool,
    pub semantic_relevance: bool,
    pub elapsed_ms: f64,
}

/// Everything one pipeline invocation produces. Transient, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub query: SearchQuery,
    pub chunks: Vec<RetrievedChunk>,
    pub report: ValidationReport,
    pub trace: Vec<String>,
}
