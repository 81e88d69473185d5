use std::time::Instant;

use tracing::{info, warn};

use crate::assemble::assemble_chunks;
use crate::embedding::QueryEmbedder;
use crate::error::RetrievalResult;
use crate::model::{QueryOutcome, SearchQuery};
use crate::qdrant::{VectorSearchClient, build_payload_filter};
use crate::util::preview;
use crate::validation::validate_chunks;

/// Sequences one retrieval: probe, embed, filter, search, assemble,
/// validate. Each step is a hard dependency on the previous one; the first
/// failure aborts the run with its error kind intact. Holds no state across
/// invocations.
pub struct RetrievalPipeline<E, S> {
    embedder: E,
    search_client: S,
    with_vectors: bool,
}

impl<E, S> RetrievalPipeline<E, S>
where
    E: QueryEmbedder,
    S: VectorSearchClient,
{
    pub fn new(embedder: E, search_client: S) -> Self {
        Self {
            embedder,
            search_client,
            with_vectors: false,
        }
    }

    pub fn with_vectors(mut self, with_vectors: bool) -> Self {
        self.with_vectors = with_vectors;
        self
    }

    pub async fn run(&self, query: &SearchQuery) -> RetrievalResult<QueryOutcome> {
        let mut trace = Vec::new();

        let status = self.search_client.collection_status().await?;
        trace.push(format!(
            "collection '{}' reachable: status={}, points={}",
            status.collection, status.status, status.points_count
        ));
        if let Some(metric) = status.distance_metric.as_deref() {
            if !query.distance_metric.matches_backend_label(metric) {
                warn!(
                    requested = query.distance_metric.as_str(),
                    collection_metric = metric,
                    "collection is configured with a different distance metric"
                );
                trace.push(format!(
                    "metric mismatch: query requested {}, collection reports {metric}",
                    query.distance_metric.as_str()
                ));
            }
        }

        let embed_started = Instant::now();
        let embedding = self.embedder.embed_query(&query.text).await?;
        trace.push(format!(
            "embedded query into {} dimensions in {:.1} ms",
            embedding.len(),
            elapsed_ms(embed_started)
        ));

        let filter = build_payload_filter(
            query.filter_by_source.as_deref(),
            query.filter_by_section.as_deref(),
        );
        trace.push(match &filter {
            Some(filter) => format!("payload filter with {} condition(s)", filter.condition_count()),
            None => "no payload filter".to_string(),
        });

        let search_started = Instant::now();
        let hits = self
            .search_client
            .search(
                &embedding,
                query.top_k,
                query.score_threshold,
                filter.as_ref(),
                self.with_vectors,
            )
            .await?;
        trace.push(format!(
            "similarity search returned {} hit(s) in {:.1} ms",
            hits.len(),
            elapsed_ms(search_started)
        ));

        let chunks = assemble_chunks(hits);
        trace.push(format!("assembled {} chunk(s)", chunks.len()));

        let report = validate_chunks(&chunks, &query.text);
        trace.push(format!(
            "validation: {} valid, {} invalid in {:.1} ms",
            report.valid, report.invalid, report.elapsed_ms
        ));

        info!(
            query = %preview(&query.text, 50),
            results = chunks.len(),
            validation_success = report.success,
            "retrieval pipeline completed"
        );

        Ok(QueryOutcome {
            query: query.clone(),
            chunks,
            report,
            trace,
        })
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{Map, Value, json};

    use super::RetrievalPipeline;
    use crate::embedding::QueryEmbedder;
    use crate::error::{RetrievalError, RetrievalResult};
    use crate::model::{DistanceMetric, SearchQuery};
    use crate::qdrant::{
        CollectionStatus, PayloadFilter, PointId, SampledPoint, ScoredHit, VectorSearchClient,
    };

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueryEmbedder for &CountingEmbedder {
        async fn embed_query(&self, _text: &str) -> RetrievalResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.1, 0.2, 0.3, 0.4])
        }
    }

    /// In-memory index. Applies the score threshold before the top-k cut,
    /// like the Qdrant REST query API.
    struct FakeIndex {
        available: bool,
        points: Vec<(u64, f32, Value)>,
        observed_filters: Mutex<Vec<Option<PayloadFilter>>>,
    }

    impl FakeIndex {
        fn with_points(points: Vec<(u64, f32, Value)>) -> Self {
            Self {
                available: true,
                points,
                observed_filters: Mutex::new(Vec::new()),
            }
        }

        fn missing() -> Self {
            Self {
                available: false,
                points: Vec::new(),
                observed_filters: Mutex::new(Vec::new()),
            }
        }
    }

    fn payload_from(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object payload, got {other}"),
        }
    }

    #[async_trait]
    impl VectorSearchClient for &FakeIndex {
        async fn collection_status(&self) -> RetrievalResult<CollectionStatus> {
            if !self.available {
                return Err(RetrievalError::CollectionUnavailable {
                    collection: "book_content_chunks".to_string(),
                    reason: "collection does not exist".to_string(),
                });
            }
            Ok(CollectionStatus {
                collection: "book_content_chunks".to_string(),
                status: "green".to_string(),
                points_count: self.points.len() as u64,
                distance_metric: Some("Cosine".to_string()),
                vector_size: Some(4),
            })
        }

        async fn search(
            &self,
            _vector: &[f32],
            top_k: usize,
            score_threshold: Option<f32>,
            filter: Option<&PayloadFilter>,
            _with_vectors: bool,
        ) -> RetrievalResult<Vec<ScoredHit>> {
            self.observed_filters
                .lock()
                .expect("filter log should lock")
                .push(filter.cloned());

            let mut candidates: Vec<&(u64, f32, Value)> = self
                .points
                .iter()
                .filter(|(_, score, _)| score_threshold.is_none_or(|threshold| *score >= threshold))
                .collect();
            candidates.sort_by(|left, right| right.1.total_cmp(&left.1));
            candidates.truncate(top_k);

            Ok(candidates
                .into_iter()
                .map(|(id, score, payload)| ScoredHit {
                    id: PointId::Integer(*id),
                    score: *score,
                    payload: payload_from(payload.clone()),
                    vector: None,
                })
                .collect())
        }

        async fn sample_points(&self, limit: usize) -> RetrievalResult<Vec<SampledPoint>> {
            Ok(self
                .points
                .iter()
                .take(limit)
                .map(|(id, _, payload)| SampledPoint {
                    id: PointId::Integer(*id),
                    payload: payload_from(payload.clone()),
                })
                .collect())
        }
    }

    fn well_formed_point(id: u64, score: f32) -> (u64, f32, Value) {
        (
            id,
            score,
            json!({
                "url": format!("https://book.example.com/ch{id}"),
                "page_title": "Physical AI",
                "section_heading": format!("Section {id}"),
                "chunk_index": id,
                "text": "Physical AI systems act in the real world.",
            }),
        )
    }

    fn query(top_k: usize, score_threshold: Option<f32>) -> SearchQuery {
        SearchQuery::new(
            "What is physical AI?",
            top_k,
            score_threshold,
            None,
            None,
            DistanceMetric::Cosine,
        )
        .expect("query should construct")
    }

    #[tokio::test]
    async fn returns_top_k_valid_chunks_from_a_well_formed_collection() {
        let points = (1..=10)
            .map(|id| well_formed_point(id, 0.3 + 0.05 * id as f32))
            .collect();
        let index = FakeIndex::with_points(points);
        let embedder = CountingEmbedder::new();
        let pipeline = RetrievalPipeline::new(&embedder, &index);

        let outcome = pipeline
            .run(&query(5, None))
            .await
            .expect("pipeline should succeed");

        assert_eq!(outcome.chunks.len(), 5);
        assert!(outcome.report.success);
        assert_eq!(outcome.report.invalid, 0);
        assert_eq!(embedder.call_count(), 1);
    }

    #[tokio::test]
    async fn score_threshold_limits_results_below_top_k() {
        let mut points: Vec<_> = (1..=8).map(|id| well_formed_point(id, 0.5)).collect();
        points.push(well_formed_point(9, 0.95));
        points.push(well_formed_point(10, 0.92));
        let index = FakeIndex::with_points(points);
        let embedder = CountingEmbedder::new();
        let pipeline = RetrievalPipeline::new(&embedder, &index);

        let outcome = pipeline
            .run(&query(5, Some(0.9)))
            .await
            .expect("pipeline should succeed");

        assert_eq!(outcome.chunks.len(), 2);
        assert!(
            outcome
                .chunks
                .iter()
                .all(|chunk| chunk.similarity_score >= 0.9)
        );
    }

    #[tokio::test]
    async fn scores_are_non_increasing_and_bounded_by_top_k() {
        let points = (1..=20)
            .map(|id| well_formed_point(id, (id as f32) / 25.0))
            .collect();
        let index = FakeIndex::with_points(points);
        let embedder = CountingEmbedder::new();
        let pipeline = RetrievalPipeline::new(&embedder, &index);

        let outcome = pipeline
            .run(&query(7, None))
            .await
            .expect("pipeline should succeed");

        assert!(outcome.chunks.len() <= 7);
        let scores: Vec<f32> = outcome
            .chunks
            .iter()
            .map(|chunk| chunk.similarity_score)
            .collect();
        assert!(
            scores.windows(2).all(|pair| pair[0] >= pair[1]),
            "scores should be non-increasing: {scores:?}"
        );
    }

    #[tokio::test]
    async fn incomplete_payload_is_assembled_but_flagged_by_validation() {
        let mut degraded = well_formed_point(2, 0.8);
        degraded
            .2
            .as_object_mut()
            .expect("payload should be an object")
            .remove("section_heading");
        let index = FakeIndex::with_points(vec![well_formed_point(1, 0.9), degraded]);
        let embedder = CountingEmbedder::new();
        let pipeline = RetrievalPipeline::new(&embedder, &index);

        let outcome = pipeline
            .run(&query(5, None))
            .await
            .expect("pipeline should succeed");

        assert_eq!(outcome.chunks.len(), 2);
        assert_eq!(outcome.chunks[1].section_heading, "");
        assert!(!outcome.report.success);
        assert_eq!(outcome.report.invalid, 1);
        assert!(outcome.report.issues[0].contains("2"));
        assert!(outcome.report.issues[0].contains("section_heading"));
    }

    #[tokio::test]
    async fn missing_collection_aborts_before_any_embedding_call() {
        let index = FakeIndex::missing();
        let embedder = CountingEmbedder::new();
        let pipeline = RetrievalPipeline::new(&embedder, &index);

        let error = pipeline
            .run(&query(5, None))
            .await
            .expect_err("pipeline should fail");

        assert!(
            matches!(error, RetrievalError::CollectionUnavailable { .. }),
            "unexpected error kind: {error}"
        );
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_collection_yields_successful_but_irrelevant_verdict() {
        let index = FakeIndex::with_points(Vec::new());
        let embedder = CountingEmbedder::new();
        let pipeline = RetrievalPipeline::new(&embedder, &index);

        let outcome = pipeline
            .run(&query(5, None))
            .await
            .expect("pipeline should succeed");

        assert!(outcome.chunks.is_empty());
        assert!(outcome.report.success);
        assert!(outcome.report.metadata_integrity);
        assert!(!outcome.report.semantic_relevance);
    }

    #[tokio::test]
    async fn query_filters_are_passed_to_the_search_backend() {
        let index = FakeIndex::with_points(vec![well_formed_point(1, 0.9)]);
        let embedder = CountingEmbedder::new();
        let pipeline = RetrievalPipeline::new(&embedder, &index);

        let filtered_query = SearchQuery::new(
            "actuators",
            5,
            None,
            Some("https://book.example.com/ch1".to_string()),
            Some("Section 1".to_string()),
            DistanceMetric::Cosine,
        )
        .expect("query should construct");

        pipeline
            .run(&filtered_query)
            .await
            .expect("pipeline should succeed");

        let observed = index
            .observed_filters
            .lock()
            .expect("filter log should lock");
        assert_eq!(observed.len(), 1);
        let filter = observed[0].as_ref().expect("filter should be present");
        assert_eq!(filter.condition_count(), 2);
    }

    #[tokio::test]
    async fn trace_reports_counts_for_every_stage() {
        let index = FakeIndex::with_points(vec![well_formed_point(1, 0.9)]);
        let embedder = CountingEmbedder::new();
        let pipeline = RetrievalPipeline::new(&embedder, &index);

        let outcome = pipeline
            .run(&query(5, None))
            .await
            .expect("pipeline should succeed");

        assert!(outcome.trace.iter().any(|line| line.contains("reachable")));
        assert!(outcome.trace.iter().any(|line| line.contains("embedded")));
        assert!(outcome.trace.iter().any(|line| line.contains("filter")));
        assert!(outcome.trace.iter().any(|line| line.contains("search")));
        assert!(outcome.trace.iter().any(|line| line.contains("assembled")));
        assert!(outcome.trace.iter().any(|line| line.contains("validation")));
    }
}
