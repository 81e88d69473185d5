use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::QueryArgs;
use crate::config::RetrievalConfig;
use crate::embedding::CohereEmbeddingClient;
use crate::model::{QueryOutcome, SearchQuery};
use crate::pipeline::RetrievalPipeline;
use crate::qdrant::QdrantHttpClient;
use crate::util::preview;

const DEFAULT_QUERY_TEXT: &str = "What is physical AI and humanoid robotics?";
const TEXT_PREVIEW_CHARS: usize = 200;

pub async fn run(args: QueryArgs) -> Result<()> {
    let config = RetrievalConfig::from_env()?;

    let query_text = if args.query.is_empty() {
        DEFAULT_QUERY_TEXT.to_string()
    } else {
        args.query.join(" ")
    };

    let query = SearchQuery::new(
        query_text,
        args.top_k.unwrap_or(config.default_top_k),
        args.score_threshold.or(config.default_score_threshold),
        args.source_url.clone(),
        args.section.clone(),
        args.metric.to_metric(),
    )?;

    info!(
        query = %preview(&query.text, 50),
        top_k = query.top_k,
        score_threshold = ?query.score_threshold,
        source_filter = ?query.filter_by_source,
        section_filter = ?query.filter_by_section,
        collection = %config.collection_name,
        "query requested"
    );

    let embedder = CohereEmbeddingClient::new(&config)?;
    let search_client = QdrantHttpClient::new(&config)?;
    let pipeline = RetrievalPipeline::new(embedder, search_client).with_vectors(args.with_vectors);

    let outcome = pipeline.run(&query).await?;

    if args.json {
        write_json_output(&outcome)
    } else {
        write_text_output(&outcome)
    }
}

fn write_json_output(outcome: &QueryOutcome) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, outcome)
        .context("failed to serialize query json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_output(outcome: &QueryOutcome) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Query: {}", outcome.query.text)?;
    writeln!(
        output,
        "Parameters: top_k={} score_threshold={} metric={} source_filter={} section_filter={}",
        outcome.query.top_k,
        outcome
            .query
            .score_threshold
            .map(|threshold| format!("{threshold:.2}"))
            .unwrap_or_else(|| "none".to_string()),
        outcome.query.distance_metric.as_str(),
        outcome.query.filter_by_source.as_deref().unwrap_or("none"),
        outcome.query.filter_by_section.as_deref().unwrap_or("none"),
    )?;
    writeln!(output, "Results: {}", outcome.chunks.len())?;

    for (index, chunk) in outcome.chunks.iter().enumerate() {
        let source_url = if chunk.source_url.is_empty() {
            "(no url)"
        } else {
            &chunk.source_url
        };

        writeln!(
            output,
            "{}.\t{}\tscore={:.4}",
            index + 1,
            source_url,
            chunk.similarity_score
        )?;
        writeln!(
            output,
            "\tsection: {} (chunk {})",
            if chunk.section_heading.is_empty() {
                "(no heading)"
            } else {
                &chunk.section_heading
            },
            chunk.chunk_index
        )?;
        writeln!(output, "\ttitle: {}", chunk.page_title)?;
        writeln!(output, "\tchunk_id: {}", chunk.id)?;
        writeln!(
            output,
            "\tpreview: {}",
            preview(&chunk.text, TEXT_PREVIEW_CHARS)
        )?;
    }

    let report = &outcome.report;
    writeln!(
        output,
        "Validation: success={} total={} valid={} invalid={} metadata_integrity={} semantic_relevance={} elapsed_ms={:.3}",
        report.success,
        report.total,
        report.valid,
        report.invalid,
        report.metadata_integrity,
        report.semantic_relevance,
        report.elapsed_ms,
    )?;
    for issue in &report.issues {
        writeln!(output, "\tissue: {issue}")?;
    }

    writeln!(output, "Trace:")?;
    for line in &outcome.trace {
        writeln!(output, "\t{line}")?;
    }

    output.flush()?;
    Ok(())
}
