use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::assemble::{payload_index, payload_text};
use crate::cli::StatusArgs;
use crate::config::RetrievalConfig;
use crate::qdrant::{
    CollectionStatus, PAYLOAD_CHUNK_INDEX, PAYLOAD_PAGE_TITLE, PAYLOAD_SECTION_HEADING,
    PAYLOAD_TEXT, PAYLOAD_URL, QdrantHttpClient, SampledPoint, VectorSearchClient,
};
use crate::util::{now_utc_string, preview};

const SAMPLE_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Serialize)]
struct SampleRecord {
    id: String,
    url: String,
    page_title: String,
    section_heading: String,
    chunk_index: u64,
    text_preview: String,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    generated_at: String,
    collection: CollectionStatus,
    samples: Vec<SampleRecord>,
}

pub async fn run(args: StatusArgs) -> Result<()> {
    let config = RetrievalConfig::from_env()?;
    let client = QdrantHttpClient::new(&config)?;

    info!(collection = %config.collection_name, "status requested");

    let collection = client.collection_status().await?;
    let samples = if collection.points_count > 0 && args.samples > 0 {
        client.sample_points(args.samples).await?
    } else {
        Vec::new()
    };

    let report = StatusReport {
        generated_at: now_utc_string(),
        collection,
        samples: samples.into_iter().map(to_sample_record).collect(),
    };

    info!(
        status = %report.collection.status,
        points = report.collection.points_count,
        samples = report.samples.len(),
        "collection status loaded"
    );

    if args.json {
        write_json_report(&report)
    } else {
        write_text_report(&report)
    }
}

fn to_sample_record(point: SampledPoint) -> SampleRecord {
    SampleRecord {
        id: point.id.canonical(),
        url: payload_text(&point.payload, PAYLOAD_URL),
        page_title: payload_text(&point.payload, PAYLOAD_PAGE_TITLE),
        section_heading: payload_text(&point.payload, PAYLOAD_SECTION_HEADING),
        chunk_index: payload_index(&point.payload, PAYLOAD_CHUNK_INDEX),
        text_preview: preview(
            &payload_text(&point.payload, PAYLOAD_TEXT),
            SAMPLE_PREVIEW_CHARS,
        ),
    }
}

fn write_json_report(report: &StatusReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, report)
        .context("failed to serialize status json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_report(report: &StatusReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Collection: {}", report.collection.collection)?;
    writeln!(
        output,
        "Status: {} points={} metric={} vector_size={}",
        report.collection.status,
        report.collection.points_count,
        report.collection.distance_metric.as_deref().unwrap_or("unknown"),
        report
            .collection
            .vector_size
            .map(|size| size.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    )?;
    writeln!(output, "Samples: {}", report.samples.len())?;

    for (index, sample) in report.samples.iter().enumerate() {
        writeln!(output, "{}.\tid={}", index + 1, sample.id)?;
        writeln!(output, "\turl: {}", sample.url)?;
        writeln!(output, "\ttitle: {}", sample.page_title)?;
        writeln!(
            output,
            "\tsection: {} (chunk {})",
            sample.section_heading, sample.chunk_index
        )?;
        writeln!(output, "\tpreview: {}", sample.text_preview)?;
    }

    output.flush()?;
    Ok(())
}
