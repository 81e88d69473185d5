use std::time::Instant;

use tracing::info;

use crate::model::{RetrievedChunk, ValidationReport};
use crate::qdrant::{PAYLOAD_PAGE_TITLE, PAYLOAD_SECTION_HEADING, PAYLOAD_TEXT, PAYLOAD_URL};
use crate::util::preview;

/// Checks structural completeness and minimal relevance of assembled chunks.
/// Pure over its inputs; defects are recorded as issues, never raised.
pub fn validate_chunks(chunks: &[RetrievedChunk], query_text: &str) -> ValidationReport {
    let started = Instant::now();

    let mut issues = Vec::new();
    let mut valid = 0usize;
    let mut invalid = 0usize;

    for chunk in chunks {
        let missing = missing_metadata_fields(chunk);
        if missing.is_empty() {
            valid += 1;
        } else {
            invalid += 1;
            issues.push(format!(
                "chunk {} missing required metadata: {}",
                chunk.id,
                missing.join(", ")
            ));
        }
    }

    let metadata_integrity = invalid == 0;
    // Placeholder heuristic: a non-empty result set counts as relevant.
    let semantic_relevance = !chunks.is_empty();
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    let report = ValidationReport {
        success: issues.is_empty(),
        total: chunks.len(),
        valid,
        invalid,
        issues,
        metadata_integrity,
        semantic_relevance,
        elapsed_ms,
    };

    info!(
        query = %preview(query_text, 50),
        total = report.total,
        valid = report.valid,
        invalid = report.invalid,
        metadata_integrity = report.metadata_integrity,
        semantic_relevance = report.semantic_relevance,
        "validation completed"
    );
    report
}

/// A chunk is structurally complete when all indexed metadata fields carry
/// non-empty values; chunk_index is always present in the typed record, zero
/// included.
fn missing_metadata_fields(chunk: &RetrievedChunk) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if chunk.source_url.is_empty() {
        missing.push(PAYLOAD_URL);
    }
    if chunk.page_title.is_empty() {
        missing.push(PAYLOAD_PAGE_TITLE);
    }
    if chunk.section_heading.is_empty() {
        missing.push(PAYLOAD_SECTION_HEADING);
    }
    if chunk.text.is_empty() {
        missing.push(PAYLOAD_TEXT);
    }
    missing
}
