use serde_json::{Map, Value};

use crate::model::RetrievedChunk;
use crate::qdrant::{
    PAYLOAD_CHUNK_INDEX, PAYLOAD_PAGE_TITLE, PAYLOAD_SECTION_HEADING, PAYLOAD_TEXT, PAYLOAD_URL,
    ScoredHit,
};

/// Maps raw hits into typed chunks, preserving the backend's ranking order.
/// Absent payload fields are defaulted rather than rejected; metadata gaps
/// are the validator's concern, not the assembler's.
pub fn assemble_chunks(hits: Vec<ScoredHit>) -> Vec<RetrievedChunk> {
    hits.into_iter().map(assemble_chunk).collect()
}

fn assemble_chunk(hit: ScoredHit) -> RetrievedChunk {
    RetrievedChunk {
        id: hit.id.canonical(),
        source_url: payload_text(&hit.payload, PAYLOAD_URL),
        page_title: payload_text(&hit.payload, PAYLOAD_PAGE_TITLE),
        section_heading: payload_text(&hit.payload, PAYLOAD_SECTION_HEADING),
        chunk_index: payload_index(&hit.payload, PAYLOAD_CHUNK_INDEX),
        text: payload_text(&hit.payload, PAYLOAD_TEXT),
        similarity_score: hit.score,
        vector: hit.vector,
    }
}

pub(crate) fn payload_text(payload: &Map<String, Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn payload_index(payload: &Map<String, Value>, key: &str) -> u64 {
    payload.get(key).and_then(Value::as_u64).unwrap_or(0)
}
