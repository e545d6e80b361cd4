//! Mapping helpers between chunks, Qdrant points, and retrieved passages.

use crate::{
    processing::types::{PageChunk, RetrievedPassage},
    qdrant::{self, PointInsert, compute_chunk_hash},
};
use serde_json::Value;
use std::collections::HashSet;

/// Chunk text with its page and hash, ready for embedding.
#[derive(Debug, Clone)]
pub(crate) struct DocumentChunk {
    pub(crate) page: u32,
    pub(crate) text: String,
    pub(crate) chunk_hash: String,
}

impl DocumentChunk {
    pub(crate) fn into_point(self, vector: Vec<f32>) -> PointInsert {
        PointInsert {
            page: self.page,
            text: self.text,
            chunk_hash: self.chunk_hash,
            vector,
        }
    }
}

/// Remove duplicate chunks within a document, keeping the first occurrence.
pub(crate) fn dedupe_chunks(chunks: Vec<PageChunk>) -> (Vec<DocumentChunk>, usize) {
    let mut seen = HashSet::new();
    let mut prepared = Vec::new();
    let mut skipped = 0;

    for PageChunk { page, text } in chunks {
        if text.trim().is_empty() {
            continue;
        }
        let hash = compute_chunk_hash(&text);
        if seen.insert(hash.clone()) {
            prepared.push(DocumentChunk {
                page,
                text,
                chunk_hash: hash,
            });
        } else {
            skipped += 1;
        }
    }

    (prepared, skipped)
}

/// Map a scored point into a passage; points without text are dropped.
pub(crate) fn map_scored_point(point: qdrant::ScoredPoint) -> Option<RetrievedPassage> {
    let qdrant::ScoredPoint { score, payload, .. } = point;
    let mut payload = payload?;

    let text = match payload.remove("text") {
        Some(Value::String(value)) if !value.trim().is_empty() => value,
        _ => return None,
    };
    let page = payload
        .get("page")
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok());

    Some(RetrievedPassage { text, page, score })
}
