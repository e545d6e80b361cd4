//! Helpers for constructing and hashing Qdrant payloads.

use crate::qdrant::types::{DocumentPayload, PointInsert};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the payload object stored alongside each indexed chunk.
pub(crate) fn build_payload(
    point: &PointInsert,
    document: &DocumentPayload,
    timestamp_rfc3339: &str,
) -> Value {
    json!({
        "text": point.text,
        "page": point.page,
        "chunk_hash": point.chunk_hash,
        "document_id": document.document_id.to_string(),
        "source": document.source,
        "timestamp": timestamp_rfc3339,
    })
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub(crate) fn generate_point_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_hash_is_stable() {
        let h1 = compute_chunk_hash("Hello world");
        let h2 = compute_chunk_hash("Hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, compute_chunk_hash("Hello world!"));
    }

    #[test]
    fn timestamp_is_rfc3339_like() {
        let ts = current_timestamp_rfc3339();
        assert!(ts.contains('T') && ts.ends_with('Z'));
    }

    #[test]
    fn payload_carries_chunk_and_document_fields() {
        let document = DocumentPayload {
            document_id: Uuid::nil(),
            source: "manual.pdf".into(),
        };
        let point = PointInsert {
            page: 3,
            text: "sample".into(),
            chunk_hash: "abc123".into(),
            vector: vec![0.0; 4],
        };
        let payload = build_payload(&point, &document, "2025-01-01T00:00:00Z");

        assert_eq!(payload["text"], "sample");
        assert_eq!(payload["page"], 3);
        assert_eq!(payload["chunk_hash"], "abc123");
        assert_eq!(payload["document_id"], Uuid::nil().to_string());
        assert_eq!(payload["source"], "manual.pdf");
        assert_eq!(payload["timestamp"], "2025-01-01T00:00:00Z");
        assert!(payload.get("vector").is_none());
    }
}
