//! Qdrant vector store integration.

pub mod client;
pub mod payload;
pub mod types;

pub use client::{QdrantService, document_filter};
pub use payload::compute_chunk_hash;
pub use types::{DocumentPayload, PointInsert, QdrantError, ScoredPoint};
