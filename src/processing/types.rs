//! Core data types and error definitions for the question-answering pipeline.

use crate::{
    embedding::EmbeddingClientError, generation::GenerationError, pdf::PdfError,
    qdrant::QdrantError,
};
use anyhow::Error as TokenizerError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::question::QuestionError;

/// Errors produced while turning page text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible window.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources were unavailable.
    #[error("failed to initialize tokenizer '{encoding}': {source}")]
    Tokenizer {
        /// Encoding we attempted to load.
        encoding: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors emitted by the upload and question pipelines.
#[derive(Debug, Error)]
pub enum QaError {
    /// The upload was rejected before processing (wrong content type, missing part).
    #[error("{0}")]
    InvalidUpload(String),
    /// The upload exceeded the configured body limit.
    #[error("{0}")]
    UploadTooLarge(String),
    /// A question arrived before any document was indexed.
    #[error("No document uploaded yet.")]
    NoDocument,
    /// The question failed validation.
    #[error(transparent)]
    Question(#[from] QuestionError),
    /// Upload could not be written to disk.
    #[error("Failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
    /// Text extraction failed.
    #[error(transparent)]
    Pdf(#[from] PdfError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Qdrant interaction failed.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// The generation model failed to answer.
    #[error("Failed to generate answer: {0}")]
    Generation(#[from] GenerationError),
}

/// A chunk of page text before hashing and embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageChunk {
    /// 1-based page the chunk was cut from.
    pub page: u32,
    /// Chunk text.
    pub text: String,
}

/// The document currently backing answers.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveDocument {
    /// Identifier stamped on every indexed point.
    pub document_id: Uuid,
    /// Client-supplied file name.
    pub file_name: String,
    /// Number of pages that yielded text.
    pub pages: usize,
    /// Number of chunks indexed.
    pub chunks: usize,
}

/// Summary of a completed upload.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The document now backing answers.
    pub document: ActiveDocument,
    /// Window size used while chunking.
    pub chunk_size: usize,
    /// Chunks dropped because an identical chunk was already present.
    pub skipped_duplicates: usize,
}

/// Passage returned by similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedPassage {
    /// Chunk text.
    pub text: String,
    /// Page the chunk came from, when recorded.
    pub page: Option<u32>,
    /// Similarity score reported by Qdrant.
    pub score: f32,
}

/// Answer to a question together with the passages it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Model output.
    pub text: String,
    /// Retrieved passages in rank order.
    pub sources: Vec<RetrievedPassage>,
}

/// Reachability snapshot used by the health endpoint.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    /// Whether Qdrant answered a collection listing.
    pub qdrant_reachable: bool,
    /// Whether the configured collection exists.
    pub collection_present: bool,
    /// Diagnostic captured when Qdrant is unreachable.
    pub error: Option<String>,
    /// The active document, if any.
    pub document: Option<ActiveDocument>,
}
