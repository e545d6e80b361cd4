//! Question-answering pipeline: validation, chunking, retrieval, and prompt assembly.

mod chunking;
mod mappers;
mod prompt;
pub mod question;
mod service;
pub mod types;

pub use question::{Question, QuestionError};
pub use service::{DocumentQaService, QaApi};
pub use types::{
    ActiveDocument, Answer, ChunkingError, IngestOutcome, PageChunk, QaError, RetrievedPassage,
    ServiceStatus,
};
