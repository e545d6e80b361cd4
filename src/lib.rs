#![deny(missing_docs)]

//! Core library for the docqa PDF question-answering service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Answer generation backends.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Upload and question counters.
pub mod metrics;
/// PDF text extraction.
pub mod pdf;
/// Question-answering pipeline.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
