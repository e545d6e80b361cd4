//! Question-answering service coordinating extraction, chunking, embedding, Qdrant, and the
//! answer model.

use crate::{
    config::get_config,
    embedding::{EmbeddingClient, EmbeddingClientError, get_embedding_client, validate_embeddings},
    generation::{AnswerModel, get_answer_model},
    metrics::{MetricsSnapshot, QaMetrics},
    pdf::{self, PdfError},
    processing::{
        chunking::chunk_pages,
        mappers::{dedupe_chunks, map_scored_point},
        prompt::build_stuff_prompt,
        question::Question,
        types::{ActiveDocument, Answer, IngestOutcome, QaError, RetrievedPassage, ServiceStatus},
    },
    qdrant::{DocumentPayload, PointInsert, QdrantService, document_filter},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use uuid::Uuid;

const STORED_UPLOAD_NAME: &str = "uploaded.pdf";

/// Owns the clients for every external collaborator and the single active document.
///
/// Uploads hold the write lock for the whole ingestion, questions hold the read lock while they
/// retrieve and generate, so a question never sees a half-replaced index.
pub struct DocumentQaService {
    embedding_client: Box<dyn EmbeddingClient>,
    qdrant_service: QdrantService,
    answer_model: Box<dyn AnswerModel>,
    metrics: Arc<QaMetrics>,
    active: RwLock<Option<ActiveDocument>>,
}

/// Abstraction over the service used by the HTTP surface.
#[async_trait]
pub trait QaApi: Send + Sync {
    /// Store, extract, chunk, embed, and index a PDF, replacing any previous document.
    async fn ingest_pdf(
        &self,
        file_name: String,
        bytes: Vec<u8>,
    ) -> Result<IngestOutcome, QaError>;

    /// Answer a validated question from the active document.
    async fn ask(&self, question: Question) -> Result<Answer, QaError>;

    /// Probe collaborators for the health endpoint.
    async fn status(&self) -> ServiceStatus;

    /// Retrieve the current metrics snapshot.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl DocumentQaService {
    /// Build the service from configuration. No network calls are made here.
    pub fn new() -> Result<Self, QaError> {
        tracing::info!("Initializing QA service collaborators");
        let embedding_client = get_embedding_client()?;
        let qdrant_service = QdrantService::new()?;
        let answer_model = get_answer_model()?;
        Ok(Self::from_parts(
            embedding_client,
            qdrant_service,
            answer_model,
        ))
    }

    /// Assemble the service from already constructed collaborators.
    pub fn from_parts(
        embedding_client: Box<dyn EmbeddingClient>,
        qdrant_service: QdrantService,
        answer_model: Box<dyn AnswerModel>,
    ) -> Self {
        Self {
            embedding_client,
            qdrant_service,
            answer_model,
            metrics: Arc::new(QaMetrics::new()),
            active: RwLock::new(None),
        }
    }

    /// Store, extract, chunk, embed, and index a PDF, replacing any previous document.
    pub async fn ingest_pdf(
        &self,
        file_name: String,
        bytes: Vec<u8>,
    ) -> Result<IngestOutcome, QaError> {
        let config = get_config();
        let collection = config.qdrant_collection_name.as_str();
        let started = Instant::now();
        let mut active = self.active.write().await;

        let stored = store_upload(&config.upload_dir, &bytes).await?;
        tracing::info!(
            file_name = %file_name,
            bytes = bytes.len(),
            path = %stored.display(),
            "Stored upload"
        );

        let pages = pdf::extract_pages_blocking(bytes).await?;
        let chunk_size = config.text_splitter_chunk_size;
        let overlap = config.text_splitter_chunk_overlap;
        let chunks = chunk_pages(
            &pages,
            chunk_size,
            overlap,
            config.text_splitter_length_unit,
        )?;
        let (prepared, skipped_duplicates) = dedupe_chunks(chunks);
        if prepared.is_empty() {
            return Err(PdfError::NoText.into());
        }
        tracing::debug!(
            pages = pages.len(),
            chunks = prepared.len(),
            chunk_size,
            overlap,
            unit = ?config.text_splitter_length_unit,
            skipped_duplicates,
            "Chunked document"
        );

        let texts: Vec<String> = prepared.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedding_client.generate_embeddings(texts).await?;
        validate_embeddings(&embeddings, prepared.len(), config.embedding_dimension)?;
        let points: Vec<PointInsert> = prepared
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| chunk.into_point(vector))
            .collect();

        let document_id = Uuid::new_v4();
        // The previous index is gone as soon as the collection is recreated.
        *active = None;
        self.qdrant_service
            .recreate_collection(collection, config.embedding_dimension as u64)
            .await?;
        let written = self
            .qdrant_service
            .index_points(
                collection,
                points,
                &DocumentPayload {
                    document_id,
                    source: file_name.clone(),
                },
            )
            .await?;

        let document = ActiveDocument {
            document_id,
            file_name,
            pages: pages.len(),
            chunks: written,
        };
        self.metrics.record_document(written as u64, chunk_size as u64);
        tracing::info!(
            collection,
            document_id = %document.document_id,
            file_name = %document.file_name,
            pages = document.pages,
            chunks = document.chunks,
            skipped_duplicates,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Document indexed"
        );
        *active = Some(document.clone());

        Ok(IngestOutcome {
            document,
            chunk_size,
            skipped_duplicates,
        })
    }

    /// Retrieve the top passages for `question` and ask the model to answer from them.
    pub async fn ask(&self, question: Question) -> Result<Answer, QaError> {
        let config = get_config();
        let started = Instant::now();
        let active = self.active.read().await;
        let document = active.as_ref().ok_or(QaError::NoDocument)?;

        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![question.as_str().to_string()])
            .await?;
        validate_embeddings(&vectors, 1, config.embedding_dimension)?;
        let vector = vectors.pop().ok_or_else(|| {
            EmbeddingClientError::InvalidResponse("no vector for the question".into())
        })?;

        let hits = self
            .qdrant_service
            .search_points(
                &config.qdrant_collection_name,
                vector,
                Some(document_filter(document.document_id)),
                config.retrieval_k,
            )
            .await?;
        let passages: Vec<RetrievedPassage> = hits.into_iter().filter_map(map_scored_point).collect();
        tracing::debug!(
            document_id = %document.document_id,
            k = config.retrieval_k,
            retrieved = passages.len(),
            "Retrieved passages"
        );

        let prompt = build_stuff_prompt(&question, &passages);
        let text = self.answer_model.generate(&prompt).await?;
        self.metrics.record_answer();
        tracing::info!(
            document_id = %document.document_id,
            passages = passages.len(),
            answer_chars = text.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Question answered"
        );

        Ok(Answer {
            text,
            sources: passages,
        })
    }

    /// Probe Qdrant and report the active document.
    pub async fn status(&self) -> ServiceStatus {
        let config = get_config();
        let document = self.active.read().await.clone();
        match self.qdrant_service.list_collections().await {
            Ok(collections) => ServiceStatus {
                qdrant_reachable: true,
                collection_present: collections
                    .iter()
                    .any(|name| name == &config.qdrant_collection_name),
                error: None,
                document,
            },
            Err(error) => {
                tracing::warn!(error = %error, "Qdrant health probe failed");
                ServiceStatus {
                    qdrant_reachable: false,
                    collection_present: false,
                    error: Some(error.to_string()),
                    document,
                }
            }
        }
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

async fn store_upload(dir: &Path, bytes: &[u8]) -> Result<PathBuf, std::io::Error> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(STORED_UPLOAD_NAME);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

#[async_trait]
impl QaApi for DocumentQaService {
    async fn ingest_pdf(
        &self,
        file_name: String,
        bytes: Vec<u8>,
    ) -> Result<IngestOutcome, QaError> {
        DocumentQaService::ingest_pdf(self, file_name, bytes).await
    }

    async fn ask(&self, question: Question) -> Result<Answer, QaError> {
        DocumentQaService::ask(self, question).await
    }

    async fn status(&self) -> ServiceStatus {
        DocumentQaService::status(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        DocumentQaService::metrics_snapshot(self)
    }
}
