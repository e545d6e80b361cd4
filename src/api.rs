//! HTTP surface.
//!
//! - `POST /upload-pdf` – Multipart form with a `file` part of type `application/pdf`. The PDF
//!   replaces the active document: its text is extracted, chunked, embedded, and indexed.
//! - `POST /ask-question` – `{"question": "..."}`. Answers from the active document; returns
//!   `{"answer": "..."}` plus `source_documents` when `ANSWER_INCLUDE_SOURCES` is enabled.
//! - `GET /health` – Qdrant reachability and the active document.
//! - `GET /metrics` – Upload and question counters.
//! - `GET /commands` – Machine-readable endpoint catalog.
//!
//! Errors are returned as `{"detail": "..."}` with 400 for rejected uploads or a missing
//! document, 413 for uploads over `MAX_UPLOAD_BYTES`, 422 for invalid questions, and 500 for
//! anything a collaborator raised.

use crate::config::get_config;
use crate::metrics::MetricsSnapshot;
use crate::processing::{ActiveDocument, QaApi, QaError, Question};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

const PDF_CONTENT_TYPE: &str = "application/pdf";
const FILE_FIELD: &str = "file";
const DEFAULT_UPLOAD_NAME: &str = "uploaded.pdf";

/// Build the HTTP router exposing the upload and question endpoints.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: QaApi + 'static,
{
    let config = get_config();
    Router::new()
        .route("/upload-pdf", post(upload_pdf::<S>))
        .route("/ask-question", post(ask_question::<S>))
        .route("/health", get(health::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(service)
}

/// Success response for `POST /upload-pdf`.
#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    document_id: String,
    pages: usize,
    chunks_indexed: usize,
}

/// Accept a PDF upload and index it as the active document.
async fn upload_pdf<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: QaApi,
{
    let (file_name, bytes) = read_pdf_field(&mut multipart).await?;
    let outcome = service.ingest_pdf(file_name, bytes).await?;
    tracing::info!(
        document_id = %outcome.document.document_id,
        pages = outcome.document.pages,
        chunks = outcome.document.chunks,
        chunk_size = outcome.chunk_size,
        skipped_duplicates = outcome.skipped_duplicates,
        "Upload request completed"
    );

    Ok(Json(UploadResponse {
        message: "PDF uploaded and processed successfully.",
        document_id: outcome.document.document_id.to_string(),
        pages: outcome.document.pages,
        chunks_indexed: outcome.document.chunks,
    }))
}

/// Pull the `file` part out of the form, checking its declared content type.
async fn read_pdf_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), QaError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        if field.content_type() != Some(PDF_CONTENT_TYPE) {
            tracing::debug!(content_type = ?field.content_type(), "Rejected upload content type");
            return Err(QaError::InvalidUpload(
                "Only PDF files are allowed.".to_string(),
            ));
        }
        let file_name = field
            .file_name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_UPLOAD_NAME)
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(multipart_error)?;
        return Ok((file_name, bytes.to_vec()));
    }

    Err(QaError::InvalidUpload(format!(
        "Missing '{FILE_FIELD}' form field."
    )))
}

/// Keep the body-limit rejection distinct from malformed forms.
fn multipart_error(error: MultipartError) -> QaError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        QaError::UploadTooLarge(error.body_text())
    } else {
        QaError::InvalidUpload(error.body_text())
    }
}

/// Request body for `POST /ask-question`.
#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

/// Success response for `POST /ask-question`.
#[derive(Serialize)]
struct AskResponse {
    answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_documents: Option<Vec<String>>,
}

/// Validate a question and answer it from the active document.
async fn ask_question<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError>
where
    S: QaApi,
{
    let question = Question::parse(&request.question).map_err(QaError::from)?;
    let answer = service.ask(question).await?;
    let source_documents = get_config()
        .answer_include_sources
        .then(|| answer.sources.into_iter().map(|passage| passage.text).collect());

    Ok(Json(AskResponse {
        answer: answer.text,
        source_documents,
    }))
}

/// Response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    qdrant_reachable: bool,
    collection_present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    document: Option<ActiveDocument>,
}

async fn health<S>(State(service): State<Arc<S>>) -> Json<HealthResponse>
where
    S: QaApi,
{
    let status = service.status().await;
    Json(HealthResponse {
        status: if status.qdrant_reachable { "ok" } else { "degraded" },
        qdrant_reachable: status.qdrant_reachable,
        collection_present: status.collection_present,
        error: status.error,
        document: status.document,
    })
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: QaApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload_pdf",
                method: "POST",
                path: "/upload-pdf",
                description: "Upload a PDF as multipart field 'file' (application/pdf). Replaces the active document.",
                request_example: None,
            },
            CommandDescriptor {
                name: "ask_question",
                method: "POST",
                path: "/ask-question",
                description: "Ask a question (1-500 characters, must contain letters) about the active document.",
                request_example: Some(json!({ "question": "What is the main topic?" })),
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Report Qdrant reachability and the active document.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return upload and question counters.",
                request_example: None,
            },
        ],
    })
}

struct AppError(QaError);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0 {
            QaError::InvalidUpload(_) | QaError::NoDocument => StatusCode::BAD_REQUEST,
            QaError::UploadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            QaError::Question(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, status = %status, "Request rejected");
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

impl From<QaError> for AppError {
    fn from(inner: QaError) -> Self {
        Self(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_commands};
    use crate::config::ensure_test_config;
    use crate::metrics::MetricsSnapshot;
    use crate::pdf::PdfError;
    use crate::processing::{
        ActiveDocument, Answer, IngestOutcome, QaApi, QaError, Question, RetrievedPassage,
        ServiceStatus,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;
    use uuid::Uuid;

    const BOUNDARY: &str = "docqa-test-boundary";

    #[derive(Clone, Copy)]
    enum AskBehavior {
        Answer,
        NoDocument,
        Fail,
    }

    struct StubQaService {
        uploads: Mutex<Vec<(String, Vec<u8>)>>,
        questions: Mutex<Vec<String>>,
        ask_behavior: AskBehavior,
    }

    impl StubQaService {
        fn new(ask_behavior: AskBehavior) -> Arc<Self> {
            Arc::new(Self {
                uploads: Mutex::new(Vec::new()),
                questions: Mutex::new(Vec::new()),
                ask_behavior,
            })
        }
    }

    #[async_trait]
    impl QaApi for StubQaService {
        async fn ingest_pdf(
            &self,
            file_name: String,
            bytes: Vec<u8>,
        ) -> Result<IngestOutcome, QaError> {
            self.uploads.lock().await.push((file_name.clone(), bytes));
            Ok(IngestOutcome {
                document: ActiveDocument {
                    document_id: Uuid::nil(),
                    file_name,
                    pages: 3,
                    chunks: 7,
                },
                chunk_size: 1000,
                skipped_duplicates: 0,
            })
        }

        async fn ask(&self, question: Question) -> Result<Answer, QaError> {
            self.questions.lock().await.push(question.to_string());
            match self.ask_behavior {
                AskBehavior::Answer => Ok(Answer {
                    text: "Forty-two.".into(),
                    sources: vec![RetrievedPassage {
                        text: "The answer is forty-two.".into(),
                        page: Some(1),
                        score: 0.9,
                    }],
                }),
                AskBehavior::NoDocument => Err(QaError::NoDocument),
                AskBehavior::Fail => Err(QaError::Pdf(PdfError::NoText)),
            }
        }

        async fn status(&self) -> ServiceStatus {
            ServiceStatus {
                qdrant_reachable: true,
                collection_present: false,
                error: None,
                document: None,
            }
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_indexed: 1,
                chunks_indexed: 7,
                questions_answered: 2,
                last_chunk_size: Some(1000),
            }
        }
    }

    fn multipart_request(field: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"manual.pdf\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/upload-pdf")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    fn question_request(question: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/ask-question")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "question": question }).to_string()))
            .expect("request")
    }

    async fn json_body(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json body")
    }

    #[tokio::test]
    async fn upload_accepts_pdf_part() {
        ensure_test_config();
        let service = StubQaService::new(AskBehavior::Answer);
        let app = create_router(service.clone());

        let response = app
            .oneshot(multipart_request("file", "application/pdf", b"%PDF-1.5 body"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["message"], "PDF uploaded and processed successfully.");
        assert_eq!(json["pages"], 3);
        assert_eq!(json["chunks_indexed"], 7);

        let uploads = service.uploads.lock().await;
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "manual.pdf");
        assert_eq!(uploads[0].1, b"%PDF-1.5 body");
    }

    #[tokio::test]
    async fn upload_rejects_other_content_types() {
        ensure_test_config();
        let service = StubQaService::new(AskBehavior::Answer);
        let app = create_router(service.clone());

        let response = app
            .oneshot(multipart_request("file", "text/plain", b"hello"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["detail"], "Only PDF files are allowed.");
        assert!(service.uploads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn oversized_upload_is_payload_too_large() {
        let config = ensure_test_config();
        let service = StubQaService::new(AskBehavior::Answer);
        let app = create_router(service.clone());
        let oversized = vec![b'x'; config.max_upload_bytes + 1024];

        let response = app
            .oneshot(multipart_request("file", "application/pdf", &oversized))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(service.uploads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn upload_requires_file_field() {
        ensure_test_config();
        let app = create_router(StubQaService::new(AskBehavior::Answer));

        let response = app
            .oneshot(multipart_request("attachment", "application/pdf", b"%PDF"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["detail"].as_str().unwrap_or_default().contains("file"));
    }

    #[tokio::test]
    async fn ask_returns_answer_and_sources() {
        let config = ensure_test_config();
        let service = StubQaService::new(AskBehavior::Answer);
        let app = create_router(service.clone());

        let response = app
            .oneshot(question_request("  What is the answer?  "))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["answer"], "Forty-two.");
        if config.answer_include_sources {
            assert_eq!(json["source_documents"], json!(["The answer is forty-two."]));
        }
        assert_eq!(
            *service.questions.lock().await,
            vec!["What is the answer?".to_string()]
        );
    }

    #[tokio::test]
    async fn invalid_questions_are_unprocessable() {
        ensure_test_config();
        let service = StubQaService::new(AskBehavior::Answer);

        let response = create_router(service.clone())
            .oneshot(question_request("12345"))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_body(response).await;
        assert_eq!(
            json["detail"],
            "This is not a valid question — only a number was entered."
        );

        let response = create_router(service.clone())
            .oneshot(question_request(&"why ".repeat(200)))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        assert!(service.questions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn ask_without_document_is_bad_request() {
        ensure_test_config();
        let app = create_router(StubQaService::new(AskBehavior::NoDocument));

        let response = app
            .oneshot(question_request("Is anything loaded?"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["detail"], "No document uploaded yet.");
    }

    #[tokio::test]
    async fn collaborator_failures_are_server_errors() {
        ensure_test_config();
        let app = create_router(StubQaService::new(AskBehavior::Fail));

        let response = app
            .oneshot(question_request("Will this fail?"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["detail"], "PDF contains no extractable text");
    }

    #[tokio::test]
    async fn metrics_and_health_are_exposed() {
        ensure_test_config();
        let service = StubQaService::new(AskBehavior::Answer);

        let response = create_router(service.clone())
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["chunks_indexed"], 7);
        assert_eq!(json["last_chunk_size"], 1000);

        let response = create_router(service)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["document"], Value::Null);
    }

    #[tokio::test]
    async fn commands_catalog_lists_both_endpoints() {
        let commands = get_commands().await.0.commands;
        let paths: Vec<&str> = commands.iter().map(|command| command.path).collect();
        assert!(paths.contains(&"/upload-pdf"));
        assert!(paths.contains(&"/ask-question"));
        assert!(commands.iter().all(|command| !command.description.is_empty()));
    }
}
