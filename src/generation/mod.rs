//! Answer generation through a local Ollama runtime.
//!
//! The model receives a single, fully assembled prompt and returns plain text; no streaming.

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors surfaced while generating an answer.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Provider was unreachable or the model is unknown.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate answer: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed or was empty.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by text-generation backends.
#[async_trait]
pub trait AnswerModel: Send + Sync {
    /// Complete `prompt` and return the model's text.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Build the answer model described by the configuration.
pub fn get_answer_model() -> Result<Box<dyn AnswerModel>, GenerationError> {
    let config = get_config();
    let model = OllamaAnswerModel::new(
        config.ollama_url.clone(),
        config.llm_model.clone(),
        config.llm_temperature,
    )?;
    tracing::debug!(model = %config.llm_model, url = %config.ollama_url, "Answer model ready");
    Ok(Box::new(model))
}

/// Ollama-backed completion client (`POST /api/generate`).
pub struct OllamaAnswerModel {
    http: Client,
    base_url: String,
    model: String,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

impl OllamaAnswerModel {
    /// Construct a client for `model` served at `base_url`.
    pub fn new(
        base_url: String,
        model: String,
        temperature: Option<f32>,
    ) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .user_agent("docqa/generate")
            .build()
            .map_err(|error| GenerationError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url,
            model,
            temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }

    fn payload(&self, prompt: &str) -> Value {
        let mut payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        if let (Some(temperature), Some(obj)) = (self.temperature, payload.as_object_mut()) {
            obj.insert("options".into(), json!({ "temperature": temperature }));
        }
        payload
    }
}

#[async_trait]
impl AnswerModel for OllamaAnswerModel {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .http
            .post(self.endpoint())
            .json(&self.payload(prompt))
            .send()
            .await
            .map_err(|error| {
                GenerationError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404 (is model '{}' pulled?)",
                self.endpoint(),
                self.model
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(GenerationError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        let answer = body.response.trim();
        if answer.is_empty() {
            return Err(GenerationError::InvalidResponse(
                "Ollama returned an empty answer".into(),
            ));
        }

        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn model_for(server: &MockServer, temperature: Option<f32>) -> OllamaAnswerModel {
        OllamaAnswerModel::new(server.base_url(), "llama3".into(), temperature).expect("client")
    }

    #[tokio::test]
    async fn returns_trimmed_answer() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate").json_body(json!({
                    "model": "llama3",
                    "prompt": "Question?",
                    "stream": false
                }));
                then.status(200).json_body(json!({
                    "response": "  The answer.\n",
                    "done": true
                }));
            })
            .await;

        let answer = model_for(&server, None)
            .generate("Question?")
            .await
            .expect("answer");

        mock.assert();
        assert_eq!(answer, "The answer.");
    }

    #[tokio::test]
    async fn forwards_temperature_option() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .json_body_partial(r#"{"options": {"temperature": 0.5}}"#);
                then.status(200).json_body(json!({ "response": "ok", "done": true }));
            })
            .await;

        model_for(&server, Some(0.5))
            .generate("prompt")
            .await
            .expect("answer");
        mock.assert();
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let error = model_for(&server, None)
            .generate("prompt")
            .await
            .expect_err("error response");
        assert!(
            matches!(error, GenerationError::GenerationFailed(message) if message.contains("500"))
        );
    }

    #[tokio::test]
    async fn empty_answer_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(json!({ "response": "   ", "done": true }));
            })
            .await;

        let error = model_for(&server, None)
            .generate("prompt")
            .await
            .unwrap_err();
        assert!(matches!(error, GenerationError::InvalidResponse(_)));
    }
}
