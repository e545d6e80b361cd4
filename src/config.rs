use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_COLLECTION_NAME: &str = "docqa";
const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "llama3";
const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: usize = 100;
const DEFAULT_RETRIEVAL_K: usize = 3;
const DEFAULT_UPLOAD_DIR: &str = "uploaded_pdfs";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the document QA server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection holding the active document.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the Ollama runtime (embeddings and answer generation).
    pub ollama_url: String,
    /// Base URL of the OpenAI-compatible embeddings API.
    pub openai_base_url: String,
    /// API key for the OpenAI-compatible embeddings API.
    pub openai_api_key: Option<String>,
    /// Generation model used to answer questions.
    pub llm_model: String,
    /// Optional sampling temperature forwarded to the generation model.
    pub llm_temperature: Option<f32>,
    /// Window size of each chunk, measured in `text_splitter_length_unit`.
    pub text_splitter_chunk_size: usize,
    /// Overlap carried from the previous chunk.
    pub text_splitter_chunk_overlap: usize,
    /// Unit used to measure chunk length.
    pub text_splitter_length_unit: LengthUnit,
    /// Number of passages retrieved per question.
    pub retrieval_k: usize,
    /// Whether answers carry the retrieved passages.
    pub answer_include_sources: bool,
    /// Directory where the most recent upload is stored.
    pub upload_dir: PathBuf,
    /// Maximum accepted request body size for uploads.
    pub max_upload_bytes: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
    /// Deterministic byte-hash vectors computed in process.
    Hashed,
}

/// How chunk length is measured.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    /// Unicode scalar values.
    Chars,
    /// `cl100k_base` tokens.
    Tokens,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env_or("QDRANT_COLLECTION_NAME", DEFAULT_COLLECTION_NAME),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_env_optional("EMBEDDING_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))
                })
                .transpose()?
                .unwrap_or(EmbeddingProvider::Ollama),
            embedding_model: load_env_or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            embedding_dimension: parse_env("EMBEDDING_DIMENSION")?
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
            ollama_url: load_env_or("OLLAMA_URL", DEFAULT_OLLAMA_URL),
            openai_base_url: load_env_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            llm_model: load_env_or("LLM_MODEL", DEFAULT_LLM_MODEL),
            llm_temperature: parse_env("LLM_TEMPERATURE")?,
            text_splitter_chunk_size: parse_env("TEXT_SPLITTER_CHUNK_SIZE")?
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            text_splitter_chunk_overlap: parse_env("TEXT_SPLITTER_CHUNK_OVERLAP")?
                .unwrap_or(DEFAULT_CHUNK_OVERLAP),
            text_splitter_length_unit: load_env_optional("TEXT_SPLITTER_LENGTH_UNIT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("TEXT_SPLITTER_LENGTH_UNIT".into()))
                })
                .transpose()?
                .unwrap_or(LengthUnit::Chars),
            retrieval_k: parse_env("RETRIEVAL_K")?.unwrap_or(DEFAULT_RETRIEVAL_K),
            answer_include_sources: load_env_optional("ANSWER_INCLUDE_SOURCES")
                .map(|value| {
                    parse_flag(&value)
                        .ok_or_else(|| ConfigError::InvalidValue("ANSWER_INCLUDE_SOURCES".into()))
                })
                .transpose()?
                .unwrap_or(false),
            upload_dir: PathBuf::from(load_env_or("UPLOAD_DIR", DEFAULT_UPLOAD_DIR)),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            server_port: parse_env("SERVER_PORT")?,
        };

        if config.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if config.text_splitter_chunk_size == 0 {
            return Err(ConfigError::InvalidValue("TEXT_SPLITTER_CHUNK_SIZE".into()));
        }
        if config.retrieval_k == 0 {
            return Err(ConfigError::InvalidValue("RETRIEVAL_K".into()));
        }
        if config.embedding_provider == EmbeddingProvider::OpenAI && config.openai_api_key.is_none()
        {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".into()));
        }

        Ok(config)
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hashed" => Ok(Self::Hashed),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for LengthUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chars" | "characters" => Ok(Self::Chars),
            "tokens" => Ok(Self::Tokens),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment (after reading `.env`) and install it globally.
pub fn init_config() -> Result<(), ConfigError> {
    dotenvy::dotenv().ok();
    install(Config::from_env()?);
    Ok(())
}

/// Like [`init_config`], but reads variables from an explicit env file first.
pub fn init_config_from(path: &Path) -> Result<(), ConfigError> {
    dotenvy::from_path(path).map_err(|_| ConfigError::InvalidValue(path.display().to_string()))?;
    install(Config::from_env()?);
    Ok(())
}

fn install(config: Config) {
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        llm_model = %config.llm_model,
        chunk_size = config.text_splitter_chunk_size,
        chunk_overlap = config.text_splitter_chunk_overlap,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    if CONFIG.set(config).is_err() {
        tracing::warn!("Configuration already initialized; keeping the first value");
    }
}

/// Install a fixed configuration for unit tests. Safe to call from every test.
#[cfg(test)]
pub(crate) fn ensure_test_config() -> &'static Config {
    CONFIG.get_or_init(|| Config {
        qdrant_url: "http://127.0.0.1:6333".into(),
        qdrant_collection_name: "docqa-test".into(),
        qdrant_api_key: None,
        embedding_provider: EmbeddingProvider::Hashed,
        embedding_model: "test-model".into(),
        embedding_dimension: 16,
        ollama_url: DEFAULT_OLLAMA_URL.into(),
        openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
        openai_api_key: None,
        llm_model: "test-llm".into(),
        llm_temperature: None,
        text_splitter_chunk_size: 200,
        text_splitter_chunk_overlap: 20,
        text_splitter_length_unit: LengthUnit::Chars,
        retrieval_k: 3,
        answer_include_sources: true,
        upload_dir: std::env::temp_dir().join("docqa-unit-tests"),
        max_upload_bytes: 1024 * 1024,
        server_port: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_provider_parses_known_values() {
        assert_eq!("Ollama".parse::<EmbeddingProvider>(), Ok(EmbeddingProvider::Ollama));
        assert_eq!("openai".parse::<EmbeddingProvider>(), Ok(EmbeddingProvider::OpenAI));
        assert_eq!(" hashed ".parse::<EmbeddingProvider>(), Ok(EmbeddingProvider::Hashed));
        assert!("huggingface".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn length_unit_accepts_aliases() {
        assert_eq!("chars".parse::<LengthUnit>(), Ok(LengthUnit::Chars));
        assert_eq!("characters".parse::<LengthUnit>(), Ok(LengthUnit::Chars));
        assert_eq!("TOKENS".parse::<LengthUnit>(), Ok(LengthUnit::Tokens));
        assert!("words".parse::<LengthUnit>().is_err());
    }

    #[test]
    fn flags_parse_common_spellings() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
