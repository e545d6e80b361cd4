//! PDF text extraction.
//!
//! Documents are parsed in memory with `lopdf` and flattened into one [`PageText`] per page that
//! carries any text. Parsing is CPU bound; async callers should go through
//! [`extract_pages_blocking`].

use lopdf::Document;
use thiserror::Error;

/// Errors raised while reading text out of a PDF.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The payload could not be parsed as a PDF document.
    #[error("Failed to parse PDF: {0}")]
    Parse(#[source] lopdf::Error),
    /// The document is encrypted and cannot be read without a password.
    #[error("PDF is encrypted")]
    Encrypted,
    /// The document contains no pages.
    #[error("PDF has no pages")]
    NoPages,
    /// Every page was empty or text extraction failed everywhere.
    #[error("PDF contains no extractable text")]
    NoText,
    /// The blocking extraction task panicked or was cancelled.
    #[error("PDF extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Text extracted from a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number.
    pub page: u32,
    /// Raw page text as produced by the extractor.
    pub text: String,
}

/// Extract per-page text from an in-memory PDF.
///
/// Pages are returned in page order. Pages without text are skipped; a page whose content
/// stream cannot be decoded is logged and skipped rather than failing the whole document.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<PageText>, PdfError> {
    let document = Document::load_mem(bytes).map_err(PdfError::Parse)?;
    if document.is_encrypted() {
        return Err(PdfError::Encrypted);
    }

    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(PdfError::NoPages);
    }

    let mut extracted = Vec::with_capacity(pages.len());
    for page in pages.keys().copied() {
        match document.extract_text(&[page]) {
            Ok(text) if !text.trim().is_empty() => extracted.push(PageText { page, text }),
            Ok(_) => tracing::debug!(page, "Page has no text"),
            Err(error) => tracing::warn!(page, error = %error, "Failed to extract page text"),
        }
    }

    if extracted.is_empty() {
        return Err(PdfError::NoText);
    }

    tracing::debug!(
        total_pages = pages.len(),
        text_pages = extracted.len(),
        "Extracted PDF text"
    );
    Ok(extracted)
}

/// Run [`extract_pages`] on the blocking thread pool.
pub async fn extract_pages_blocking(bytes: Vec<u8>) -> Result<Vec<PageText>, PdfError> {
    tokio::task::spawn_blocking(move || extract_pages(&bytes)).await?
}
