//! Fixed-window chunking with overlap.
//!
//! Page text is split recursively (paragraphs, lines, sentences, words, then characters) by
//! `semchunk-rs` into base windows of `chunk_size - overlap`; anything the splitter leaves over
//! that size is cut again. Each chunk then gets a tail of the previous one
//! (`TEXT_SPLITTER_CHUNK_OVERLAP`) so passages that straddle a boundary remain retrievable, and
//! no chunk exceeds the configured window.
//!
//! Length is measured in characters by default. `TEXT_SPLITTER_LENGTH_UNIT=tokens` switches to
//! `cl100k_base` token counts from `tiktoken-rs`.

use crate::config::LengthUnit;
use crate::pdf::PageText;
use semchunk_rs::Chunker;
use std::sync::Arc;
use tiktoken_rs::cl100k_base;

use super::types::{ChunkingError, PageChunk};

pub(crate) type LengthCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Split every page into overlapping windows, keeping the page number on each chunk.
pub(crate) fn chunk_pages(
    pages: &[PageText],
    chunk_size: usize,
    overlap: usize,
    unit: LengthUnit,
) -> Result<Vec<PageChunk>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let counter = build_length_counter(unit)?;
    let mut chunks = Vec::new();
    for page in pages {
        if page.text.trim().is_empty() {
            continue;
        }
        let page_chunks = chunk_text_with_counter(&page.text, chunk_size, overlap, counter.clone());
        tracing::trace!(page = page.page, chunks = page_chunks.len(), "Chunked page");
        chunks.extend(
            page_chunks
                .into_iter()
                .filter(|text| !text.trim().is_empty())
                .map(|text| PageChunk {
                    page: page.page,
                    text,
                }),
        );
    }

    Ok(chunks)
}

/// Build the length function used by the splitter.
pub(crate) fn build_length_counter(unit: LengthUnit) -> Result<LengthCounter, ChunkingError> {
    match unit {
        LengthUnit::Chars => Ok(char_counter()),
        LengthUnit::Tokens => {
            let encoding = cl100k_base().map_err(|source| ChunkingError::Tokenizer {
                encoding: "cl100k_base".to_string(),
                source,
            })?;
            let encoding = Arc::new(encoding);
            Ok(Arc::new(move |segment: &str| {
                encoding.encode_ordinary(segment).len()
            }))
        }
    }
}

fn char_counter() -> LengthCounter {
    Arc::new(|segment: &str| segment.chars().count())
}

fn chunk_text_with_counter(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    counter: LengthCounter,
) -> Vec<String> {
    let effective_overlap = overlap.min(chunk_size.saturating_sub(1));
    // Base windows leave room for the tail carried over from the previous chunk.
    let base_size = chunk_size - effective_overlap;
    let counter_for_chunker = counter.clone();
    let chunker = Chunker::new(
        base_size,
        Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
    );
    let base_chunks: Vec<String> = chunker
        .chunk(text)
        .into_iter()
        .flat_map(|chunk| enforce_budget(chunk, base_size, &counter))
        .collect();
    apply_overlap(base_chunks, chunk_size, effective_overlap, &counter)
}

/// Re-split a chunk the splitter left over `budget`: on whitespace first, then by characters for
/// words that alone exceed it.
fn enforce_budget(chunk: String, budget: usize, counter: &LengthCounter) -> Vec<String> {
    if counter.as_ref()(&chunk) <= budget {
        return vec![chunk];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in chunk.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if counter.as_ref()(&candidate) <= budget {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        if counter.as_ref()(word) <= budget {
            current = word.to_string();
        } else {
            let mut parts = split_characters(word, budget, counter);
            current = parts.pop().unwrap_or_default();
            pieces.extend(parts);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }

    tracing::trace!(budget, pieces = pieces.len(), "Re-split oversized chunk");
    pieces
}

fn split_characters(word: &str, budget: usize, counter: &LengthCounter) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        current.push(ch);
        if counter.as_ref()(&current) > budget {
            current.pop();
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            current.push(ch);
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Prepend a tail of the previous base chunk to each chunk.
///
/// Base chunks are at most `chunk_size - overlap`, so the tail never displaces text of the
/// current chunk; it only shrinks when the joining space would push past `chunk_size`.
fn apply_overlap(
    chunks: Vec<String>,
    chunk_size: usize,
    overlap: usize,
    counter: &LengthCounter,
) -> Vec<String> {
    if chunks.len() < 2 || overlap == 0 {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    let mut previous: Option<&str> = None;

    for current in &chunks {
        let chunk = match previous {
            Some(prev) => build_overlapped_chunk(prev, current, overlap, chunk_size, counter),
            None => current.clone(),
        };
        overlapped.push(chunk);
        previous = Some(current);
    }

    overlapped
}

fn build_overlapped_chunk(
    previous: &str,
    current: &str,
    overlap: usize,
    chunk_size: usize,
    counter: &LengthCounter,
) -> String {
    let mut budget = overlap;
    while budget > 0 {
        let tail = suffix_within_budget(previous, budget, counter);
        if tail.is_empty() {
            break;
        }

        let mut combined = String::with_capacity(tail.len() + current.len() + 1);
        combined.push_str(tail);
        if !ends_with_whitespace(tail) && !starts_with_whitespace(current) {
            combined.push(' ');
        }
        combined.push_str(current);

        if counter.as_ref()(&combined) <= chunk_size {
            return combined;
        }
        budget = counter.as_ref()(tail).min(budget).saturating_sub(1);
    }

    current.to_string()
}

/// Longest suffix of `text` that fits `budget`, preferring one that starts on a word.
fn suffix_within_budget<'a>(text: &'a str, budget: usize, counter: &LengthCounter) -> &'a str {
    if budget == 0 {
        return "";
    }

    let trimmed = text.trim_start();
    if counter.as_ref()(trimmed) <= budget {
        return trimmed;
    }

    let word_starts = text.char_indices().filter(|(offset, ch)| {
        !ch.is_whitespace() && text[..*offset].ends_with(char::is_whitespace)
    });
    for (offset, _) in word_starts {
        if counter.as_ref()(&text[offset..]) <= budget {
            return &text[offset..];
        }
    }

    for (offset, _) in text.char_indices().skip(1) {
        let candidate = text[offset..].trim_start();
        if !candidate.is_empty() && counter.as_ref()(candidate) <= budget {
            return candidate;
        }
    }

    ""
}

fn starts_with_whitespace(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_whitespace)
}

fn ends_with_whitespace(text: &str) -> bool {
    text.chars().next_back().is_some_and(char::is_whitespace)
}
