//! "Stuff" prompt assembly: every retrieved passage goes into a single prompt.

use super::{question::Question, types::RetrievedPassage};

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Build the QA prompt from ranked passages and the question.
pub(crate) fn build_stuff_prompt(question: &Question, passages: &[RetrievedPassage]) -> String {
    let context = passages
        .iter()
        .map(|passage| passage.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{PROMPT_PREAMBLE}\n\n{context}\n\nQuestion: {question}\nHelpful Answer:")
}
