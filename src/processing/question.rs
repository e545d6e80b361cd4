//! Validation for user questions.

use thiserror::Error;

/// Maximum question length in characters, after trimming.
pub const MAX_QUESTION_CHARS: usize = 500;

/// Reasons a question is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionError {
    /// Nothing left after trimming.
    #[error("Question must not be empty.")]
    Empty,
    /// Longer than [`MAX_QUESTION_CHARS`].
    #[error("Question must be at most {MAX_QUESTION_CHARS} characters.")]
    TooLong,
    /// Only digits were entered.
    #[error("This is not a valid question — only a number was entered.")]
    OnlyDigits,
    /// No alphabetic character present.
    #[error("This is not a valid question — it must include letters.")]
    NoLetters,
}

/// A trimmed question that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Validate raw input and wrap it.
    pub fn parse(raw: &str) -> Result<Self, QuestionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QuestionError::Empty);
        }
        if trimmed.chars().count() > MAX_QUESTION_CHARS {
            return Err(QuestionError::TooLong);
        }
        if trimmed.chars().all(is_digit) {
            return Err(QuestionError::OnlyDigits);
        }
        if !trimmed.chars().any(is_letter) {
            return Err(QuestionError::NoLetters);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the normalized text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Decimal and digit characters (`7`, `٣`, `²`, `①`). Fractions and letter-like numerals are not
/// digits.
fn is_digit(ch: char) -> bool {
    ch.is_numeric() && !ch.is_alphabetic() && !is_vulgar_fraction(ch)
}

/// Letters only; numerals such as `Ⅻ` carry the alphabetic property but are not letters.
fn is_letter(ch: char) -> bool {
    ch.is_alphabetic() && !ch.is_numeric()
}

fn is_vulgar_fraction(ch: char) -> bool {
    matches!(ch, '\u{00BC}'..='\u{00BE}' | '\u{2150}'..='\u{215F}' | '\u{2189}')
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
