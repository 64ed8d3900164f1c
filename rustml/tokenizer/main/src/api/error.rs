//! Error types for tokenizer operations

use std::fmt;

use thiserror::Error;

/// Result type for tokenizer operations
pub type TokenizerResult<T> = Result<T, TokenizerError>;

/// Errors that can occur while building or running a tokenizer
#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown token id {id} (vocab size {vocab_size})")]
    UnknownId { id: u32, vocab_size: usize },

    #[error("Invalid tokenizer handle: {0}")]
    InvalidHandle(u64),

    #[error("Pattern error: {0}")]
    Pattern(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Diagnostic for a configuration that cannot produce a tokenizer.
///
/// Carries the offending field path (e.g. `model.vocab`) when the problem was
/// found during validation, or the byte offset when the JSON itself is broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub message: String,
    pub field: Option<String>,
    pub offset: Option<usize>,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
            offset: None,
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: Some(field.into()),
            offset: None,
        }
    }

    /// Build from a serde_json failure, translating its line/column into a
    /// byte offset within `source`.
    pub fn from_json(err: &serde_json::Error, source: &[u8]) -> Self {
        let offset = byte_offset(source, err.line(), err.column());
        Self {
            message: err.to_string(),
            field: None,
            offset,
        }
    }

    /// Prefix the field path with its parent section.
    pub fn within(mut self, parent: &str) -> Self {
        self.field = Some(match self.field.take() {
            Some(f) => format!("{parent}.{f}"),
            None => parent.to_string(),
        });
        self
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.field, self.offset) {
            (Some(field), _) => write!(f, "{field}: {}", self.message),
            (None, Some(offset)) => write!(f, "{} (byte {offset})", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<fancy_regex::Error> for TokenizerError {
    fn from(err: fancy_regex::Error) -> Self {
        TokenizerError::Pattern(err.to_string())
    }
}

/// serde_json reports 1-based lines and columns; line 0 means "no position".
fn byte_offset(source: &[u8], line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let mut start = 0;
    for _ in 1..line {
        let nl = source[start..].iter().position(|&b| b == b'\n')?;
        start += nl + 1;
    }
    Some((start + column.saturating_sub(1)).min(source.len()))
}
