//! WordPiece: greedy longest-match-first segmentation

use std::collections::HashMap;

use serde::Deserialize;

use crate::api::error::ConfigError;
use crate::api::types::Token;
use crate::spi::contract::Model;

#[derive(Debug, Clone, Deserialize)]
pub struct WordPieceConfig {
    #[serde(default)]
    pub vocab: HashMap<String, u32>,
    #[serde(default = "default_unk")]
    pub unk_token: String,
    #[serde(default = "default_prefix")]
    pub continuing_subword_prefix: String,
    #[serde(default = "default_max_chars")]
    pub max_input_chars_per_word: usize,
}

fn default_unk() -> String {
    "[UNK]".to_string()
}

fn default_prefix() -> String {
    "##".to_string()
}

fn default_max_chars() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "WordPieceConfig")]
pub struct WordPiece {
    vocab: HashMap<String, u32>,
    pub unk_token: String,
    pub continuing_subword_prefix: String,
    pub max_input_chars_per_word: usize,
}

impl From<WordPieceConfig> for WordPiece {
    fn from(config: WordPieceConfig) -> Self {
        Self {
            vocab: config.vocab,
            unk_token: config.unk_token,
            continuing_subword_prefix: config.continuing_subword_prefix,
            max_input_chars_per_word: config.max_input_chars_per_word,
        }
    }
}

impl WordPiece {
    pub fn new(vocab: HashMap<String, u32>, unk_token: &str) -> Self {
        WordPieceConfig {
            vocab,
            unk_token: unk_token.to_string(),
            continuing_subword_prefix: default_prefix(),
            max_input_chars_per_word: default_max_chars(),
        }
        .into()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.vocab.contains_key(&self.unk_token) {
            return Err(ConfigError::field(
                "unk_token",
                format!("unknown token {:?} is not in the vocabulary", self.unk_token),
            ));
        }
        Ok(())
    }

    fn unk(&self, len: usize) -> Vec<Token> {
        match self.vocab.get(&self.unk_token) {
            Some(&id) => vec![Token::new(id, self.unk_token.clone(), (0, len))],
            None => Vec::new(),
        }
    }
}

impl Model for WordPiece {
    fn tokenize(&self, sequence: &str) -> Vec<Token> {
        let bounds: Vec<usize> = sequence
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(sequence.len()))
            .collect();
        let len = bounds.len() - 1;
        if len == 0 {
            return Vec::new();
        }
        if len > self.max_input_chars_per_word {
            return self.unk(len);
        }

        let mut tokens = Vec::new();
        let mut start = 0;
        while start < len {
            let mut end = len;
            let mut found = None;
            while start < end {
                let piece = &sequence[bounds[start]..bounds[end]];
                let candidate = if start > 0 {
                    format!("{}{}", self.continuing_subword_prefix, piece)
                } else {
                    piece.to_string()
                };
                if let Some(&id) = self.vocab.get(&candidate) {
                    found = Some(Token::new(id, candidate, (start, end)));
                    break;
                }
                end -= 1;
            }
            match found {
                Some(token) => tokens.push(token),
                None => return self.unk(len),
            }
            start = end;
        }
        tokens
    }

    fn vocab(&self) -> HashMap<String, u32> {
        self.vocab.clone()
    }

    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    fn unk_id(&self) -> Option<u32> {
        self.vocab.get(&self.unk_token).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> WordPiece {
        let vocab = ["[UNK]", "un", "##aff", "##able", "runn", "##ing", "a", "##b"]
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i as u32))
            .collect();
        WordPiece::new(vocab, "[UNK]")
    }

    fn values(tokens: &[Token]) -> Vec<(&str, (usize, usize))> {
        tokens.iter().map(|t| (t.value.as_str(), t.offsets)).collect()
    }

    #[test]
    fn test_longest_match_first() {
        let m = model();
        assert_eq!(
            values(&m.tokenize("unaffable")),
            [("un", (0, 2)), ("##aff", (2, 5)), ("##able", (5, 9))]
        );
        assert_eq!(values(&m.tokenize("running")), [("runn", (0, 4)), ("##ing", (4, 7))]);
    }

    #[test]
    fn test_unmatched_remainder_is_unk() {
        let m = model();
        let tokens = m.tokenize("unx");
        assert_eq!(values(&tokens), [("[UNK]", (0, 3))]);
        assert_eq!(tokens[0].id, 0);
    }

    #[test]
    fn test_word_too_long() {
        let mut m = model();
        m.max_input_chars_per_word = 3;
        assert_eq!(values(&m.tokenize("abbb")), [("[UNK]", (0, 4))]);
        assert_eq!(m.tokenize("ab").len(), 2);
    }

    #[test]
    fn test_from_json_defaults() {
        let m: WordPiece = serde_json::from_str(r#"{"vocab":{"[UNK]":0,"hi":1}}"#).unwrap();
        assert_eq!(m.continuing_subword_prefix, "##");
        assert_eq!(m.max_input_chars_per_word, 100);
        assert!(m.validate().is_ok());
        assert_eq!(m.unk_id(), Some(0));
    }

    #[test]
    fn test_missing_unk_fails_validation() {
        let m: WordPiece = serde_json::from_str(r#"{"vocab":{"hi":0}}"#).unwrap();
        let err = m.validate().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("unk_token"));
    }
}
