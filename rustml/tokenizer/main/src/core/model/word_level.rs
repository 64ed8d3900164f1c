//! WordLevel: one token per pre-tokenized word

use std::collections::HashMap;

use serde::Deserialize;

use crate::api::error::ConfigError;
use crate::api::types::Token;
use crate::spi::contract::Model;

#[derive(Debug, Clone, Deserialize)]
pub struct WordLevelConfig {
    #[serde(default)]
    pub vocab: HashMap<String, u32>,
    #[serde(default = "default_unk")]
    pub unk_token: String,
}

fn default_unk() -> String {
    "<unk>".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "WordLevelConfig")]
pub struct WordLevel {
    vocab: HashMap<String, u32>,
    pub unk_token: String,
}

impl From<WordLevelConfig> for WordLevel {
    fn from(config: WordLevelConfig) -> Self {
        Self {
            vocab: config.vocab,
            unk_token: config.unk_token,
        }
    }
}

impl WordLevel {
    pub fn new(vocab: HashMap<String, u32>, unk_token: &str) -> Self {
        WordLevelConfig {
            vocab,
            unk_token: unk_token.to_string(),
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
}

impl Model for WordLevel {
    fn tokenize(&self, sequence: &str) -> Vec<Token> {
        let len = sequence.chars().count();
        if len == 0 {
            return Vec::new();
        }
        if let Some(&id) = self.vocab.get(sequence) {
            return vec![Token::new(id, sequence, (0, len))];
        }
        match self.vocab.get(&self.unk_token) {
            Some(&id) => vec![Token::new(id, self.unk_token.clone(), (0, len))],
            None => Vec::new(),
        }
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

    #[test]
    fn test_known_and_unknown_words() {
        let vocab = [("hello", 0), ("world", 1), ("<unk>", 2)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let m = WordLevel::new(vocab, "<unk>");
        assert_eq!(m.tokenize("hello"), [Token::new(0, "hello", (0, 5))]);
        assert_eq!(m.tokenize("héllo"), [Token::new(2, "<unk>", (0, 5))]);
        assert!(m.tokenize("").is_empty());
        assert_eq!(m.vocab_size(), 3);
    }
}
