//! Segmentation models

pub mod bpe;
pub mod unigram;
pub mod word_level;
pub mod wordpiece;

use std::collections::HashMap;

use serde::Deserialize;

use crate::api::error::ConfigError;
use crate::api::types::Token;
use crate::spi::contract::Model;

use bpe::Bpe;
use unigram::Unigram;
use word_level::WordLevel;
use wordpiece::WordPiece;

/// Every model a configuration can name, keyed by its `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ModelWrapper {
    #[serde(rename = "BPE")]
    Bpe(Bpe),
    WordPiece(WordPiece),
    WordLevel(WordLevel),
    Unigram(Unigram),
}

impl ModelWrapper {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bpe(_) => "BPE",
            Self::WordPiece(_) => "WordPiece",
            Self::WordLevel(_) => "WordLevel",
            Self::Unigram(_) => "Unigram",
        }
    }

    /// Checks that need the whole model, e.g. that the unknown token exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Bpe(m) => {
                if m.dropout.is_some_and(|p| p > 0.0) {
                    log::warn!("BPE dropout is ignored; segmentation is deterministic");
                }
                m.validate()
            }
            Self::WordPiece(m) => m.validate(),
            Self::WordLevel(m) => m.validate(),
            Self::Unigram(m) => m.validate(),
        }
    }

    fn inner(&self) -> &dyn Model {
        match self {
            Self::Bpe(m) => m,
            Self::WordPiece(m) => m,
            Self::WordLevel(m) => m,
            Self::Unigram(m) => m,
        }
    }
}

impl Model for ModelWrapper {
    fn tokenize(&self, sequence: &str) -> Vec<Token> {
        self.inner().tokenize(sequence)
    }

    fn vocab(&self) -> HashMap<String, u32> {
        self.inner().vocab()
    }

    fn vocab_size(&self) -> usize {
        self.inner().vocab_size()
    }

    fn unk_id(&self) -> Option<u32> {
        self.inner().unk_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_models() {
        let m: ModelWrapper = serde_json::from_str(
            r#"{"type":"WordLevel","vocab":{"<unk>":0,"hi":1},"unk_token":"<unk>"}"#,
        )
        .unwrap();
        assert_eq!(m.kind(), "WordLevel");
        assert_eq!(m.tokenize("hi")[0].id, 1);

        let m: ModelWrapper = serde_json::from_str(
            r#"{"type":"BPE","vocab":{"a":0,"b":1,"ab":2},"merges":["a b"],"dropout":null,"unk_token":null}"#,
        )
        .unwrap();
        assert_eq!(m.kind(), "BPE");
        assert_eq!(m.tokenize("ab")[0].value, "ab");
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_unknown_model_type() {
        assert!(serde_json::from_str::<ModelWrapper>(r#"{"type":"Magic","vocab":{}}"#).is_err());
    }
}
