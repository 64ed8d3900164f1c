//! Parsing of the `tokenizer.json` configuration document

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::api::error::ConfigError;
use crate::core::added_vocabulary::AddedToken;
use crate::core::decoder::DecoderWrapper;
use crate::core::model::ModelWrapper;
use crate::core::normalizer::NormalizerWrapper;
use crate::core::padding::PaddingParams;
use crate::core::post_processor::PostProcessorWrapper;
use crate::core::pre_tokenizer::PreTokenizerWrapper;
use crate::core::truncation::TruncationParams;

/// Every section of a configuration, deserialized but not yet cross-checked.
#[derive(Debug, Clone)]
pub struct TokenizerConfig {
    pub version: Option<String>,
    pub truncation: Option<TruncationParams>,
    pub padding: Option<PaddingParams>,
    pub added_tokens: Vec<AddedToken>,
    pub normalizer: Option<NormalizerWrapper>,
    pub pre_tokenizer: Option<PreTokenizerWrapper>,
    pub model: ModelWrapper,
    pub post_processor: Option<PostProcessorWrapper>,
    pub decoder: Option<DecoderWrapper>,
}

/// Parse a configuration blob.
///
/// Syntax errors carry the byte offset of the problem; section errors carry
/// the section name as their field.
pub fn parse(blob: &[u8]) -> Result<TokenizerConfig, ConfigError> {
    if blob.iter().all(u8::is_ascii_whitespace) {
        return Err(ConfigError::new("configuration is empty"));
    }
    let value: Value = serde_json::from_slice(blob).map_err(|e| ConfigError::from_json(&e, blob))?;
    let Value::Object(mut root) = value else {
        return Err(ConfigError::new("configuration must be a JSON object"));
    };

    let model: ModelWrapper = section(&mut root, "model")?
        .ok_or_else(|| ConfigError::field("model", "missing model section"))?;

    let truncation: Option<TruncationParams> = section(&mut root, "truncation")?;
    if let Some(t) = &truncation {
        t.validate().map_err(|e| e.within("truncation"))?;
    }
    let post_processor: Option<PostProcessorWrapper> = section(&mut root, "post_processor")?;
    if let Some(p) = &post_processor {
        p.validate().map_err(|e| e.within("post_processor"))?;
    }

    Ok(TokenizerConfig {
        version: section(&mut root, "version")?,
        truncation,
        padding: section(&mut root, "padding")?,
        added_tokens: section(&mut root, "added_tokens")?.unwrap_or_default(),
        normalizer: section(&mut root, "normalizer")?,
        pre_tokenizer: section(&mut root, "pre_tokenizer")?,
        model,
        post_processor,
        decoder: section(&mut root, "decoder")?,
    })
}

/// Take one top-level section; `null` and absent both mean "not configured".
fn section<T: DeserializeOwned>(root: &mut Map<String, Value>, name: &str) -> Result<Option<T>, ConfigError> {
    match root.remove(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ConfigError::field(name, e.to_string())),
    }
}
