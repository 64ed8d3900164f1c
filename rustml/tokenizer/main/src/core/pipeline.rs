//! The assembled tokenizer: configuration in, encode/decode out

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use crate::api::error::{TokenizerError, TokenizerResult};
use crate::api::types::Encoding;
use crate::core::added_vocabulary::AddedVocabulary;
use crate::core::config::{self, TokenizerConfig};
use crate::core::decoder::DecoderWrapper;
use crate::core::model::ModelWrapper;
use crate::core::normalizer::NormalizerWrapper;
use crate::core::padding::PaddingParams;
use crate::core::post_processor::PostProcessorWrapper;
use crate::core::pre_tokenizer::PreTokenizerWrapper;
use crate::core::truncation::TruncationParams;
use crate::core::vocab::{SpecialTokens, Vocabulary};
use crate::spi::contract::{Decoder, Model, PostProcessor, PreTokenizer, Tokenizer};

/// A tokenizer built from a `tokenizer.json` document.
///
/// Immutable once built; `encode` and `decode` take `&self` and can run on
/// many threads at once.
#[derive(Debug)]
pub struct PipelineTokenizer {
    normalizer: Option<NormalizerWrapper>,
    pre_tokenizer: Option<PreTokenizerWrapper>,
    model: ModelWrapper,
    post_processor: Option<PostProcessorWrapper>,
    decoder: Option<DecoderWrapper>,
    added_vocabulary: AddedVocabulary,
    vocabulary: Vocabulary,
    special_tokens: SpecialTokens,
    truncation: Option<TruncationParams>,
    padding: Option<PaddingParams>,
}

impl PipelineTokenizer {
    /// Parse and validate a configuration blob.
    pub fn from_bytes(blob: &[u8]) -> TokenizerResult<Self> {
        Self::build(config::parse(blob)?)
    }

    /// Load from a `tokenizer.json` file, or a directory containing one.
    pub fn from_file<P: AsRef<Path>>(path: P) -> TokenizerResult<Self> {
        let p = path.as_ref();
        let file = if p.is_dir() { p.join("tokenizer.json") } else { p.to_path_buf() };
        let blob = std::fs::read(&file)?;
        log::debug!("Loading tokenizer config from {}", file.display());
        Self::from_bytes(&blob)
    }

    fn build(config: TokenizerConfig) -> TokenizerResult<Self> {
        let TokenizerConfig {
            version,
            truncation,
            padding,
            added_tokens,
            normalizer,
            pre_tokenizer,
            model,
            post_processor,
            decoder,
        } = config;

        model.validate().map_err(|e| e.within("model"))?;
        if let Some(n) = &normalizer {
            n.walk(&mut |inner| {
                if matches!(inner, NormalizerWrapper::Precompiled { .. }) {
                    log::warn!("Precompiled charsmap is not interpreted; applying NFKC instead");
                }
            });
        }

        let vocabulary = Vocabulary::build(&model, &added_tokens)?;
        let added_vocabulary = AddedVocabulary::new(added_tokens, normalizer.as_ref())?;

        let mut special_tokens = SpecialTokens {
            unk: model.unk_id(),
            ..SpecialTokens::default()
        };
        special_tokens.all.extend(added_vocabulary.special_ids());

        if let Some(post) = &post_processor {
            for (token, id) in post.special_tokens() {
                vocabulary.expect_binding("post_processor", &token, id)?;
                special_tokens.all.insert(id);
            }
            let (bos, eos) = post.bos_eos();
            special_tokens.bos = bos;
            special_tokens.eos = eos;
        }

        if let Some(pad) = &padding {
            vocabulary.expect_binding("padding.pad_token", &pad.pad_token, pad.pad_id)?;
            special_tokens.pad = Some(pad.pad_id);
        }

        special_tokens.all.extend(
            [special_tokens.unk, special_tokens.pad, special_tokens.bos, special_tokens.eos]
                .into_iter()
                .flatten(),
        );

        log::debug!(
            "Built {} tokenizer (config version {}): vocab size {}, {} added tokens, specials {:?}",
            model.kind(),
            version.as_deref().unwrap_or("unset"),
            vocabulary.len(),
            added_vocabulary.len(),
            special_tokens
        );

        Ok(Self {
            normalizer,
            pre_tokenizer,
            model,
            post_processor,
            decoder,
            added_vocabulary,
            vocabulary,
            special_tokens,
            truncation,
            padding,
        })
    }

    /// Run the full pipeline on `text`.
    pub fn encode(&self, text: &str, add_special_tokens: bool) -> TokenizerResult<Encoding> {
        let _t = if log::log_enabled!(log::Level::Trace) { Some(Instant::now()) } else { None };

        let mut pretokenized = self
            .added_vocabulary
            .extract_and_normalize(self.normalizer.as_ref(), text)?;
        if let Some(pre) = &self.pre_tokenizer {
            pre.pre_tokenize(&mut pretokenized)?;
        }
        // Splits that already carry tokens came from the added vocabulary.
        let added_words: HashSet<u32> = pretokenized
            .splits()
            .iter()
            .enumerate()
            .filter(|(_, split)| split.tokens.is_some())
            .map(|(i, _)| i as u32)
            .collect();
        pretokenized.tokenize(|normalized| {
            if normalized.is_empty() {
                return Ok(Vec::new());
            }
            Ok(self.model.tokenize(normalized.get()))
        })?;

        let mut encoding = pretokenized.into_encoding(0);
        for ((id, word), mask) in encoding
            .ids
            .iter()
            .zip(&encoding.words)
            .zip(encoding.special_tokens_mask.iter_mut())
        {
            if word.is_some_and(|w| added_words.contains(&w)) && self.special_tokens.contains(*id) {
                *mask = 1;
            }
        }

        if let Some(trunc) = &self.truncation {
            let reserved = match (&self.post_processor, add_special_tokens) {
                (Some(post), true) => post.added_tokens(false),
                _ => 0,
            };
            trunc.apply(&mut encoding, reserved);
        }
        if let Some(post) = &self.post_processor {
            encoding = post.process(encoding, add_special_tokens);
        }
        if let Some(pad) = &self.padding {
            pad.apply(&mut encoding);
        }

        if let Some(t) = _t {
            log::trace!(
                "[perf] tokenizer::encode chars={}->tokens={} {:.3}ms",
                text.chars().count(),
                encoding.len(),
                t.elapsed().as_secs_f64() * 1000.0
            );
        }
        Ok(encoding)
    }

    /// Turn ids back into text.
    pub fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> TokenizerResult<String> {
        let _t = if log::log_enabled!(log::Level::Trace) { Some(Instant::now()) } else { None };

        let mut tokens = Vec::with_capacity(ids.len());
        for &id in ids {
            let token = self.vocabulary.id_to_token(id).ok_or(TokenizerError::UnknownId {
                id,
                vocab_size: self.vocabulary.len(),
            })?;
            if skip_special_tokens && self.special_tokens.contains(id) {
                continue;
            }
            tokens.push(token.to_string());
        }

        let text = match &self.decoder {
            Some(decoder) => decoder.decode(tokens)?,
            None => tokens.join(" "),
        };

        if let Some(t) = _t {
            log::trace!(
                "[perf] tokenizer::decode ids={}->chars={} {:.3}ms",
                ids.len(),
                text.chars().count(),
                t.elapsed().as_secs_f64() * 1000.0
            );
        }
        Ok(text)
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.special_tokens
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Name of the segmentation model, as written in the configuration.
    pub fn model_kind(&self) -> &'static str {
        self.model.kind()
    }
}

impl FromStr for PipelineTokenizer {
    type Err = TokenizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

impl Tokenizer for PipelineTokenizer {
    fn encode(&self, text: &str, add_special_tokens: bool) -> TokenizerResult<Vec<u32>> {
        Ok(PipelineTokenizer::encode(self, text, add_special_tokens)?.ids)
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> TokenizerResult<String> {
        PipelineTokenizer::decode(self, ids, skip_special_tokens)
    }

    fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocabulary.token_to_id(token)
    }

    fn id_to_token(&self, id: u32) -> Option<&str> {
        self.vocabulary.id_to_token(id)
    }
}
