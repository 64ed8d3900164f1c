//! Facade re-exports for rustml-tokenizers

pub use crate::api::error::*;
pub use crate::api::types::*;
pub use crate::spi::contract::{Decoder, Model, Normalizer, PostProcessor, PreTokenizer, Tokenizer};
pub use crate::core::pipeline::PipelineTokenizer;
pub use crate::core::registry::{create, decode, encode, global, release, TokenizerRegistry};
pub use crate::core::vocab::{SpecialTokens, Vocabulary};
pub use crate::core::config::{parse as parse_config, TokenizerConfig};
pub use crate::core::added_vocabulary::{AddedToken, AddedVocabulary};
pub use crate::core::normalized::{
    NormalizationForm, NormalizedString, Pattern, PreTokenizedString, Split, SplitDelimiterBehavior,
};
pub use crate::core::normalizer::{BertNormalizer, NormalizerWrapper};
pub use crate::core::pre_tokenizer::{Metaspace, PrependScheme, PreTokenizerWrapper};
pub use crate::core::byte_level::ByteLevel;
pub use crate::core::model::{
    bpe::{Bpe, BpeBuilder},
    unigram::Unigram,
    word_level::WordLevel,
    wordpiece::WordPiece,
    ModelWrapper,
};
pub use crate::core::post_processor::{PostProcessorWrapper, TemplateProcessing};
pub use crate::core::decoder::DecoderWrapper;
pub use crate::core::truncation::{TruncationDirection, TruncationParams, TruncationStrategy};
pub use crate::core::padding::{PaddingDirection, PaddingParams, PaddingStrategy};
