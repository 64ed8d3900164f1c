//! Data types produced by the tokenization pipeline

use std::fmt;

/// Char offsets `(start, end)` into the original input text.
pub type Offsets = (usize, usize);

/// A single piece produced by a segmentation model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: u32,
    pub value: String,
    /// Char offsets relative to the sequence handed to the model.
    pub offsets: Offsets,
}

impl Token {
    pub fn new(id: u32, value: impl Into<String>, offsets: Offsets) -> Self {
        Self {
            id,
            value: value.into(),
            offsets,
        }
    }
}

/// Detailed result of encoding one input.
///
/// All vectors have the same length. `ids` is the token sequence callers
/// usually want; the rest describes where each id came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoding {
    pub ids: Vec<u32>,
    pub type_ids: Vec<u32>,
    pub tokens: Vec<String>,
    /// Index of the pre-tokenized word each token belongs to; `None` for
    /// tokens inserted by post-processing or padding.
    pub words: Vec<Option<u32>>,
    pub offsets: Vec<Offsets>,
    pub special_tokens_mask: Vec<u32>,
    pub attention_mask: Vec<u32>,
    /// Windows cut off by truncation, each a complete encoding of its own.
    pub overflowing: Vec<Encoding>,
}

impl Encoding {
    pub fn with_capacity(len: usize) -> Self {
        Self {
            ids: Vec::with_capacity(len),
            type_ids: Vec::with_capacity(len),
            tokens: Vec::with_capacity(len),
            words: Vec::with_capacity(len),
            offsets: Vec::with_capacity(len),
            special_tokens_mask: Vec::with_capacity(len),
            attention_mask: Vec::with_capacity(len),
            overflowing: Vec::new(),
        }
    }

    /// Build from model tokens, all tagged with the same word index.
    pub fn from_tokens(tokens: Vec<Token>, word: Option<u32>, type_id: u32) -> Self {
        let mut encoding = Self::with_capacity(tokens.len());
        for token in tokens {
            encoding.push(token.id, token.value, word, token.offsets, type_id, false);
        }
        encoding
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn push(
        &mut self,
        id: u32,
        token: String,
        word: Option<u32>,
        offsets: Offsets,
        type_id: u32,
        special: bool,
    ) {
        self.ids.push(id);
        self.tokens.push(token);
        self.words.push(word);
        self.offsets.push(offsets);
        self.type_ids.push(type_id);
        self.special_tokens_mask.push(u32::from(special));
        self.attention_mask.push(1);
    }

    /// Append `other` after `self`. Overflowing windows are not merged.
    pub fn extend(&mut self, other: Encoding) {
        self.ids.extend(other.ids);
        self.type_ids.extend(other.type_ids);
        self.tokens.extend(other.tokens);
        self.words.extend(other.words);
        self.offsets.extend(other.offsets);
        self.special_tokens_mask.extend(other.special_tokens_mask);
        self.attention_mask.extend(other.attention_mask);
    }

    /// Copy of the token range `range`, without overflowing windows.
    pub fn slice(&self, range: std::ops::Range<usize>) -> Encoding {
        Encoding {
            ids: self.ids[range.clone()].to_vec(),
            type_ids: self.type_ids[range.clone()].to_vec(),
            tokens: self.tokens[range.clone()].to_vec(),
            words: self.words[range.clone()].to_vec(),
            offsets: self.offsets[range.clone()].to_vec(),
            special_tokens_mask: self.special_tokens_mask[range.clone()].to_vec(),
            attention_mask: self.attention_mask[range].to_vec(),
            overflowing: Vec::new(),
        }
    }

    pub fn set_type_id(&mut self, type_id: u32) {
        self.type_ids.iter_mut().for_each(|t| *t = type_id);
    }
}

/// Opaque key for a tokenizer stored in a [`TokenizerRegistry`].
///
/// Handles are never reused within a process, so a released handle stays
/// invalid.
///
/// [`TokenizerRegistry`]: crate::TokenizerRegistry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenizerHandle(pub(crate) u64);

impl TokenizerHandle {
    /// Raw numeric value, suitable for passing across a process boundary.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from its raw value. Validity is checked on use.
    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TokenizerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
