//! Byte-Pair Encoding: merges applied in rank order

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use serde::Deserialize;

use crate::api::error::ConfigError;
use crate::api::types::Token;
use crate::spi::contract::Model;

/// A merge rule as stored on disk: `"a b"` or `["a", "b"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MergeEntry {
    Joined(String),
    Pair(String, String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BpeConfig {
    #[serde(default)]
    pub vocab: HashMap<String, u32>,
    #[serde(default)]
    pub merges: Vec<MergeEntry>,
    #[serde(default)]
    pub dropout: Option<f32>,
    #[serde(default)]
    pub unk_token: Option<String>,
    #[serde(default)]
    pub continuing_subword_prefix: Option<String>,
    #[serde(default)]
    pub end_of_word_suffix: Option<String>,
    #[serde(default)]
    pub fuse_unk: bool,
    #[serde(default)]
    pub byte_fallback: bool,
    #[serde(default)]
    pub ignore_merges: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "BpeConfig")]
pub struct Bpe {
    vocab: HashMap<String, u32>,
    vocab_r: HashMap<u32, String>,
    /// (left, right) -> (rank, merged id)
    merges: HashMap<(u32, u32), (u32, u32)>,
    /// Parsed but never applied; segmentation stays deterministic.
    pub dropout: Option<f32>,
    pub unk_token: Option<String>,
    pub continuing_subword_prefix: Option<String>,
    pub end_of_word_suffix: Option<String>,
    pub fuse_unk: bool,
    pub byte_fallback: bool,
    pub ignore_merges: bool,
}

impl TryFrom<BpeConfig> for Bpe {
    type Error = ConfigError;

    fn try_from(config: BpeConfig) -> Result<Self, Self::Error> {
        let prefix_len = config
            .continuing_subword_prefix
            .as_ref()
            .map_or(0, String::len);
        let lookup = |rank: usize, token: &str| {
            config.vocab.get(token).copied().ok_or_else(|| {
                ConfigError::field(
                    format!("merges[{rank}]"),
                    format!("token {token:?} is not in the vocabulary"),
                )
            })
        };

        let mut merges = HashMap::with_capacity(config.merges.len());
        for (rank, entry) in config.merges.iter().enumerate() {
            let (a, b) = match entry {
                MergeEntry::Pair(a, b) => (a.as_str(), b.as_str()),
                MergeEntry::Joined(s) => s.split_once(' ').ok_or_else(|| {
                    ConfigError::field(
                        format!("merges[{rank}]"),
                        format!("{s:?} is not a space separated pair"),
                    )
                })?,
            };
            let merged = match config.continuing_subword_prefix.as_deref() {
                Some(prefix) if b.starts_with(prefix) => format!("{a}{}", &b[prefix_len..]),
                _ => format!("{a}{b}"),
            };
            let key = (lookup(rank, a)?, lookup(rank, b)?);
            let new_id = lookup(rank, &merged)?;
            merges.entry(key).or_insert((rank as u32, new_id));
        }

        let vocab_r = config.vocab.iter().map(|(k, &v)| (v, k.clone())).collect();
        Ok(Self {
            vocab: config.vocab,
            vocab_r,
            merges,
            dropout: config.dropout,
            unk_token: config.unk_token,
            continuing_subword_prefix: config.continuing_subword_prefix,
            end_of_word_suffix: config.end_of_word_suffix,
            fuse_unk: config.fuse_unk,
            byte_fallback: config.byte_fallback,
            ignore_merges: config.ignore_merges,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Symbol {
    id: u32,
    start: usize,
    end: usize,
    prev: Option<usize>,
    next: Option<usize>,
    merged_away: bool,
}

impl Bpe {
    pub fn builder() -> BpeBuilder {
        BpeBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(unk) = &self.unk_token {
            if !self.vocab.contains_key(unk) {
                return Err(ConfigError::field(
                    "unk_token",
                    format!("unknown token {unk:?} is not in the vocabulary"),
                ));
            }
        }
        if let Some(p) = self.dropout {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::field("dropout", format!("{p} is not within [0, 1]")));
            }
        }
        Ok(())
    }

    /// Initial symbols: one per char (or one per byte with byte fallback).
    fn initial_symbols(&self, chars: &[char]) -> Vec<Symbol> {
        let unk_id = self.unk_token.as_ref().and_then(|u| self.vocab.get(u)).copied();
        let last = chars.len().saturating_sub(1);
        let mut symbols: Vec<Symbol> = Vec::with_capacity(chars.len());
        let mut pending_unk: Option<Symbol> = None;
        let symbol = |id, start| Symbol {
            id,
            start,
            end: start + 1,
            prev: None,
            next: None,
            merged_away: false,
        };

        for (i, &c) in chars.iter().enumerate() {
            let mut piece = String::new();
            if i > 0 {
                if let Some(prefix) = &self.continuing_subword_prefix {
                    piece.push_str(prefix);
                }
            }
            piece.push(c);
            if i == last {
                if let Some(suffix) = &self.end_of_word_suffix {
                    piece.push_str(suffix);
                }
            }

            if let Some(&id) = self.vocab.get(&piece) {
                symbols.extend(pending_unk.take());
                symbols.push(symbol(id, i));
                continue;
            }
            if self.byte_fallback {
                let mut buf = [0u8; 4];
                let ids: Option<Vec<u32>> = c
                    .encode_utf8(&mut buf)
                    .bytes()
                    .map(|b| self.vocab.get(&format!("<0x{b:02X}>")).copied())
                    .collect();
                if let Some(ids) = ids {
                    symbols.extend(pending_unk.take());
                    symbols.extend(ids.into_iter().map(|id| symbol(id, i)));
                    continue;
                }
            }
            let Some(unk_id) = unk_id else {
                log::trace!("dropping char {c:?}: not in vocabulary and no unknown token");
                continue;
            };
            if !self.fuse_unk {
                symbols.push(symbol(unk_id, i));
            } else if let Some(unk) = pending_unk.as_mut() {
                unk.end = i + 1;
            } else {
                pending_unk = Some(symbol(unk_id, i));
            }
        }
        symbols.extend(pending_unk);

        let n = symbols.len();
        for (i, s) in symbols.iter_mut().enumerate() {
            s.prev = i.checked_sub(1);
            s.next = (i + 1 < n).then_some(i + 1);
        }
        symbols
    }

    fn merge_all(&self, symbols: &mut [Symbol]) {
        let mut queue: BinaryHeap<Reverse<(u32, usize, u32)>> = symbols
            .windows(2)
            .enumerate()
            .filter_map(|(pos, w)| {
                self.merges
                    .get(&(w[0].id, w[1].id))
                    .map(|&(rank, new_id)| Reverse((rank, pos, new_id)))
            })
            .collect();

        while let Some(Reverse((rank, pos, new_id))) = queue.pop() {
            let left = symbols[pos];
            if left.merged_away {
                continue;
            }
            let Some(right_pos) = left.next else {
                continue;
            };
            let right = symbols[right_pos];
            if self.merges.get(&(left.id, right.id)) != Some(&(rank, new_id)) {
                continue;
            }

            symbols[pos].id = new_id;
            symbols[pos].end = right.end;
            symbols[pos].next = right.next;
            symbols[right_pos].merged_away = true;
            if let Some(next) = right.next {
                symbols[next].prev = Some(pos);
            }

            let merged = symbols[pos];
            if let Some(prev) = merged.prev {
                if let Some(&(r, id)) = self.merges.get(&(symbols[prev].id, merged.id)) {
                    queue.push(Reverse((r, prev, id)));
                }
            }
            if let Some(next) = merged.next {
                if let Some(&(r, id)) = self.merges.get(&(merged.id, symbols[next].id)) {
                    queue.push(Reverse((r, pos, id)));
                }
            }
        }
    }

    fn token(&self, id: u32, offsets: (usize, usize)) -> Token {
        let value = self.vocab_r.get(&id).cloned().unwrap_or_default();
        Token::new(id, value, offsets)
    }
}

impl Model for Bpe {
    fn tokenize(&self, sequence: &str) -> Vec<Token> {
        let chars: Vec<char> = sequence.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }
        if self.ignore_merges {
            if let Some(&id) = self.vocab.get(sequence) {
                return vec![Token::new(id, sequence, (0, chars.len()))];
            }
        }
        let mut symbols = self.initial_symbols(&chars);
        self.merge_all(&mut symbols);
        symbols
            .iter()
            .filter(|s| !s.merged_away)
            .map(|s| self.token(s.id, (s.start, s.end)))
            .collect()
    }

    fn vocab(&self) -> HashMap<String, u32> {
        self.vocab.clone()
    }

    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    fn unk_id(&self) -> Option<u32> {
        self.unk_token.as_ref().and_then(|u| self.vocab.get(u)).copied()
    }
}

/// Programmatic construction, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct BpeBuilder {
    config: Option<BpeConfig>,
}

impl BpeBuilder {
    fn config(&mut self) -> &mut BpeConfig {
        self.config.get_or_insert_with(|| BpeConfig {
            vocab: HashMap::new(),
            merges: Vec::new(),
            dropout: None,
            unk_token: None,
            continuing_subword_prefix: None,
            end_of_word_suffix: None,
            fuse_unk: false,
            byte_fallback: false,
            ignore_merges: false,
        })
    }

    pub fn vocab_and_merges(mut self, vocab: HashMap<String, u32>, merges: Vec<(String, String)>) -> Self {
        let config = self.config();
        config.vocab = vocab;
        config.merges = merges.into_iter().map(|(a, b)| MergeEntry::Pair(a, b)).collect();
        self
    }

    pub fn unk_token(mut self, unk: &str) -> Self {
        self.config().unk_token = Some(unk.to_string());
        self
    }

    pub fn continuing_subword_prefix(mut self, prefix: &str) -> Self {
        self.config().continuing_subword_prefix = Some(prefix.to_string());
        self
    }

    pub fn end_of_word_suffix(mut self, suffix: &str) -> Self {
        self.config().end_of_word_suffix = Some(suffix.to_string());
        self
    }

    pub fn fuse_unk(mut self, fuse: bool) -> Self {
        self.config().fuse_unk = fuse;
        self
    }

    pub fn byte_fallback(mut self, enabled: bool) -> Self {
        self.config().byte_fallback = enabled;
        self
    }

    pub fn ignore_merges(mut self, enabled: bool) -> Self {
        self.config().ignore_merges = enabled;
        self
    }

    pub fn build(mut self) -> Result<Bpe, ConfigError> {
        let config = self.config().clone();
        let bpe = Bpe::try_from(config)?;
        bpe.validate()?;
        Ok(bpe)
    }
}
