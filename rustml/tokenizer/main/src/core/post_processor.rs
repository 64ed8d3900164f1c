//! Post-processors: insert special tokens around an encoded sequence

use std::collections::HashMap;

use serde::Deserialize;

use crate::api::error::ConfigError;
use crate::api::types::Encoding;
use crate::core::byte_level::{trim_offsets, ByteLevel};
use crate::spi::contract::PostProcessor;

/// Which input a `Sequence` piece refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Sequence {
    A,
    B,
}

/// One element of a template.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum Piece {
    Sequence {
        id: Sequence,
        #[serde(default)]
        type_id: u32,
    },
    SpecialToken {
        id: String,
        #[serde(default)]
        type_id: u32,
    },
}

impl Piece {
    /// Parse the short form: `$A`, `$B:1`, `$0`, `[SEP]:1`.
    fn parse(s: &str) -> Result<Self, ConfigError> {
        let (name, type_id) = match s.rsplit_once(':') {
            Some((name, t)) if !name.is_empty() => {
                let type_id = t
                    .parse()
                    .map_err(|_| ConfigError::new(format!("invalid type id in template piece {s:?}")))?;
                (name, type_id)
            }
            _ => (s, 0),
        };
        match name.strip_prefix('$') {
            Some("" | "A" | "a") => Ok(Piece::Sequence { id: Sequence::A, type_id }),
            Some("B" | "b") => Ok(Piece::Sequence { id: Sequence::B, type_id }),
            Some(n) => match n.parse::<u32>() {
                Ok(t) if !s.contains(':') => Ok(Piece::Sequence { id: Sequence::A, type_id: t }),
                _ => Err(ConfigError::new(format!("invalid template piece {s:?}"))),
            },
            None => Ok(Piece::SpecialToken { id: name.to_string(), type_id }),
        }
    }
}

/// A template as written in the configuration: a piece list or a short string.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum TemplateConfig {
    Text(String),
    Pieces(Vec<Piece>),
}

/// A validated list of template pieces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "TemplateConfig")]
pub struct Template(pub Vec<Piece>);

impl TryFrom<TemplateConfig> for Template {
    type Error = ConfigError;

    fn try_from(config: TemplateConfig) -> Result<Self, Self::Error> {
        match config {
            TemplateConfig::Pieces(pieces) => Ok(Self(pieces)),
            TemplateConfig::Text(text) => text
                .split_whitespace()
                .map(Piece::parse)
                .collect::<Result<Vec<_>, _>>()
                .map(Self),
        }
    }
}

impl Template {
    fn count(&self, which: Sequence) -> usize {
        self.0
            .iter()
            .filter(|p| matches!(p, Piece::Sequence { id, .. } if *id == which))
            .count()
    }
}

/// The ids a template special token expands to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpecialToken {
    pub id: String,
    pub ids: Vec<u32>,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateProcessing {
    pub single: Template,
    #[serde(default)]
    pub pair: Template,
    #[serde(default)]
    pub special_tokens: HashMap<String, SpecialToken>,
}

impl TemplateProcessing {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.single.count(Sequence::A) != 1 || self.single.count(Sequence::B) != 0 {
            return Err(ConfigError::field(
                "single",
                "template must contain exactly one $A and no $B",
            ));
        }
        if !self.pair.0.is_empty()
            && (self.pair.count(Sequence::A) != 1 || self.pair.count(Sequence::B) != 1)
        {
            return Err(ConfigError::field(
                "pair",
                "template must contain exactly one $A and one $B",
            ));
        }
        for (name, template) in [("single", &self.single), ("pair", &self.pair)] {
            for piece in &template.0 {
                if let Piece::SpecialToken { id, .. } = piece {
                    if !self.special_tokens.contains_key(id) {
                        return Err(ConfigError::field(
                            name,
                            format!("missing definition for special token {id:?}"),
                        ));
                    }
                }
            }
        }
        for (key, special) in &self.special_tokens {
            if special.ids.len() != special.tokens.len() {
                return Err(ConfigError::field(
                    format!("special_tokens.{key}"),
                    "ids and tokens must have the same length",
                ));
            }
        }
        Ok(())
    }

    fn special_len(&self, template: &Template) -> usize {
        template
            .0
            .iter()
            .map(|p| match p {
                Piece::SpecialToken { id, .. } => self.special_tokens.get(id).map_or(0, |s| s.ids.len()),
                Piece::Sequence { .. } => 0,
            })
            .sum()
    }

    fn apply(&self, encoding: Encoding) -> Encoding {
        let mut out = Encoding::with_capacity(encoding.len() + self.special_len(&self.single));
        let mut sequence = Some(encoding);
        for piece in &self.single.0 {
            match piece {
                Piece::Sequence { type_id, .. } => {
                    if let Some(mut seq) = sequence.take() {
                        seq.set_type_id(*type_id);
                        out.extend(seq);
                    }
                }
                Piece::SpecialToken { id, type_id } => {
                    if let Some(special) = self.special_tokens.get(id) {
                        for (&sid, token) in special.ids.iter().zip(&special.tokens) {
                            out.push(sid, token.clone(), None, (0, 0), *type_id, true);
                        }
                    }
                }
            }
        }
        out
    }

    /// First special id before the sequence and last one after it.
    fn bos_eos(&self) -> (Option<u32>, Option<u32>) {
        let pieces = &self.single.0;
        let Some(seq) = pieces.iter().position(|p| matches!(p, Piece::Sequence { .. })) else {
            return (None, None);
        };
        let ids_of = |p: &Piece| match p {
            Piece::SpecialToken { id, .. } => self.special_tokens.get(id).map(|s| s.ids.clone()),
            Piece::Sequence { .. } => None,
        };
        let bos = pieces[..seq].iter().find_map(ids_of).and_then(|ids| ids.first().copied());
        let eos = pieces[seq + 1..]
            .iter()
            .rev()
            .find_map(ids_of)
            .and_then(|ids| ids.last().copied());
        (bos, eos)
    }
}

/// `[CLS] A [SEP]`
#[derive(Debug, Clone, Deserialize)]
pub struct BertProcessing {
    pub sep: (String, u32),
    pub cls: (String, u32),
}

impl BertProcessing {
    fn apply(&self, encoding: Encoding) -> Encoding {
        let mut out = Encoding::with_capacity(encoding.len() + 2);
        out.push(self.cls.1, self.cls.0.clone(), None, (0, 0), 0, true);
        out.extend(encoding);
        out.push(self.sep.1, self.sep.0.clone(), None, (0, 0), 0, true);
        out
    }
}

fn default_true() -> bool {
    true
}

/// `<s> A </s>`, with optional byte-level offset trimming.
#[derive(Debug, Clone, Deserialize)]
pub struct RobertaProcessing {
    pub sep: (String, u32),
    pub cls: (String, u32),
    #[serde(default = "default_true")]
    pub trim_offsets: bool,
    #[serde(default = "default_true")]
    pub add_prefix_space: bool,
}

impl RobertaProcessing {
    fn apply(&self, mut encoding: Encoding) -> Encoding {
        if self.trim_offsets {
            trim_offsets(&mut encoding, self.add_prefix_space);
        }
        let mut out = Encoding::with_capacity(encoding.len() + 2);
        out.push(self.cls.1, self.cls.0.clone(), None, (0, 0), 0, true);
        out.extend(encoding);
        out.push(self.sep.1, self.sep.0.clone(), None, (0, 0), 0, true);
        out
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostProcessorSequence {
    pub processors: Vec<PostProcessorWrapper>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum PostProcessorWrapper {
    TemplateProcessing(TemplateProcessing),
    BertProcessing(BertProcessing),
    RobertaProcessing(RobertaProcessing),
    ByteLevel(ByteLevel),
    Sequence(PostProcessorSequence),
}

impl PostProcessorWrapper {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::TemplateProcessing(t) => t.validate(),
            Self::Sequence(s) => s.processors.iter().enumerate().try_for_each(|(i, p)| {
                p.validate().map_err(|e| e.within(&format!("processors[{i}]")))
            }),
            _ => Ok(()),
        }
    }

    /// Every (token, id) pair this processor may insert.
    pub fn special_tokens(&self) -> Vec<(String, u32)> {
        match self {
            Self::TemplateProcessing(t) => {
                let mut out: Vec<(String, u32)> = t
                    .special_tokens
                    .values()
                    .flat_map(|s| s.tokens.iter().cloned().zip(s.ids.iter().copied()))
                    .collect();
                out.sort_by_key(|(_, id)| *id);
                out
            }
            Self::BertProcessing(BertProcessing { sep, cls })
            | Self::RobertaProcessing(RobertaProcessing { sep, cls, .. }) => {
                vec![cls.clone(), sep.clone()]
            }
            Self::ByteLevel(_) => Vec::new(),
            Self::Sequence(s) => s.processors.iter().flat_map(|p| p.special_tokens()).collect(),
        }
    }

    /// Ids this processor puts at the start and end of a sequence.
    pub fn bos_eos(&self) -> (Option<u32>, Option<u32>) {
        match self {
            Self::TemplateProcessing(t) => t.bos_eos(),
            Self::BertProcessing(BertProcessing { sep, cls })
            | Self::RobertaProcessing(RobertaProcessing { sep, cls, .. }) => (Some(cls.1), Some(sep.1)),
            Self::ByteLevel(_) => (None, None),
            Self::Sequence(s) => s.processors.iter().fold((None, None), |(bos, eos), p| {
                let (b, e) = p.bos_eos();
                (bos.or(b), e.or(eos))
            }),
        }
    }

    fn apply(&self, encoding: Encoding, add_special_tokens: bool) -> Encoding {
        match self {
            Self::ByteLevel(b) => b.process(encoding, add_special_tokens),
            Self::Sequence(s) => s
                .processors
                .iter()
                .fold(encoding, |enc, p| p.apply(enc, add_special_tokens)),
            _ if !add_special_tokens => encoding,
            Self::TemplateProcessing(t) => t.apply(encoding),
            Self::BertProcessing(b) => b.apply(encoding),
            Self::RobertaProcessing(r) => r.apply(encoding),
        }
    }
}

impl PostProcessor for PostProcessorWrapper {
    fn added_tokens(&self, is_pair: bool) -> usize {
        match self {
            Self::TemplateProcessing(t) => t.special_len(if is_pair { &t.pair } else { &t.single }),
            Self::BertProcessing(_) => {
                if is_pair {
                    3
                } else {
                    2
                }
            }
            Self::RobertaProcessing(_) => {
                if is_pair {
                    4
                } else {
                    2
                }
            }
            Self::ByteLevel(_) => 0,
            Self::Sequence(s) => s.processors.iter().map(|p| p.added_tokens(is_pair)).sum(),
        }
    }

    fn process(&self, mut encoding: Encoding, add_special_tokens: bool) -> Encoding {
        let overflowing = std::mem::take(&mut encoding.overflowing);
        let mut out = self.apply(encoding, add_special_tokens);
        out.overflowing = overflowing
            .into_iter()
            .map(|o| self.apply(o, add_special_tokens))
            .collect();
        out
    }
}
