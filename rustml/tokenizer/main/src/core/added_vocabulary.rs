//! Added tokens: literal strings that bypass the model
//!
//! Tokens flagged `normalized: false` are matched on the raw input before
//! normalization; the others are matched on normalized text.

use std::collections::HashSet;

use aho_corasick::{AhoCorasick, MatchKind};
use serde::Deserialize;

use crate::api::error::{ConfigError, TokenizerResult};
use crate::api::types::Token;
use crate::core::normalized::{NormalizedString, PreTokenizedString, Split};
use crate::core::normalizer::NormalizerWrapper;
use crate::spi::contract::Normalizer;

fn default_true() -> bool {
    true
}

/// One entry of the `added_tokens` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddedToken {
    pub id: u32,
    pub content: String,
    /// Only match when not inside a word.
    #[serde(default)]
    pub single_word: bool,
    /// Absorb whitespace on the left of a match.
    #[serde(default)]
    pub lstrip: bool,
    /// Absorb whitespace on the right of a match.
    #[serde(default)]
    pub rstrip: bool,
    #[serde(default = "default_true")]
    pub normalized: bool,
    #[serde(default)]
    pub special: bool,
}

impl AddedToken {
    pub fn new(id: u32, content: &str, special: bool) -> Self {
        Self {
            id,
            content: content.to_string(),
            single_word: false,
            lstrip: false,
            rstrip: false,
            normalized: !special,
            special,
        }
    }
}

struct Matcher {
    automaton: AhoCorasick,
    /// Index into `AddedVocabulary::tokens` for each pattern.
    tokens: Vec<usize>,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("patterns", &self.tokens.len())
            .finish()
    }
}

impl Matcher {
    fn build(patterns: Vec<(String, usize)>) -> Result<Option<Self>, ConfigError> {
        if patterns.is_empty() {
            return Ok(None);
        }
        let (contents, tokens): (Vec<String>, Vec<usize>) = patterns.into_iter().unzip();
        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&contents)
            .map_err(|e| ConfigError::field("added_tokens", e.to_string()))?;
        Ok(Some(Self { automaton, tokens }))
    }
}

#[derive(Debug, Default)]
pub struct AddedVocabulary {
    tokens: Vec<AddedToken>,
    raw: Option<Matcher>,
    normalized: Option<Matcher>,
}

impl AddedVocabulary {
    /// Build the matchers. Contents of `normalized` tokens are run through
    /// `normalizer` so they match what the normalized text will contain.
    pub fn new(
        tokens: Vec<AddedToken>,
        normalizer: Option<&NormalizerWrapper>,
    ) -> TokenizerResult<Self> {
        let mut raw = Vec::new();
        let mut normalized = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            if token.content.is_empty() {
                return Err(
                    ConfigError::field(format!("added_tokens[{i}].content"), "must not be empty").into(),
                );
            }
            if token.normalized {
                let mut content = NormalizedString::from_original(&token.content, 0);
                if let Some(n) = normalizer {
                    n.normalize(&mut content)?;
                }
                if !content.is_empty() {
                    normalized.push((content.get().to_string(), i));
                }
            } else {
                raw.push((token.content.clone(), i));
            }
        }

        Ok(Self {
            raw: Matcher::build(raw)?,
            normalized: Matcher::build(normalized)?,
            tokens,
        })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn special_ids(&self) -> HashSet<u32> {
        self.tokens.iter().filter(|t| t.special).map(|t| t.id).collect()
    }

    /// Split `text` around added tokens and normalize everything else.
    pub fn extract_and_normalize(
        &self,
        normalizer: Option<&NormalizerWrapper>,
        text: &str,
    ) -> TokenizerResult<PreTokenizedString> {
        let mut pretokenized = PreTokenizedString::new(text);
        if let Some(matcher) = &self.raw {
            pretokenized.split(|_, seq| Ok(self.split_with(matcher, seq)))?;
        }
        if let Some(n) = normalizer {
            pretokenized.normalize(|seq| n.normalize(seq))?;
        }
        if let Some(matcher) = &self.normalized {
            pretokenized.split(|_, seq| Ok(self.split_with(matcher, seq)))?;
        }
        Ok(pretokenized)
    }

    fn split_with(&self, matcher: &Matcher, seq: NormalizedString) -> Vec<Split> {
        let text = seq.get();
        let mut found: Vec<(usize, usize, usize)> = Vec::new();
        let mut last_end = 0;
        for m in matcher.automaton.find_iter(text) {
            let token = &self.tokens[matcher.tokens[m.pattern().as_usize()]];
            let (mut start, mut end) = (m.start(), m.end());
            if token.single_word && !is_single_word(text, start, end) {
                continue;
            }
            if token.lstrip {
                start = text[..start]
                    .char_indices()
                    .rev()
                    .find(|(_, c)| !c.is_whitespace())
                    .map_or(0, |(i, c)| i + c.len_utf8())
                    .max(last_end);
            }
            if token.rstrip {
                end += text[end..]
                    .char_indices()
                    .find(|(_, c)| !c.is_whitespace())
                    .map_or(text.len() - end, |(i, _)| i);
            }
            found.push((start, end, matcher.tokens[m.pattern().as_usize()]));
            last_end = end;
        }
        if found.is_empty() {
            return vec![seq.into()];
        }

        let starts: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let to_char = |byte: usize| starts.partition_point(|&s| s < byte);
        let mut out = Vec::with_capacity(found.len() * 2 + 1);
        let mut cursor = 0;
        for (start, end, index) in found {
            let (cs, ce) = (to_char(start), to_char(end));
            // rstrip may run past the next match's start; skip what it swallowed
            if cs < cursor {
                continue;
            }
            if cs > cursor {
                out.push(seq.slice(cursor..cs).into());
            }
            let token = &self.tokens[index];
            out.push(Split {
                normalized: seq.slice(cs..ce),
                tokens: Some(vec![Token::new(token.id, token.content.clone(), (0, ce - cs))]),
            });
            cursor = ce;
        }
        if cursor < seq.len() {
            out.push(seq.slice(cursor..seq.len()).into());
        }
        out
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_single_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back().map_or(false, is_word_char);
    let after = text[end..].chars().next().map_or(false, is_word_char);
    !before && !after
}
