//! Text with alignment back to the original input
//!
//! Every char of a [`NormalizedString`] remembers the range of original chars
//! it was derived from, so tokens produced after normalization and splitting
//! can still report offsets into the caller's text.

use std::ops::Range;

use unicode_normalization::char::canonical_combining_class;
use unicode_normalization::UnicodeNormalization;

use crate::api::error::TokenizerResult;
use crate::api::types::{Encoding, Offsets, Token};

/// Unicode normalization forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationForm {
    Nfc,
    Nfd,
    Nfkc,
    Nfkd,
}

impl NormalizationForm {
    fn apply(self, text: &str) -> Vec<char> {
        match self {
            Self::Nfc => text.nfc().collect(),
            Self::Nfd => text.nfd().collect(),
            Self::Nfkc => text.nfkc().collect(),
            Self::Nfkd => text.nfkd().collect(),
        }
    }

    fn is_normalized(self, text: &str) -> bool {
        match self {
            Self::Nfc => unicode_normalization::is_nfc(text),
            Self::Nfd => unicode_normalization::is_nfd(text),
            Self::Nfkc => unicode_normalization::is_nfkc(text),
            Self::Nfkd => unicode_normalization::is_nfkd(text),
        }
    }
}

/// What to match when splitting or replacing.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(fancy_regex::Regex),
    Char(char),
    Class(fn(char) -> bool),
}

impl Pattern {
    /// Char ranges of `text`, covering it completely, each flagged as a match
    /// or the gap between matches. Empty matches are ignored.
    pub fn find_matches(&self, text: &str) -> TokenizerResult<Vec<(Range<usize>, bool)>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let byte_matches: Vec<Range<usize>> = match self {
            Pattern::Literal(lit) if lit.is_empty() => Vec::new(),
            Pattern::Literal(lit) => text
                .match_indices(lit.as_str())
                .map(|(start, m)| start..start + m.len())
                .collect(),
            Pattern::Regex(re) => {
                let mut out = Vec::new();
                for m in re.find_iter(text) {
                    let m = m?;
                    if m.start() < m.end() {
                        out.push(m.start()..m.end());
                    }
                }
                out
            }
            Pattern::Char(target) => text
                .char_indices()
                .filter(|(_, c)| c == target)
                .map(|(i, c)| i..i + c.len_utf8())
                .collect(),
            Pattern::Class(pred) => text
                .char_indices()
                .filter(|(_, c)| pred(*c))
                .map(|(i, c)| i..i + c.len_utf8())
                .collect(),
        };

        let starts: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let to_char = |byte: usize| starts.partition_point(|&s| s < byte);
        let total = starts.len();

        let mut out = Vec::with_capacity(byte_matches.len() * 2 + 1);
        let mut last = 0;
        for m in byte_matches {
            let (start, end) = (to_char(m.start), to_char(m.end));
            if start > last {
                out.push((last..start, false));
            }
            out.push((start..end, true));
            last = end;
        }
        if last < total {
            out.push((last..total, false));
        }
        Ok(out)
    }
}

/// Serialized form of a pattern: `{"String": "..."}` or `{"Regex": "..."}`.
#[derive(Debug, Clone, serde::Deserialize)]
pub enum PatternConfig {
    String(String),
    Regex(String),
}

impl TryFrom<PatternConfig> for Pattern {
    type Error = String;

    fn try_from(config: PatternConfig) -> Result<Self, Self::Error> {
        match config {
            PatternConfig::String(s) => Ok(Pattern::Literal(s)),
            PatternConfig::Regex(re) => fancy_regex::Regex::new(&re)
                .map(Pattern::Regex)
                .map_err(|e| format!("invalid regex {re:?}: {e}")),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Pattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let config = PatternConfig::deserialize(deserializer)?;
        Pattern::try_from(config).map_err(serde::de::Error::custom)
    }
}

/// How the delimiters found by a [`Pattern`] take part in the split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub enum SplitDelimiterBehavior {
    Removed,
    Isolated,
    MergedWithPrevious,
    MergedWithNext,
    Contiguous,
}

impl SplitDelimiterBehavior {
    /// Reduce flagged ranges to the ranges that survive as pieces.
    pub fn apply(self, matches: Vec<(Range<usize>, bool)>) -> Vec<Range<usize>> {
        let mut previous_match = false;
        match self {
            Self::Isolated => matches.into_iter().map(|(r, _)| r).collect(),
            Self::Removed => matches
                .into_iter()
                .filter(|(_, is_match)| !is_match)
                .map(|(r, _)| r)
                .collect(),
            Self::MergedWithPrevious => {
                let mut acc: Vec<Range<usize>> = Vec::new();
                for (range, is_match) in matches {
                    match acc.last_mut() {
                        Some(last) if is_match && !previous_match => last.end = range.end,
                        _ => acc.push(range),
                    }
                    previous_match = is_match;
                }
                acc
            }
            Self::MergedWithNext => {
                let mut acc: Vec<Range<usize>> = Vec::new();
                for (range, is_match) in matches.into_iter().rev() {
                    match acc.last_mut() {
                        Some(last) if is_match && !previous_match => last.start = range.start,
                        _ => acc.push(range),
                    }
                    previous_match = is_match;
                }
                acc.reverse();
                acc
            }
            Self::Contiguous => {
                let mut acc: Vec<Range<usize>> = Vec::new();
                for (range, is_match) in matches {
                    match acc.last_mut() {
                        Some(last) if is_match == previous_match => last.end = range.end,
                        _ => acc.push(range),
                    }
                    previous_match = is_match;
                }
                acc
            }
        }
    }
}

/// A normalized view of (part of) the original input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedString {
    normalized: String,
    /// Original char range for each char of `normalized`.
    alignments: Vec<Offsets>,
    /// Original char range this string stands for, kept for empty strings.
    span: Offsets,
}

impl NormalizedString {
    /// Wrap original text whose first char sits at char offset `start`.
    pub fn from_original(text: &str, start: usize) -> Self {
        let alignments: Vec<Offsets> = (start..).zip(text.chars()).map(|(i, _)| (i, i + 1)).collect();
        let end = start + alignments.len();
        Self {
            normalized: text.to_string(),
            alignments,
            span: (start, end),
        }
    }

    pub fn get(&self) -> &str {
        &self.normalized
    }

    pub fn len(&self) -> usize {
        self.alignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alignments.is_empty()
    }

    /// Original char offsets for the normalized char range `range`.
    pub fn original_offsets(&self, range: Range<usize>) -> Offsets {
        if range.start >= range.end || range.start >= self.alignments.len() {
            let at = self
                .alignments
                .get(range.start)
                .map_or(self.span.1, |a| a.0);
            return (at, at);
        }
        let end = range.end.min(self.alignments.len());
        (self.alignments[range.start].0, self.alignments[end - 1].1)
    }

    /// Original char offsets covered by the whole string.
    pub fn offsets(&self) -> Offsets {
        if self.is_empty() {
            self.span
        } else {
            self.original_offsets(0..self.len())
        }
    }

    fn chars_with_alignments(&self) -> impl Iterator<Item = (char, Offsets)> + '_ {
        self.normalized.chars().zip(self.alignments.iter().copied())
    }

    fn rebuild(&mut self, chars: Vec<(char, Offsets)>) {
        self.normalized = chars.iter().map(|(c, _)| *c).collect();
        self.alignments = chars.into_iter().map(|(_, a)| a).collect();
    }

    /// Keep only chars for which `keep` holds.
    pub fn filter(&mut self, mut keep: impl FnMut(char) -> bool) {
        let chars = self.chars_with_alignments().filter(|(c, _)| keep(*c)).collect();
        self.rebuild(chars);
    }

    /// Replace each char by zero or more chars, all aligned to the source char.
    pub fn flat_map<I>(&mut self, mut f: impl FnMut(char) -> I)
    where
        I: IntoIterator<Item = char>,
    {
        let mut chars = Vec::with_capacity(self.len());
        for (c, align) in self.chars_with_alignments() {
            chars.extend(f(c).into_iter().map(|n| (n, align)));
        }
        self.rebuild(chars);
    }

    pub fn map(&mut self, mut f: impl FnMut(char) -> char) {
        self.flat_map(|c| std::iter::once(f(c)));
    }

    pub fn lowercase(&mut self) {
        self.flat_map(char::to_lowercase);
    }

    /// Apply a Unicode normalization form.
    ///
    /// Text is processed one combining sequence at a time; a sequence whose
    /// length changes aligns all of its output chars to the whole sequence.
    pub fn normalize_unicode(&mut self, form: NormalizationForm) {
        if form.is_normalized(&self.normalized) {
            return;
        }
        let chars: Vec<(char, Offsets)> = self.chars_with_alignments().collect();
        let mut out = Vec::with_capacity(chars.len());
        let mut start = 0;
        while start < chars.len() {
            let mut end = start + 1;
            while end < chars.len() && !starts_sequence(chars[end].0) {
                end += 1;
            }
            let run = &chars[start..end];
            let source: String = run.iter().map(|(c, _)| *c).collect();
            let normalized = form.apply(&source);
            if normalized.len() == run.len() {
                out.extend(normalized.into_iter().zip(run.iter().map(|(_, a)| *a)));
            } else {
                let span = (run[0].1 .0, run[run.len() - 1].1 .1);
                out.extend(normalized.into_iter().map(|c| (c, span)));
            }
            start = end;
        }
        self.rebuild(out);
    }

    /// Replace every match of `pattern` with `content`.
    pub fn replace(&mut self, pattern: &Pattern, content: &str) -> TokenizerResult<()> {
        let matches = pattern.find_matches(&self.normalized)?;
        if !matches.iter().any(|(_, m)| *m) {
            return Ok(());
        }
        let chars: Vec<(char, Offsets)> = self.chars_with_alignments().collect();
        let mut out = Vec::with_capacity(chars.len());
        for (range, is_match) in matches {
            if is_match {
                let span = (chars[range.start].1 .0, chars[range.end - 1].1 .1);
                out.extend(content.chars().map(|c| (c, span)));
            } else {
                out.extend_from_slice(&chars[range]);
            }
        }
        self.rebuild(out);
        Ok(())
    }

    /// Insert `prefix` before the first char. No-op on empty strings.
    pub fn prepend(&mut self, prefix: &str) {
        let Some(&first) = self.alignments.first() else {
            return;
        };
        let mut chars: Vec<(char, Offsets)> = prefix.chars().map(|c| (c, first)).collect();
        chars.extend(self.chars_with_alignments());
        self.rebuild(chars);
    }

    /// Drop leading and/or trailing whitespace.
    pub fn strip(&mut self, left: bool, right: bool) {
        let chars: Vec<(char, Offsets)> = self.chars_with_alignments().collect();
        let mut start = 0;
        let mut end = chars.len();
        if left {
            while start < end && chars[start].0.is_whitespace() {
                start += 1;
            }
        }
        if right {
            while end > start && chars[end - 1].0.is_whitespace() {
                end -= 1;
            }
        }
        if start == 0 && end == chars.len() {
            return;
        }
        if start == end {
            self.span = self.offsets();
        }
        self.rebuild(chars[start..end].to_vec());
    }

    /// Sub-string over the normalized char range `range`.
    pub fn slice(&self, range: Range<usize>) -> NormalizedString {
        let chars: Vec<(char, Offsets)> = self
            .chars_with_alignments()
            .skip(range.start)
            .take(range.end - range.start)
            .collect();
        let span = self.original_offsets(range);
        NormalizedString {
            normalized: chars.iter().map(|(c, _)| *c).collect(),
            alignments: chars.into_iter().map(|(_, a)| a).collect(),
            span,
        }
    }

    /// Split on `pattern`, keeping delimiters according to `behavior`.
    pub fn split(
        &self,
        pattern: &Pattern,
        behavior: SplitDelimiterBehavior,
        invert: bool,
    ) -> TokenizerResult<Vec<NormalizedString>> {
        let mut matches = pattern.find_matches(&self.normalized)?;
        if invert {
            matches.iter_mut().for_each(|(_, m)| *m = !*m);
        }
        Ok(behavior
            .apply(matches)
            .into_iter()
            .filter(|r| r.start < r.end)
            .map(|r| self.slice(r))
            .collect())
    }
}

/// Hangul vowel and trailing jamo have combining class 0 but still compose
/// with the preceding syllable.
fn starts_sequence(c: char) -> bool {
    canonical_combining_class(c) == 0 && !matches!(c as u32, 0x1161..=0x1175 | 0x11A8..=0x11C2)
}

/// One piece of a [`PreTokenizedString`].
#[derive(Debug, Clone)]
pub struct Split {
    pub normalized: NormalizedString,
    /// Set once the piece has been assigned tokens (added tokens, or the
    /// model); later stages leave it alone.
    pub tokens: Option<Vec<Token>>,
}

impl From<NormalizedString> for Split {
    fn from(normalized: NormalizedString) -> Self {
        Self {
            normalized,
            tokens: None,
        }
    }
}

/// The input text as an ordered list of splits, refined stage by stage.
#[derive(Debug, Clone)]
pub struct PreTokenizedString {
    splits: Vec<Split>,
}

impl PreTokenizedString {
    pub fn new(text: &str) -> Self {
        Self {
            splits: vec![NormalizedString::from_original(text, 0).into()],
        }
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    /// Replace every untokenized split by the pieces `f` returns. `f` receives
    /// the split index among all current splits. Empty pieces are dropped.
    pub fn split<F, S>(&mut self, mut f: F) -> TokenizerResult<()>
    where
        F: FnMut(usize, NormalizedString) -> TokenizerResult<Vec<S>>,
        S: Into<Split>,
    {
        let mut out = Vec::with_capacity(self.splits.len());
        for (i, split) in std::mem::take(&mut self.splits).into_iter().enumerate() {
            if split.tokens.is_some() {
                out.push(split);
                continue;
            }
            out.extend(
                f(i, split.normalized)?
                    .into_iter()
                    .map(Into::into)
                    .filter(|s: &Split| !s.normalized.is_empty()),
            );
        }
        self.splits = out;
        Ok(())
    }

    /// Normalize every untokenized split in place.
    pub fn normalize<F>(&mut self, mut f: F) -> TokenizerResult<()>
    where
        F: FnMut(&mut NormalizedString) -> TokenizerResult<()>,
    {
        for split in self.splits.iter_mut().filter(|s| s.tokens.is_none()) {
            f(&mut split.normalized)?;
        }
        Ok(())
    }

    /// Assign tokens to every untokenized split.
    pub fn tokenize<F>(&mut self, mut f: F) -> TokenizerResult<()>
    where
        F: FnMut(&NormalizedString) -> TokenizerResult<Vec<Token>>,
    {
        for split in self.splits.iter_mut().filter(|s| s.tokens.is_none()) {
            split.tokens = Some(f(&split.normalized)?);
        }
        Ok(())
    }

    /// Normalized text and original offsets of each split.
    pub fn get_splits(&self) -> Vec<(&str, Offsets)> {
        self.splits
            .iter()
            .map(|s| (s.normalized.get(), s.normalized.offsets()))
            .collect()
    }

    /// Flatten into an [`Encoding`]. Each split is one word; token offsets are
    /// mapped back to the original input.
    pub fn into_encoding(self, type_id: u32) -> Encoding {
        let mut encoding = Encoding::default();
        for (word, split) in self.splits.into_iter().enumerate() {
            let Some(tokens) = split.tokens else {
                continue;
            };
            for token in tokens {
                let offsets = split
                    .normalized
                    .original_offsets(token.offsets.0..token.offsets.1);
                encoding.push(
                    token.id,
                    token.value,
                    Some(word as u32),
                    offsets,
                    type_id,
                    false,
                );
            }
        }
        encoding
    }
}
