//! Pre-tokenizers: split normalized text into words for the model

use std::sync::OnceLock;

use serde::Deserialize;

use crate::api::error::TokenizerResult;
use crate::core::byte_level::ByteLevel;
use crate::core::normalized::{Pattern, PreTokenizedString, SplitDelimiterBehavior};
use crate::core::unicode::{is_punctuation, is_whitespace};
use crate::spi::contract::PreTokenizer;

/// Compile `source` once into `cell`.
pub(crate) fn cached_regex(
    cell: &'static OnceLock<Pattern>,
    source: &str,
) -> TokenizerResult<&'static Pattern> {
    if let Some(p) = cell.get() {
        return Ok(p);
    }
    let re = fancy_regex::Regex::new(source)?;
    Ok(cell.get_or_init(|| Pattern::Regex(re)))
}

fn split_all(
    pretokenized: &mut PreTokenizedString,
    pattern: &Pattern,
    behavior: SplitDelimiterBehavior,
    invert: bool,
) -> TokenizerResult<()> {
    pretokenized.split(|_, normalized| normalized.split(pattern, behavior, invert))
}

/// Whitespace split followed by isolating every punctuation char.
#[derive(Debug, Clone, Copy, Default)]
pub struct BertPreTokenizer;

impl PreTokenizer for BertPreTokenizer {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> TokenizerResult<()> {
        split_all(
            pretokenized,
            &Pattern::Class(is_whitespace),
            SplitDelimiterBehavior::Removed,
            false,
        )?;
        split_all(
            pretokenized,
            &Pattern::Class(is_punctuation),
            SplitDelimiterBehavior::Isolated,
            false,
        )
    }
}

/// Keeps runs of word chars and runs of other non-blank chars.
#[derive(Debug, Clone, Copy, Default)]
pub struct Whitespace;

static WHITESPACE_REGEX: OnceLock<Pattern> = OnceLock::new();

impl PreTokenizer for Whitespace {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> TokenizerResult<()> {
        let pattern = cached_regex(&WHITESPACE_REGEX, r"\w+|[^\w\s]+")?;
        split_all(pretokenized, pattern, SplitDelimiterBehavior::Removed, true)
    }
}

/// Splits on whitespace only.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceSplit;

impl PreTokenizer for WhitespaceSplit {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> TokenizerResult<()> {
        split_all(
            pretokenized,
            &Pattern::Class(char::is_whitespace),
            SplitDelimiterBehavior::Removed,
            false,
        )
    }
}

fn default_isolated() -> SplitDelimiterBehavior {
    SplitDelimiterBehavior::Isolated
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Punctuation {
    #[serde(default = "default_isolated")]
    pub behavior: SplitDelimiterBehavior,
}

impl PreTokenizer for Punctuation {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> TokenizerResult<()> {
        split_all(pretokenized, &Pattern::Class(is_punctuation), self.behavior, false)
    }
}

/// Separates digits from surrounding text, one by one or as runs.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Digits {
    #[serde(default)]
    pub individual_digits: bool,
}

impl PreTokenizer for Digits {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> TokenizerResult<()> {
        let behavior = if self.individual_digits {
            SplitDelimiterBehavior::Isolated
        } else {
            SplitDelimiterBehavior::Contiguous
        };
        split_all(pretokenized, &Pattern::Class(char::is_numeric), behavior, false)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CharDelimiterSplit {
    pub delimiter: char,
}

impl PreTokenizer for CharDelimiterSplit {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> TokenizerResult<()> {
        split_all(
            pretokenized,
            &Pattern::Char(self.delimiter),
            SplitDelimiterBehavior::Removed,
            false,
        )
    }
}

/// Generic split on a literal or regex pattern.
#[derive(Debug, Clone, Deserialize)]
pub struct Split {
    pub pattern: Pattern,
    pub behavior: SplitDelimiterBehavior,
    #[serde(default)]
    pub invert: bool,
}

impl PreTokenizer for Split {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> TokenizerResult<()> {
        split_all(pretokenized, &self.pattern, self.behavior, self.invert)
    }
}

/// When Metaspace adds the replacement char in front of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrependScheme {
    Always,
    /// Only in front of the first word of the input.
    First,
    Never,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaspaceConfig {
    #[serde(default = "default_replacement")]
    replacement: char,
    #[serde(default)]
    prepend_scheme: Option<PrependScheme>,
    #[serde(default)]
    add_prefix_space: Option<bool>,
    #[serde(default = "default_split")]
    split: bool,
}

fn default_replacement() -> char {
    '▁'
}

fn default_split() -> bool {
    true
}

/// SentencePiece style: spaces become a visible marker char.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "MetaspaceConfig")]
pub struct Metaspace {
    pub replacement: char,
    pub prepend_scheme: PrependScheme,
    pub split: bool,
}

impl From<MetaspaceConfig> for Metaspace {
    fn from(config: MetaspaceConfig) -> Self {
        // Older files only carry `add_prefix_space`.
        let prepend_scheme = match (config.prepend_scheme, config.add_prefix_space) {
            (Some(scheme), _) => scheme,
            (None, Some(false)) => PrependScheme::Never,
            (None, _) => PrependScheme::Always,
        };
        Self {
            replacement: config.replacement,
            prepend_scheme,
            split: config.split,
        }
    }
}

impl Default for Metaspace {
    fn default() -> Self {
        Self {
            replacement: '▁',
            prepend_scheme: PrependScheme::Always,
            split: true,
        }
    }
}

impl PreTokenizer for Metaspace {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> TokenizerResult<()> {
        let marker = self.replacement.to_string();
        pretokenized.split(|_, mut normalized| {
            normalized.replace(&Pattern::Char(' '), &marker)?;
            let prepend = match self.prepend_scheme {
                PrependScheme::Always => true,
                PrependScheme::First => normalized.offsets().0 == 0,
                PrependScheme::Never => false,
            };
            if prepend && !normalized.get().starts_with(self.replacement) {
                normalized.prepend(&marker);
            }
            if self.split {
                normalized.split(
                    &Pattern::Char(self.replacement),
                    SplitDelimiterBehavior::MergedWithNext,
                    false,
                )
            } else {
                Ok(vec![normalized])
            }
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreTokenizerSequence {
    pub pretokenizers: Vec<PreTokenizerWrapper>,
}

impl PreTokenizer for PreTokenizerSequence {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> TokenizerResult<()> {
        for p in &self.pretokenizers {
            p.pre_tokenize(pretokenized)?;
        }
        Ok(())
    }
}

/// Every pre-tokenizer a configuration can name, keyed by its `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum PreTokenizerWrapper {
    BertPreTokenizer,
    ByteLevel(ByteLevel),
    CharDelimiterSplit(CharDelimiterSplit),
    Digits(Digits),
    Metaspace(Metaspace),
    Punctuation(Punctuation),
    Split(Split),
    Whitespace,
    WhitespaceSplit,
    Sequence(PreTokenizerSequence),
}

impl PreTokenizer for PreTokenizerWrapper {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> TokenizerResult<()> {
        match self {
            Self::BertPreTokenizer => BertPreTokenizer.pre_tokenize(pretokenized),
            Self::ByteLevel(p) => p.pre_tokenize(pretokenized),
            Self::CharDelimiterSplit(p) => p.pre_tokenize(pretokenized),
            Self::Digits(p) => p.pre_tokenize(pretokenized),
            Self::Metaspace(p) => p.pre_tokenize(pretokenized),
            Self::Punctuation(p) => p.pre_tokenize(pretokenized),
            Self::Split(p) => p.pre_tokenize(pretokenized),
            Self::Whitespace => Whitespace.pre_tokenize(pretokenized),
            Self::WhitespaceSplit => WhitespaceSplit.pre_tokenize(pretokenized),
            Self::Sequence(p) => p.pre_tokenize(pretokenized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(p: &impl PreTokenizer, text: &str) -> Vec<(String, (usize, usize))> {
        let mut pre = PreTokenizedString::new(text);
        p.pre_tokenize(&mut pre).unwrap();
        pre.get_splits()
            .into_iter()
            .map(|(s, o)| (s.to_string(), o))
            .collect()
    }

    fn owned(expected: &[(&str, (usize, usize))]) -> Vec<(String, (usize, usize))> {
        expected.iter().map(|(s, o)| (s.to_string(), *o)).collect()
    }

    #[test]
    fn test_bert_pre_tokenizer() {
        assert_eq!(
            run(&BertPreTokenizer, "Hey friend!     How are you?!?"),
            owned(&[
                ("Hey", (0, 3)),
                ("friend", (4, 10)),
                ("!", (10, 11)),
                ("How", (16, 19)),
                ("are", (20, 23)),
                ("you", (24, 27)),
                ("?", (27, 28)),
                ("!", (28, 29)),
                ("?", (29, 30)),
            ])
        );
    }

    #[test]
    fn test_whitespace() {
        assert_eq!(
            run(&Whitespace, "Hey man!"),
            owned(&[("Hey", (0, 3)), ("man", (4, 7)), ("!", (7, 8))])
        );
        assert_eq!(
            run(&Whitespace, "How are you doing?"),
            owned(&[
                ("How", (0, 3)),
                ("are", (4, 7)),
                ("you", (8, 11)),
                ("doing", (12, 17)),
                ("?", (17, 18)),
            ])
        );
    }

    #[test]
    fn test_whitespace_split() {
        assert_eq!(
            run(&WhitespaceSplit, "Hey man!"),
            owned(&[("Hey", (0, 3)), ("man!", (4, 8))])
        );
    }

    #[test]
    fn test_split_regex_isolated() {
        let p: PreTokenizerWrapper = serde_json::from_str(
            r#"{"type":"Split","pattern":{"Regex":"(?i:'s|'t|'re|'ve|'m|'ll|'d)|[^\\r\\n\\p{L}\\p{N}]?\\p{L}+|\\p{N}{1,3}| ?[^\\s\\p{L}\\p{N}]+[\\r\\n]*|\\s*[\\r\\n]+|\\s+(?!\\S)|\\s+"},"behavior":"Isolated","invert":false}"#,
        )
        .unwrap();
        let pieces: Vec<String> = run(&p, "Why don't you give 100 dollars?")
            .into_iter()
            .map(|(s, _)| s)
            .collect();
        assert_eq!(
            pieces,
            ["Why", " don", "'t", " you", " give", " ", "100", " dollars", "?"]
        );
    }

    #[test]
    fn test_bert_pre_tokenizer_cjk() {
        let pieces: Vec<String> = run(&BertPreTokenizer, "野 口 里 佳 Noguchi Rika")
            .into_iter()
            .map(|(s, _)| s)
            .collect();
        assert_eq!(pieces, ["野", "口", "里", "佳", "Noguchi", "Rika"]);
    }

    #[test]
    fn test_digits() {
        let joined = Digits {
            individual_digits: false,
        };
        assert_eq!(
            run(&joined, "Hey 123 friend!"),
            owned(&[("Hey ", (0, 4)), ("123", (4, 7)), (" friend!", (7, 15))])
        );
        let single = Digits {
            individual_digits: true,
        };
        assert_eq!(
            run(&single, "Hey 123 friend!"),
            owned(&[
                ("Hey ", (0, 4)),
                ("1", (4, 5)),
                ("2", (5, 6)),
                ("3", (6, 7)),
                (" friend!", (7, 15)),
            ])
        );
    }

    #[test]
    fn test_punctuation() {
        let p = Punctuation {
            behavior: SplitDelimiterBehavior::Isolated,
        };
        assert_eq!(
            run(&p, "Hey friend!"),
            owned(&[("Hey friend", (0, 10)), ("!", (10, 11))])
        );
    }

    #[test]
    fn test_char_delimiter() {
        let p = CharDelimiterSplit { delimiter: 'x' };
        assert_eq!(
            run(&p, "helloxworld"),
            owned(&[("hello", (0, 5)), ("world", (6, 11))])
        );
    }

    #[test]
    fn test_metaspace() {
        assert_eq!(
            run(&Metaspace::default(), "Hey   friend!"),
            owned(&[
                ("▁Hey", (0, 3)),
                ("▁", (3, 4)),
                ("▁", (4, 5)),
                ("▁friend!", (5, 13)),
            ])
        );
    }

    #[test]
    fn test_metaspace_legacy_add_prefix_space() {
        let p: PreTokenizerWrapper =
            serde_json::from_str(r#"{"type":"Metaspace","replacement":"▁","add_prefix_space":false}"#)
                .unwrap();
        assert_eq!(
            run(&p, "Hey friend"),
            owned(&[("Hey", (0, 3)), ("▁friend", (3, 10))])
        );
    }

    #[test]
    fn test_metaspace_first_scheme_only_at_start() {
        let p = Metaspace {
            prepend_scheme: PrependScheme::First,
            split: false,
            ..Metaspace::default()
        };
        let mut pre = PreTokenizedString::new("a b");
        WhitespaceSplit.pre_tokenize(&mut pre).unwrap();
        p.pre_tokenize(&mut pre).unwrap();
        let pieces: Vec<&str> = pre.get_splits().into_iter().map(|(s, _)| s).collect();
        assert_eq!(pieces, ["▁a", "b"]);
    }

    #[test]
    fn test_sequence() {
        let p: PreTokenizerWrapper = serde_json::from_str(
            r#"{"type":"Sequence","pretokenizers":[{"type":"WhitespaceSplit"},{"type":"Digits","individual_digits":true}]}"#,
        )
        .unwrap();
        let pieces: Vec<String> = run(&p, "ab12 c").into_iter().map(|(s, _)| s).collect();
        assert_eq!(pieces, ["ab", "1", "2", "c"]);
    }
}
