//! Normalizers: text rewrites applied before pre-tokenization

use serde::Deserialize;

use crate::api::error::TokenizerResult;
use crate::core::normalized::{NormalizationForm, NormalizedString, Pattern};
use crate::core::unicode::{is_chinese_char, is_combining_mark, is_control, is_whitespace};
use crate::spi::contract::Normalizer;

fn default_true() -> bool {
    true
}

/// BERT text cleanup: control chars, CJK spacing, accents, case.
#[derive(Debug, Clone, Deserialize)]
pub struct BertNormalizer {
    #[serde(default = "default_true")]
    pub clean_text: bool,
    #[serde(default = "default_true")]
    pub handle_chinese_chars: bool,
    /// `None` follows `lowercase`.
    #[serde(default)]
    pub strip_accents: Option<bool>,
    #[serde(default = "default_true")]
    pub lowercase: bool,
}

impl Default for BertNormalizer {
    fn default() -> Self {
        Self {
            clean_text: true,
            handle_chinese_chars: true,
            strip_accents: None,
            lowercase: true,
        }
    }
}

impl Normalizer for BertNormalizer {
    fn normalize(&self, normalized: &mut NormalizedString) -> TokenizerResult<()> {
        if self.clean_text {
            normalized.filter(|c| !(c == '\0' || c == '\u{fffd}' || is_control(c)));
            normalized.map(|c| if is_whitespace(c) { ' ' } else { c });
        }
        if self.handle_chinese_chars {
            normalized.flat_map(|c| {
                let pad = is_chinese_char(c);
                [pad.then_some(' '), Some(c), pad.then_some(' ')]
                    .into_iter()
                    .flatten()
            });
        }
        if self.strip_accents.unwrap_or(self.lowercase) {
            normalized.normalize_unicode(NormalizationForm::Nfd);
            normalized.filter(|c| !is_combining_mark(c));
        }
        if self.lowercase {
            normalized.lowercase();
        }
        Ok(())
    }
}

/// Removes leading and/or trailing whitespace.
#[derive(Debug, Clone, Deserialize)]
pub struct Strip {
    #[serde(default = "default_true")]
    pub strip_left: bool,
    #[serde(default = "default_true")]
    pub strip_right: bool,
}

impl Normalizer for Strip {
    fn normalize(&self, normalized: &mut NormalizedString) -> TokenizerResult<()> {
        normalized.strip(self.strip_left, self.strip_right);
        Ok(())
    }
}

/// Replaces every match of a literal or regex pattern.
#[derive(Debug, Clone, Deserialize)]
pub struct Replace {
    pub pattern: Pattern,
    pub content: String,
}

impl Normalizer for Replace {
    fn normalize(&self, normalized: &mut NormalizedString) -> TokenizerResult<()> {
        normalized.replace(&self.pattern, &self.content)
    }
}

/// Adds a fixed prefix to non-empty text.
#[derive(Debug, Clone, Deserialize)]
pub struct Prepend {
    pub prepend: String,
}

impl Normalizer for Prepend {
    fn normalize(&self, normalized: &mut NormalizedString) -> TokenizerResult<()> {
        normalized.prepend(&self.prepend);
        Ok(())
    }
}

/// Applies each normalizer in order.
#[derive(Debug, Clone, Deserialize)]
pub struct NormalizerSequence {
    pub normalizers: Vec<NormalizerWrapper>,
}

impl Normalizer for NormalizerSequence {
    fn normalize(&self, normalized: &mut NormalizedString) -> TokenizerResult<()> {
        for n in &self.normalizers {
            n.normalize(normalized)?;
        }
        Ok(())
    }
}

/// SentencePiece NMT cleanup: drops control bytes, maps odd spaces to ' '.
fn nmt(normalized: &mut NormalizedString) {
    normalized.filter(|c| {
        !matches!(
            c as u32,
            0x0001..=0x0008 | 0x000B | 0x000E..=0x001F | 0x007F | 0x008F | 0x009F
        )
    });
    normalized.map(|c| match c as u32 {
        0x0009 | 0x000A | 0x000C | 0x000D | 0x1680 | 0x200B..=0x200F | 0x2028 | 0x2029
        | 0x2581 | 0xFEFF | 0xFFFD => ' ',
        _ => c,
    });
}

/// Every normalizer a configuration can name, keyed by its `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum NormalizerWrapper {
    BertNormalizer(BertNormalizer),
    Lowercase,
    #[serde(rename = "NFC")]
    Nfc,
    #[serde(rename = "NFD")]
    Nfd,
    #[serde(rename = "NFKC")]
    Nfkc,
    #[serde(rename = "NFKD")]
    Nfkd,
    StripAccents,
    Strip(Strip),
    Replace(Replace),
    Prepend(Prepend),
    Nmt,
    /// SentencePiece charsmap; applied as NFKC, which is what the common
    /// `nmt_nfkc` maps compile to.
    Precompiled {},
    Sequence(NormalizerSequence),
}

impl NormalizerWrapper {
    /// Visit this normalizer and every nested one.
    pub fn walk(&self, f: &mut impl FnMut(&NormalizerWrapper)) {
        f(self);
        if let NormalizerWrapper::Sequence(seq) = self {
            for n in &seq.normalizers {
                n.walk(f);
            }
        }
    }
}

impl Normalizer for NormalizerWrapper {
    fn normalize(&self, normalized: &mut NormalizedString) -> TokenizerResult<()> {
        match self {
            Self::BertNormalizer(n) => n.normalize(normalized)?,
            Self::Lowercase => normalized.lowercase(),
            Self::Nfc => normalized.normalize_unicode(NormalizationForm::Nfc),
            Self::Nfd => normalized.normalize_unicode(NormalizationForm::Nfd),
            Self::Nfkc | Self::Precompiled {} => {
                normalized.normalize_unicode(NormalizationForm::Nfkc)
            }
            Self::Nfkd => normalized.normalize_unicode(NormalizationForm::Nfkd),
            Self::StripAccents => normalized.filter(|c| !is_combining_mark(c)),
            Self::Strip(n) => n.normalize(normalized)?,
            Self::Replace(n) => n.normalize(normalized)?,
            Self::Prepend(n) => n.normalize(normalized)?,
            Self::Nmt => nmt(normalized),
            Self::Sequence(n) => n.normalize(normalized)?,
        }
        Ok(())
    }
}
