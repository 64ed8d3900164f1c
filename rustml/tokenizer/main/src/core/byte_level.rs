//! GPT-2 style byte-level handling
//!
//! Every UTF-8 byte is mapped to a printable char so byte sequences can live
//! in a string vocabulary. The same settings drive pre-tokenization, offset
//! trimming after post-processing, and decoding.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::api::error::TokenizerResult;
use crate::api::types::Encoding;
use crate::core::normalized::{Pattern, PreTokenizedString, SplitDelimiterBehavior};
use crate::core::pre_tokenizer::cached_regex;
use crate::spi::contract::{Decoder, PostProcessor, PreTokenizer};

const GPT2_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

struct ByteTables {
    to_char: [char; 256],
    to_byte: HashMap<char, u8>,
}

fn tables() -> &'static ByteTables {
    static TABLES: OnceLock<ByteTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let printable = |b: u8| matches!(b, b'!'..=b'~' | 0xA1..=0xAC | 0xAE..=0xFF);
        let mut to_char = ['\0'; 256];
        let mut shifted = 0u32;
        for b in 0..=255u8 {
            to_char[b as usize] = if printable(b) {
                char::from(b)
            } else {
                shifted += 1;
                char::from_u32(255 + shifted).unwrap_or(char::REPLACEMENT_CHARACTER)
            };
        }
        let to_byte = to_char
            .iter()
            .enumerate()
            .map(|(b, &c)| (c, b as u8))
            .collect();
        ByteTables { to_char, to_byte }
    })
}

/// Printable char standing for byte `b`.
pub fn byte_to_char(b: u8) -> char {
    tables().to_char[b as usize]
}

/// Inverse of [`byte_to_char`].
pub fn char_to_byte(c: char) -> Option<u8> {
    tables().to_byte.get(&c).copied()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ByteLevel {
    /// Prefix a space so the first word looks like every other word.
    #[serde(default = "default_true")]
    pub add_prefix_space: bool,
    /// Exclude the leading-space char from token offsets.
    #[serde(default = "default_true")]
    pub trim_offsets: bool,
    /// Split with the GPT-2 pattern before mapping bytes.
    #[serde(default = "default_true")]
    pub use_regex: bool,
}

impl Default for ByteLevel {
    fn default() -> Self {
        Self {
            add_prefix_space: true,
            trim_offsets: true,
            use_regex: true,
        }
    }
}

impl PreTokenizer for ByteLevel {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> TokenizerResult<()> {
        let pattern = if self.use_regex {
            Some(cached_regex(&GPT2_REGEX, GPT2_PATTERN)?)
        } else {
            None
        };
        pretokenized.split(|_, mut normalized| {
            if self.add_prefix_space && !normalized.get().starts_with(' ') {
                normalized.prepend(" ");
            }
            match pattern {
                Some(p) => normalized.split(p, SplitDelimiterBehavior::Isolated, false),
                None => Ok(vec![normalized]),
            }
        })?;
        pretokenized.normalize(|normalized| {
            normalized.flat_map(|c| {
                let mut buf = [0u8; 4];
                let len = c.encode_utf8(&mut buf).len();
                buf.map(byte_to_char).into_iter().take(len)
            });
            Ok(())
        })
    }
}

static GPT2_REGEX: OnceLock<Pattern> = OnceLock::new();

impl Decoder for ByteLevel {
    fn decode_chain(&self, tokens: Vec<String>) -> TokenizerResult<Vec<String>> {
        let mut bytes = Vec::new();
        for c in tokens.iter().flat_map(|t| t.chars()) {
            match char_to_byte(c) {
                Some(b) => bytes.push(b),
                None => {
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        Ok(vec![String::from_utf8_lossy(&bytes).into_owned()])
    }
}

impl PostProcessor for ByteLevel {
    fn added_tokens(&self, _is_pair: bool) -> usize {
        0
    }

    fn process(&self, mut encoding: Encoding, _add_special_tokens: bool) -> Encoding {
        if self.trim_offsets {
            trim_offsets(&mut encoding, self.add_prefix_space);
            for overflow in &mut encoding.overflowing {
                trim_offsets(overflow, self.add_prefix_space);
            }
        }
        encoding
    }
}

/// Shrink offsets so they exclude the whitespace a byte-level token carries.
pub fn trim_offsets(encoding: &mut Encoding, add_prefix_space: bool) {
    let space = byte_to_char(b' ');
    let is_space = |c: &char| *c == space || c.is_whitespace();
    for (i, (token, offsets)) in encoding
        .tokens
        .iter()
        .zip(encoding.offsets.iter_mut())
        .enumerate()
    {
        let mut leading = token.chars().take_while(is_space).count();
        let trailing = token.chars().rev().take_while(is_space).count();
        if leading > 0 {
            let is_first = i == 0 || offsets.0 == 0;
            if is_first && add_prefix_space && leading == 1 {
                leading = 0;
            }
            offsets.0 = (offsets.0 + leading).min(offsets.1);
        }
        if trailing > 0 && offsets.1 >= trailing {
            offsets.1 = (offsets.1 - trailing).max(offsets.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splits(pre: &PreTokenizedString) -> Vec<(String, (usize, usize))> {
        pre.get_splits()
            .into_iter()
            .map(|(s, o)| (s.to_string(), o))
            .collect()
    }

    #[test]
    fn test_byte_table_is_bijective() {
        for b in 0..=255u8 {
            assert_eq!(char_to_byte(byte_to_char(b)), Some(b));
        }
        assert_eq!(byte_to_char(b' '), 'Ġ');
        assert_eq!(byte_to_char(b'\n'), 'Ċ');
        assert_eq!(byte_to_char(b'A'), 'A');
    }

    #[test]
    fn test_pre_tokenize_without_regex() {
        let bl = ByteLevel {
            add_prefix_space: false,
            trim_offsets: true,
            use_regex: false,
        };
        let mut pre = PreTokenizedString::new("How are ya doing?");
        bl.pre_tokenize(&mut pre).unwrap();
        assert_eq!(splits(&pre), [("HowĠareĠyaĠdoing?".to_string(), (0, 17))]);
    }

    #[test]
    fn test_pre_tokenize_prefix_space() {
        let bl = ByteLevel {
            add_prefix_space: true,
            trim_offsets: true,
            use_regex: false,
        };
        let mut pre = PreTokenizedString::new("How are ya doing?");
        bl.pre_tokenize(&mut pre).unwrap();
        assert_eq!(pre.get_splits()[0].0, "ĠHowĠareĠyaĠdoing?");
    }

    #[test]
    fn test_pre_tokenize_gpt2_regex() {
        let bl = ByteLevel {
            add_prefix_space: false,
            ..ByteLevel::default()
        };
        let mut pre = PreTokenizedString::new("Hello my friend, how is your day going?");
        bl.pre_tokenize(&mut pre).unwrap();
        assert_eq!(
            splits(&pre),
            [
                ("Hello".to_string(), (0, 5)),
                ("Ġmy".to_string(), (5, 8)),
                ("Ġfriend".to_string(), (8, 15)),
                (",".to_string(), (15, 16)),
                ("Ġhow".to_string(), (16, 20)),
                ("Ġis".to_string(), (20, 23)),
                ("Ġyour".to_string(), (23, 28)),
                ("Ġday".to_string(), (28, 32)),
                ("Ġgoing".to_string(), (32, 38)),
                ("?".to_string(), (38, 39)),
            ]
        );
    }

    #[test]
    fn test_multibyte_chars_share_offsets() {
        let bl = ByteLevel {
            add_prefix_space: false,
            ..ByteLevel::default()
        };
        let mut pre = PreTokenizedString::new("é");
        bl.pre_tokenize(&mut pre).unwrap();
        assert_eq!(splits(&pre), [("Ã©".to_string(), (0, 1))]);
    }

    #[test]
    fn test_decode_restores_text() {
        let tokens = vec!["Hello".to_string(), "Ġmy".to_string(), "Ġfri".to_string(), "end".to_string(), "Ã©".to_string()];
        assert_eq!(ByteLevel::default().decode(tokens).unwrap(), "Hello my friendé");
    }

    #[test]
    fn test_trim_offsets() {
        let mut enc = Encoding::default();
        enc.push(1, "ĠHello".into(), Some(0), (0, 5), 0, false);
        enc.push(2, "Ġthere".into(), Some(1), (5, 11), 0, false);
        trim_offsets(&mut enc, true);
        assert_eq!(enc.offsets, [(0, 5), (6, 11)]);
    }
}
