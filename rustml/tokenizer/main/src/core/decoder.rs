//! Decoders: turn model tokens back into text

use serde::Deserialize;

use crate::api::error::TokenizerResult;
use crate::core::byte_level::ByteLevel;
use crate::core::normalized::NormalizedString;
use crate::core::normalizer::Replace;
use crate::core::pre_tokenizer::{Metaspace, PrependScheme};
use crate::spi::contract::Decoder;

fn default_true() -> bool {
    true
}

/// Undo the spacing conventions of English word tokenization.
pub fn cleanup(text: &str) -> String {
    text.replace(" .", ".")
        .replace(" ?", "?")
        .replace(" !", "!")
        .replace(" ,", ",")
        .replace(" ' ", "'")
        .replace(" n't", "n't")
        .replace(" 'm", "'m")
        .replace(" do not", " don't")
        .replace(" 's", "'s")
        .replace(" 've", "'ve")
        .replace(" 're", "'re")
}

fn default_suffix() -> String {
    "</w>".to_string()
}

/// Turns the end-of-word suffix back into a space.
#[derive(Debug, Clone, Deserialize)]
pub struct BpeDecoder {
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

impl Decoder for BpeDecoder {
    fn decode_chain(&self, tokens: Vec<String>) -> TokenizerResult<Vec<String>> {
        let last = tokens.len().saturating_sub(1);
        Ok(tokens
            .into_iter()
            .enumerate()
            .map(|(i, t)| t.replace(&self.suffix, if i == last { "" } else { " " }))
            .collect())
    }
}

fn default_prefix() -> String {
    "##".to_string()
}

/// Glues continuation pieces to the previous token, spaces everything else.
#[derive(Debug, Clone, Deserialize)]
pub struct WordPieceDecoder {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_true")]
    pub cleanup: bool,
}

impl Default for WordPieceDecoder {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            cleanup: true,
        }
    }
}

impl Decoder for WordPieceDecoder {
    fn decode_chain(&self, tokens: Vec<String>) -> TokenizerResult<Vec<String>> {
        Ok(tokens
            .into_iter()
            .enumerate()
            .map(|(i, token)| {
                let token = if i == 0 {
                    token
                } else if let Some(rest) = token.strip_prefix(&self.prefix) {
                    rest.to_string()
                } else {
                    format!(" {token}")
                };
                if self.cleanup {
                    cleanup(&token)
                } else {
                    token
                }
            })
            .collect())
    }
}

impl Decoder for Metaspace {
    fn decode_chain(&self, tokens: Vec<String>) -> TokenizerResult<Vec<String>> {
        Ok(tokens
            .into_iter()
            .enumerate()
            .map(|(i, token)| {
                let text: String = token
                    .chars()
                    .map(|c| if c == self.replacement { ' ' } else { c })
                    .collect();
                match text.strip_prefix(' ') {
                    Some(rest) if i == 0 && self.prepend_scheme != PrependScheme::Never => {
                        rest.to_string()
                    }
                    _ => text,
                }
            })
            .collect())
    }
}

fn default_pad() -> String {
    "<pad>".to_string()
}

fn default_delimiter() -> String {
    "|".to_string()
}

/// Connectionist temporal classification output: collapse repeats, drop pads.
#[derive(Debug, Clone, Deserialize)]
pub struct Ctc {
    #[serde(default = "default_pad")]
    pub pad_token: String,
    #[serde(default = "default_delimiter")]
    pub word_delimiter_token: String,
    #[serde(default = "default_true")]
    pub cleanup: bool,
}

impl Decoder for Ctc {
    fn decode_chain(&self, mut tokens: Vec<String>) -> TokenizerResult<Vec<String>> {
        tokens.dedup();
        Ok(tokens
            .into_iter()
            .filter(|t| *t != self.pad_token)
            .map(|t| {
                let t = t.replace(&self.word_delimiter_token, " ");
                if self.cleanup {
                    cleanup(&t)
                } else {
                    t
                }
            })
            .collect())
    }
}

impl Decoder for Replace {
    fn decode_chain(&self, tokens: Vec<String>) -> TokenizerResult<Vec<String>> {
        tokens
            .into_iter()
            .map(|t| {
                let mut normalized = NormalizedString::from_original(&t, 0);
                normalized.replace(&self.pattern, &self.content)?;
                Ok(normalized.get().to_string())
            })
            .collect()
    }
}

/// Parse a `<0xXX>` byte token.
fn byte_token(token: &str) -> Option<u8> {
    let hex = token.strip_prefix("<0x")?.strip_suffix('>')?;
    if hex.len() != 2 {
        return None;
    }
    u8::from_str_radix(hex, 16).ok()
}

/// Reassembles runs of `<0xXX>` tokens into text.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ByteFallback {}

impl Decoder for ByteFallback {
    fn decode_chain(&self, tokens: Vec<String>) -> TokenizerResult<Vec<String>> {
        fn flush(bytes: &mut Vec<u8>, out: &mut Vec<String>) {
            if bytes.is_empty() {
                return;
            }
            match String::from_utf8(std::mem::take(bytes)) {
                Ok(text) => out.push(text),
                Err(err) => {
                    let n = err.as_bytes().len();
                    out.extend(std::iter::repeat("\u{FFFD}".to_string()).take(n));
                }
            }
        }

        let mut out = Vec::with_capacity(tokens.len());
        let mut bytes = Vec::new();
        for token in tokens {
            match byte_token(&token) {
                Some(b) => bytes.push(b),
                None => {
                    flush(&mut bytes, &mut out);
                    out.push(token);
                }
            }
        }
        flush(&mut bytes, &mut out);
        Ok(out)
    }
}

/// Joins every token into one string.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Fuse {}

impl Decoder for Fuse {
    fn decode_chain(&self, tokens: Vec<String>) -> TokenizerResult<Vec<String>> {
        Ok(vec![tokens.concat()])
    }
}

/// Removes up to `start` leading and `stop` trailing `content` chars per token.
#[derive(Debug, Clone, Deserialize)]
pub struct Strip {
    pub content: char,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub stop: usize,
}

impl Decoder for Strip {
    fn decode_chain(&self, tokens: Vec<String>) -> TokenizerResult<Vec<String>> {
        Ok(tokens
            .into_iter()
            .map(|token| {
                let chars: Vec<char> = token.chars().collect();
                let lead = chars
                    .iter()
                    .take(self.start)
                    .take_while(|&&c| c == self.content)
                    .count();
                let trail = chars[lead..]
                    .iter()
                    .rev()
                    .take(self.stop)
                    .take_while(|&&c| c == self.content)
                    .count();
                chars[lead..chars.len() - trail].iter().collect()
            })
            .collect())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecoderSequence {
    pub decoders: Vec<DecoderWrapper>,
}

impl Decoder for DecoderSequence {
    fn decode_chain(&self, tokens: Vec<String>) -> TokenizerResult<Vec<String>> {
        self.decoders
            .iter()
            .try_fold(tokens, |tokens, d| d.decode_chain(tokens))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum DecoderWrapper {
    #[serde(rename = "BPEDecoder")]
    Bpe(BpeDecoder),
    ByteLevel(ByteLevel),
    WordPiece(WordPieceDecoder),
    Metaspace(Metaspace),
    #[serde(rename = "CTC")]
    Ctc(Ctc),
    Replace(Replace),
    ByteFallback(ByteFallback),
    Fuse(Fuse),
    Strip(Strip),
    Sequence(DecoderSequence),
}

impl Decoder for DecoderWrapper {
    fn decode_chain(&self, tokens: Vec<String>) -> TokenizerResult<Vec<String>> {
        match self {
            Self::Bpe(d) => d.decode_chain(tokens),
            Self::ByteLevel(d) => d.decode_chain(tokens),
            Self::WordPiece(d) => d.decode_chain(tokens),
            Self::Metaspace(d) => d.decode_chain(tokens),
            Self::Ctc(d) => d.decode_chain(tokens),
            Self::Replace(d) => d.decode_chain(tokens),
            Self::ByteFallback(d) => d.decode_chain(tokens),
            Self::Fuse(d) => d.decode_chain(tokens),
            Self::Strip(d) => d.decode_chain(tokens),
            Self::Sequence(d) => d.decode_chain(tokens),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn decoder(json: &str) -> DecoderWrapper {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_wordpiece() {
        let d = decoder(r#"{"type":"WordPiece"}"#);
        let out = d.decode(tokens(&["un", "##aff", "##able", "day", "!", "i", "do", "n't"])).unwrap();
        assert_eq!(out, "unaffable day! i don't");

        let raw = decoder(r###"{"type":"WordPiece","prefix":"##","cleanup":false}"###);
        assert_eq!(raw.decode(tokens(&["a", "!"])).unwrap(), "a !");
    }

    #[test]
    fn test_bpe_suffix() {
        let d = decoder(r#"{"type":"BPEDecoder"}"#);
        assert_eq!(d.decode(tokens(&["My</w>", "na", "me</w>"])).unwrap(), "My name");
    }

    #[test]
    fn test_metaspace() {
        let d = decoder(r#"{"type":"Metaspace","replacement":"▁","prepend_scheme":"always"}"#);
        assert_eq!(d.decode(tokens(&["▁Hey", "▁friend!"])).unwrap(), "Hey friend!");

        let never = decoder(r#"{"type":"Metaspace","prepend_scheme":"never"}"#);
        assert_eq!(never.decode(tokens(&["▁Hey"])).unwrap(), " Hey");
    }

    #[test]
    fn test_ctc() {
        let d = decoder(r#"{"type":"CTC"}"#);
        let out = d
            .decode(tokens(&["<pad>", "h", "h", "e", "l", "<pad>", "l", "o", "|", "|", "y", "o", "u"]))
            .unwrap();
        assert_eq!(out, "hello you");
    }

    #[test]
    fn test_byte_fallback() {
        let d = decoder(r#"{"type":"ByteFallback"}"#);
        assert_eq!(d.decode_chain(tokens(&["Hey", "friend!"])).unwrap(), tokens(&["Hey", "friend!"]));
        assert_eq!(d.decode_chain(tokens(&["<0x61>"])).unwrap(), tokens(&["a"]));
        assert_eq!(d.decode_chain(tokens(&["<0xE5>", "<0x8f>", "<0xab>", "a"])).unwrap(), tokens(&["叫", "a"]));
        assert_eq!(d.decode_chain(tokens(&["<0xE5>", "<0x8f>", "a"])).unwrap(), tokens(&["\u{FFFD}", "\u{FFFD}", "a"]));
    }

    #[test]
    fn test_sentencepiece_style_sequence() {
        let d = decoder(
            r#"{"type":"Sequence","decoders":[
                {"type":"Replace","pattern":{"String":"▁"},"content":" "},
                {"type":"ByteFallback"},
                {"type":"Fuse"},
                {"type":"Strip","content":" ","start":1,"stop":0}
            ]}"#,
        );
        let out = d.decode(tokens(&["▁Hey", "▁friend", "<0x21>"])).unwrap();
        assert_eq!(out, "Hey friend!");
    }

    #[test]
    fn test_strip_limits() {
        let d = Strip { content: 'x', start: 1, stop: 2 };
        assert_eq!(d.decode_chain(tokens(&["xxaxxx", "x"])).unwrap(), tokens(&["xax", ""]));
    }

    #[test]
    fn test_byte_level() {
        let d = decoder(r#"{"type":"ByteLevel"}"#);
        assert_eq!(d.decode(tokens(&["Hello", "Ġthere", "Ã©"])).unwrap(), "Hello thereé");
    }
}
