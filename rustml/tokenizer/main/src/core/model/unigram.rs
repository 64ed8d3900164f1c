//! Unigram language model: best segmentation by summed piece log-probability

use std::collections::HashMap;

use serde::Deserialize;

use crate::api::error::ConfigError;
use crate::api::types::Token;
use crate::spi::contract::Model;

/// Score gap between the worst known piece and an unknown char.
const UNK_PENALTY: f64 = 10.0;

#[derive(Debug, Clone, Deserialize)]
pub struct UnigramConfig {
    #[serde(default)]
    pub vocab: Vec<(String, f64)>,
    #[serde(default)]
    pub unk_id: Option<usize>,
    #[serde(default)]
    pub byte_fallback: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "UnigramConfig")]
pub struct Unigram {
    pieces: Vec<(String, f64)>,
    index: HashMap<String, u32>,
    /// Longest piece, in chars.
    max_piece_len: usize,
    unk_score: f64,
    pub unk_id: Option<usize>,
    pub byte_fallback: bool,
}

impl From<UnigramConfig> for Unigram {
    fn from(config: UnigramConfig) -> Self {
        let mut index = HashMap::with_capacity(config.vocab.len());
        for (id, (piece, _)) in config.vocab.iter().enumerate() {
            index.entry(piece.clone()).or_insert(id as u32);
        }
        let max_piece_len = config
            .vocab
            .iter()
            .map(|(p, _)| p.chars().count())
            .max()
            .unwrap_or(0);
        let min_score = config
            .vocab
            .iter()
            .map(|(_, s)| *s)
            .fold(f64::INFINITY, f64::min);
        let unk_score = if min_score.is_finite() { min_score - UNK_PENALTY } else { -UNK_PENALTY };
        Self {
            pieces: config.vocab,
            index,
            max_piece_len,
            unk_score,
            unk_id: config.unk_id,
            byte_fallback: config.byte_fallback,
        }
    }
}

/// Best path ending at a char position.
#[derive(Debug, Clone, Copy)]
struct Node {
    score: f64,
    start: usize,
    /// `None` marks an unknown char.
    id: Option<u32>,
}

impl Unigram {
    pub fn new(vocab: Vec<(String, f64)>, unk_id: Option<usize>) -> Self {
        UnigramConfig {
            vocab,
            unk_id,
            byte_fallback: false,
        }
        .into()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(id) = self.unk_id {
            if id >= self.pieces.len() {
                return Err(ConfigError::field(
                    "unk_id",
                    format!("{id} is out of range for a vocabulary of {}", self.pieces.len()),
                ));
            }
        }
        if self.index.len() != self.pieces.len() {
            return Err(ConfigError::field("vocab", "duplicate pieces"));
        }
        Ok(())
    }

    /// Viterbi over char positions; ties keep the earlier (shorter) candidate.
    fn best_path(&self, chars: &[char]) -> Vec<(Option<u32>, usize, usize)> {
        let n = chars.len();
        let mut best: Vec<Option<Node>> = vec![None; n + 1];
        best[0] = Some(Node {
            score: 0.0,
            start: 0,
            id: None,
        });

        for start in 0..n {
            let Some(here) = best[start] else {
                continue;
            };
            let mut covered_one = false;
            let mut piece = String::new();
            for end in start + 1..=n.min(start + self.max_piece_len) {
                piece.push(chars[end - 1]);
                let Some(&id) = self.index.get(&piece) else {
                    continue;
                };
                covered_one |= end == start + 1;
                let score = here.score + self.pieces[id as usize].1;
                if best[end].map_or(true, |b| score > b.score) {
                    best[end] = Some(Node {
                        score,
                        start,
                        id: Some(id),
                    });
                }
            }
            if !covered_one {
                let score = here.score + self.unk_score;
                if best[start + 1].map_or(true, |b| score > b.score) {
                    best[start + 1] = Some(Node {
                        score,
                        start,
                        id: None,
                    });
                }
            }
        }

        let mut path = Vec::new();
        let mut end = n;
        while end > 0 {
            let Some(node) = best[end] else {
                break;
            };
            path.push((node.id, node.start, end));
            end = node.start;
        }
        path.reverse();
        path
    }

    fn byte_pieces(&self, c: char) -> Option<Vec<u32>> {
        let mut buf = [0u8; 4];
        c.encode_utf8(&mut buf)
            .bytes()
            .map(|b| self.index.get(&format!("<0x{b:02X}>")).copied())
            .collect()
    }
}

impl Model for Unigram {
    fn tokenize(&self, sequence: &str) -> Vec<Token> {
        let chars: Vec<char> = sequence.chars().collect();
        let unk = self.unk_id.map(|id| id as u32);
        let mut tokens: Vec<Token> = Vec::new();
        let mut last_was_unk = false;

        for (id, start, end) in self.best_path(&chars) {
            if let Some(id) = id {
                let value: String = chars[start..end].iter().collect();
                tokens.push(Token::new(id, value, (start, end)));
                last_was_unk = false;
                continue;
            }
            if self.byte_fallback {
                if let Some(ids) = self.byte_pieces(chars[start]) {
                    for id in ids {
                        tokens.push(Token::new(id, self.pieces[id as usize].0.clone(), (start, end)));
                    }
                    last_was_unk = false;
                    continue;
                }
            }
            let Some(unk) = unk else {
                continue;
            };
            match tokens.last_mut() {
                Some(prev) if last_was_unk => prev.offsets.1 = end,
                _ => tokens.push(Token::new(unk, self.pieces[unk as usize].0.clone(), (start, end))),
            }
            last_was_unk = true;
        }
        tokens
    }

    fn vocab(&self) -> HashMap<String, u32> {
        self.index.clone()
    }

    fn vocab_size(&self) -> usize {
        self.pieces.len()
    }

    fn unk_id(&self) -> Option<u32> {
        self.unk_id.map(|id| id as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Unigram {
        let vocab = [
            ("<unk>", 0.0),
            ("a", -1.0),
            ("b", -1.0),
            ("c", -1.0),
            ("ab", -1.5),
            ("abc", -4.0),
            ("bc", -1.2),
        ]
        .into_iter()
        .map(|(p, s)| (p.to_string(), s))
        .collect();
        Unigram::new(vocab, Some(0))
    }

    fn values(tokens: &[Token]) -> Vec<(&str, (usize, usize))> {
        tokens.iter().map(|t| (t.value.as_str(), t.offsets)).collect()
    }

    #[test]
    fn test_viterbi_picks_best_score() {
        let m = model();
        // a + bc = -2.2 beats ab + c = -2.5 and abc = -4.0
        assert_eq!(values(&m.tokenize("abc")), [("a", (0, 1)), ("bc", (1, 3))]);
        assert_eq!(values(&m.tokenize("ab")), [("ab", (0, 2))]);
    }

    #[test]
    fn test_unknown_chars_fuse() {
        let m = model();
        let tokens = m.tokenize("axyb");
        assert_eq!(
            values(&tokens),
            [("a", (0, 1)), ("<unk>", (1, 3)), ("b", (3, 4))]
        );
        assert_eq!(tokens[1].id, 0);
    }

    #[test]
    fn test_byte_fallback() {
        let vocab = [("<unk>", 0.0), ("a", -1.0), ("<0xC3>", -5.0), ("<0xA9>", -5.0)]
            .into_iter()
            .map(|(p, s)| (p.to_string(), s))
            .collect();
        let mut m = Unigram::new(vocab, Some(0));
        m.byte_fallback = true;
        assert_eq!(
            values(&m.tokenize("aé")),
            [("a", (0, 1)), ("<0xC3>", (1, 2)), ("<0xA9>", (1, 2))]
        );
    }

    #[test]
    fn test_from_json_and_validate() {
        let m: Unigram =
            serde_json::from_str(r#"{"unk_id":5,"vocab":[["<unk>",0.0],["a",-1.0]]}"#).unwrap();
        assert_eq!(m.validate().unwrap_err().field.as_deref(), Some("unk_id"));
        assert_eq!(m.vocab().get("a"), Some(&1));
    }
}
