//! Truncation: cap encodings at a maximum length, keeping overflow windows

use serde::Deserialize;

use crate::api::error::ConfigError;
use crate::api::types::Encoding;

/// Which end of a sequence loses tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum TruncationDirection {
    Left,
    #[default]
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum TruncationStrategy {
    #[default]
    LongestFirst,
    OnlyFirst,
    OnlySecond,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TruncationParams {
    #[serde(default)]
    pub direction: TruncationDirection,
    #[serde(default)]
    pub strategy: TruncationStrategy,
    pub max_length: usize,
    #[serde(default)]
    pub stride: usize,
}

impl TruncationParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_length > 0 && self.stride >= self.max_length {
            return Err(ConfigError::field(
                "stride",
                format!(
                    "stride {} must be smaller than max_length {}",
                    self.stride, self.max_length
                ),
            ));
        }
        Ok(())
    }

    /// Truncate a single-sequence encoding so at most `max_length` tokens
    /// remain once `added` special tokens are inserted.
    ///
    /// With one sequence the strategy does not matter, except `OnlySecond`,
    /// which has no second sequence to cut and leaves the encoding untouched.
    pub fn apply(&self, encoding: &mut Encoding, added: usize) {
        if self.strategy == TruncationStrategy::OnlySecond {
            return;
        }
        let max_len = self.max_length.saturating_sub(added);
        truncate(encoding, max_len, self.stride, self.direction);
    }
}

/// Cut `encoding` down to `max_len` tokens.
///
/// Removed tokens are kept as overlapping windows of at most `max_len`
/// tokens in `encoding.overflowing`, each sharing `stride` tokens with its
/// neighbour. With `max_len == 0` the whole sequence becomes one overflow.
pub fn truncate(encoding: &mut Encoding, max_len: usize, stride: usize, direction: TruncationDirection) {
    let len = encoding.len();
    if len <= max_len {
        return;
    }
    if max_len == 0 {
        let all = std::mem::take(encoding);
        encoding.overflowing.push(all);
        return;
    }

    let step = max_len - stride.min(max_len - 1);
    let mut windows: Vec<std::ops::Range<usize>> = Vec::new();
    match direction {
        TruncationDirection::Right => {
            let mut start = 0;
            loop {
                let end = (start + max_len).min(len);
                windows.push(start..end);
                if end == len {
                    break;
                }
                start += step;
            }
        }
        TruncationDirection::Left => {
            let mut end = len;
            loop {
                let start = end.saturating_sub(max_len);
                windows.push(start..end);
                if start == 0 {
                    break;
                }
                end -= step;
            }
        }
    }

    let mut parts = windows.into_iter().map(|r| encoding.slice(r));
    let Some(first) = parts.next() else {
        return;
    };
    let overflowing: Vec<Encoding> = parts.collect();
    *encoding = first;
    encoding.overflowing = overflowing;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Token;

    fn encoding(ids: &[u32]) -> Encoding {
        let tokens = ids
            .iter()
            .enumerate()
            .map(|(i, &id)| Token::new(id, id.to_string(), (i, i + 1)))
            .collect();
        Encoding::from_tokens(tokens, Some(0), 0)
    }

    fn overflow_ids(e: &Encoding) -> Vec<Vec<u32>> {
        e.overflowing.iter().map(|o| o.ids.clone()).collect()
    }

    #[test]
    fn test_short_input_untouched() {
        let mut e = encoding(&[1, 2]);
        truncate(&mut e, 4, 0, TruncationDirection::Right);
        assert_eq!(e.ids, vec![1, 2]);
        assert!(e.overflowing.is_empty());
    }

    #[test]
    fn test_right_with_overflow() {
        let mut e = encoding(&[12, 14]);
        truncate(&mut e, 1, 0, TruncationDirection::Right);
        assert_eq!(e.ids, vec![12]);
        assert_eq!(overflow_ids(&e), vec![vec![14]]);
    }

    #[test]
    fn test_stride_overlaps_windows() {
        let mut e = encoding(&[1, 2, 3, 4, 5, 6, 7]);
        truncate(&mut e, 3, 1, TruncationDirection::Right);
        assert_eq!(e.ids, vec![1, 2, 3]);
        assert_eq!(overflow_ids(&e), vec![vec![3, 4, 5], vec![5, 6, 7]]);
        assert_eq!(e.overflowing[0].offsets, vec![(2, 3), (3, 4), (4, 5)]);
    }

    #[test]
    fn test_left_keeps_the_end() {
        let mut e = encoding(&[1, 2, 3, 4, 5]);
        truncate(&mut e, 2, 0, TruncationDirection::Left);
        assert_eq!(e.ids, vec![4, 5]);
        assert_eq!(overflow_ids(&e), vec![vec![2, 3], vec![1]]);
    }

    #[test]
    fn test_zero_length_moves_everything() {
        let mut e = encoding(&[1, 2]);
        truncate(&mut e, 0, 0, TruncationDirection::Right);
        assert!(e.is_empty());
        assert_eq!(overflow_ids(&e), vec![vec![1, 2]]);
    }

    #[test]
    fn test_params_account_for_special_tokens() {
        let params: TruncationParams =
            serde_json::from_str(r#"{"max_length":4,"strategy":"LongestFirst"}"#).unwrap();
        let mut e = encoding(&[1, 2, 3, 4]);
        params.apply(&mut e, 2);
        assert_eq!(e.ids, vec![1, 2]);

        let second: TruncationParams =
            serde_json::from_str(r#"{"max_length":1,"strategy":"OnlySecond"}"#).unwrap();
        let mut e = encoding(&[1, 2]);
        second.apply(&mut e, 0);
        assert_eq!(e.len(), 2);
    }

    #[test]
    fn test_only_first_matches_longest_first() {
        for strategy in ["OnlyFirst", "LongestFirst"] {
            let params: TruncationParams = serde_json::from_str(&format!(
                r#"{{"max_length":3,"strategy":"{strategy}","direction":"Left"}}"#
            ))
            .unwrap();
            let mut e = encoding(&[1, 2, 3, 4, 5]);
            params.apply(&mut e, 1);
            assert_eq!(e.ids, vec![4, 5], "{strategy}");
        }
    }

    #[test]
    fn test_stride_must_be_below_max_length() {
        let params: TruncationParams =
            serde_json::from_str(r#"{"max_length":2,"stride":2}"#).unwrap();
        assert_eq!(params.validate().unwrap_err().field.as_deref(), Some("stride"));
    }
}
