//! Padding: extend encodings to a fixed or aligned length

use serde::Deserialize;

use crate::api::types::Encoding;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum PaddingDirection {
    Left,
    #[default]
    Right,
}

/// Target length. With one input at a time, `BatchLongest` only applies
/// `pad_to_multiple_of`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum PaddingStrategy {
    #[default]
    BatchLongest,
    Fixed(usize),
}

fn default_pad_token() -> String {
    "[PAD]".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaddingParams {
    #[serde(default)]
    pub strategy: PaddingStrategy,
    #[serde(default)]
    pub direction: PaddingDirection,
    #[serde(default)]
    pub pad_to_multiple_of: Option<usize>,
    #[serde(default)]
    pub pad_id: u32,
    #[serde(default)]
    pub pad_type_id: u32,
    #[serde(default = "default_pad_token")]
    pub pad_token: String,
}

impl PaddingParams {
    fn target(&self, len: usize) -> usize {
        let target = match self.strategy {
            PaddingStrategy::BatchLongest => len,
            PaddingStrategy::Fixed(n) => n,
        };
        match self.pad_to_multiple_of {
            Some(m) if m > 0 && target % m != 0 => target + m - target % m,
            _ => target,
        }
    }

    /// Pad `encoding` and each overflowing window.
    pub fn apply(&self, encoding: &mut Encoding) {
        self.pad(encoding);
        for overflow in &mut encoding.overflowing {
            self.pad(overflow);
        }
    }

    fn pad(&self, encoding: &mut Encoding) {
        let target = self.target(encoding.len());
        let Some(missing) = target.checked_sub(encoding.len()).filter(|&n| n > 0) else {
            return;
        };
        let mut pad = Encoding::with_capacity(missing);
        for _ in 0..missing {
            pad.push(self.pad_id, self.pad_token.clone(), None, (0, 0), self.pad_type_id, true);
        }
        pad.attention_mask.iter_mut().for_each(|m| *m = 0);

        match self.direction {
            PaddingDirection::Right => encoding.extend(pad),
            PaddingDirection::Left => {
                let overflowing = std::mem::take(&mut encoding.overflowing);
                pad.extend(std::mem::take(encoding));
                *encoding = pad;
                encoding.overflowing = overflowing;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Token;

    fn encoding(ids: &[u32]) -> Encoding {
        let tokens = ids.iter().map(|&id| Token::new(id, "t", (0, 1))).collect();
        Encoding::from_tokens(tokens, Some(0), 0)
    }

    fn params(json: &str) -> PaddingParams {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_fixed_right() {
        let p = params(r#"{"strategy":{"Fixed":4},"pad_id":9,"pad_token":"<pad>"}"#);
        let mut e = encoding(&[1, 2]);
        p.apply(&mut e);
        assert_eq!(e.ids, vec![1, 2, 9, 9]);
        assert_eq!(e.attention_mask, vec![1, 1, 0, 0]);
        assert_eq!(e.special_tokens_mask, vec![0, 0, 1, 1]);
        assert_eq!(e.words, vec![Some(0), Some(0), None, None]);
        assert_eq!(e.tokens[3], "<pad>");
    }

    #[test]
    fn test_left_and_multiple_of() {
        let p = params(r#"{"direction":"Left","pad_to_multiple_of":4,"pad_id":0}"#);
        let mut e = encoding(&[5, 6, 7, 8, 9]);
        p.apply(&mut e);
        assert_eq!(e.ids, vec![0, 0, 0, 5, 6, 7, 8, 9]);
        assert_eq!(e.attention_mask[..4], [0, 0, 0, 1]);
    }

    #[test]
    fn test_longer_input_untouched() {
        let p = params(r#"{"strategy":{"Fixed":1}}"#);
        let mut e = encoding(&[1, 2]);
        p.apply(&mut e);
        assert_eq!(e.ids, vec![1, 2]);
    }

    #[test]
    fn test_pads_overflowing_windows() {
        let p = params(r#"{"strategy":{"Fixed":2},"pad_id":3}"#);
        let mut e = encoding(&[1, 2]);
        e.overflowing.push(encoding(&[4]));
        p.apply(&mut e);
        assert_eq!(e.overflowing[0].ids, vec![4, 3]);
    }
}
