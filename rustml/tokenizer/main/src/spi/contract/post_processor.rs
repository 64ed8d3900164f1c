use crate::api::types::Encoding;

/// Adds special tokens around an encoded sequence.
pub trait PostProcessor {
    /// Number of tokens `process` adds for a single (or pair) input.
    fn added_tokens(&self, is_pair: bool) -> usize;
    fn process(&self, encoding: Encoding, add_special_tokens: bool) -> Encoding;
}
