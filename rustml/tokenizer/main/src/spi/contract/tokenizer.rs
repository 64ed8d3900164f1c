use crate::api::error::TokenizerResult;

/// Common tokenizer interface.
pub trait Tokenizer {
    /// Encode text to token IDs, optionally wrapped in the configured special tokens.
    fn encode(&self, text: &str, add_special_tokens: bool) -> TokenizerResult<Vec<u32>>;
    /// Decode token IDs to text, optionally dropping special tokens.
    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> TokenizerResult<String>;
    /// Vocabulary size. Valid ids are `0..vocab_size()`.
    fn vocab_size(&self) -> usize;
    /// Look up a token by its string form, returning its ID if present.
    fn token_to_id(&self, token: &str) -> Option<u32>;
    /// Look up the string form of an ID.
    fn id_to_token(&self, id: u32) -> Option<&str>;
}
