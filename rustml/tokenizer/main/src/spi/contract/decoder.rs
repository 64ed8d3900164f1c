use crate::api::error::TokenizerResult;

/// Turns token strings back into text.
pub trait Decoder {
    /// Rewrite the token strings; the result is concatenated by [`Decoder::decode`].
    fn decode_chain(&self, tokens: Vec<String>) -> TokenizerResult<Vec<String>>;

    fn decode(&self, tokens: Vec<String>) -> TokenizerResult<String> {
        Ok(self.decode_chain(tokens)?.concat())
    }
}
