use crate::api::error::TokenizerResult;
use crate::core::normalized::PreTokenizedString;

/// Splits normalized text into the coarse units the model segments one by one.
pub trait PreTokenizer {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> TokenizerResult<()>;
}
