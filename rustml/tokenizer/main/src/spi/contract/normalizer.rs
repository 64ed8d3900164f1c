use crate::api::error::TokenizerResult;
use crate::core::normalized::NormalizedString;

/// Rewrites text in place before it is split, keeping alignments current.
pub trait Normalizer {
    fn normalize(&self, normalized: &mut NormalizedString) -> TokenizerResult<()>;
}
