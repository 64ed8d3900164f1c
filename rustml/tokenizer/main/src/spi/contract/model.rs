use std::collections::HashMap;

use crate::api::types::Token;

/// A trained segmentation model.
///
/// `tokenize` never fails: material the model cannot represent becomes the
/// unknown token, or is dropped when the model has none.
pub trait Model {
    /// Segment one pre-token. Token offsets are char offsets into `sequence`.
    fn tokenize(&self, sequence: &str) -> Vec<Token>;
    /// Every (token, id) pair the model knows.
    fn vocab(&self) -> HashMap<String, u32>;
    /// Number of distinct ids in `vocab()`.
    fn vocab_size(&self) -> usize;
    /// Id emitted for unknown material, if the model has one.
    fn unk_id(&self) -> Option<u32>;
}
