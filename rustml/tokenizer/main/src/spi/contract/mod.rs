mod decoder;
mod model;
mod normalizer;
mod post_processor;
mod pre_tokenizer;
mod tokenizer;

pub use decoder::Decoder;
pub use model::Model;
pub use normalizer::Normalizer;
pub use post_processor::PostProcessor;
pub use pre_tokenizer::PreTokenizer;
pub use tokenizer::Tokenizer;
