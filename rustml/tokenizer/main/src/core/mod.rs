pub mod added_vocabulary;
pub mod byte_level;
pub mod config;
pub mod decoder;
pub mod model;
pub mod normalized;
pub mod normalizer;
pub mod padding;
pub mod pipeline;
pub mod post_processor;
pub mod pre_tokenizer;
pub mod registry;
pub mod truncation;
pub mod unicode;
pub mod vocab;
