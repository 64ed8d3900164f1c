//! # RustML Tokenizers
//!
//! A native tokenization engine driven by HuggingFace `tokenizer.json`
//! configurations.
//!
//! This crate provides:
//! - Normalizers, pre-tokenizers, post-processors and decoders selected by
//!   the configuration
//! - BPE, WordPiece, WordLevel and Unigram segmentation models
//! - Added/special token matching, truncation and padding
//! - A handle registry for callers that cannot hold Rust references
//!
//! ## Example
//!
//! ```rust,ignore
//! use rustml_tokenizers::{PipelineTokenizer, Tokenizer};
//!
//! let tokenizer = PipelineTokenizer::from_file("models/bert-base-uncased")?;
//! let encoding = tokenizer.encode("Hello world!", true)?;
//! println!("{:?}", encoding.ids);
//!
//! let text = tokenizer.decode(&encoding.ids, true)?;
//! assert_eq!(text, "hello world!");
//!
//! // Handle-based access
//! let handle = rustml_tokenizers::create(&std::fs::read("tokenizer.json")?)?;
//! let ids = rustml_tokenizers::encode(handle, "Hello", true)?.ids;
//! rustml_tokenizers::release(handle)?;
//! ```

pub mod api;
pub(crate) mod core;
mod saf;
mod spi;

pub use saf::*;
