//! Handle-based access to tokenizers
//!
//! A [`TokenizerRegistry`] owns built tokenizers and hands out opaque
//! [`TokenizerHandle`]s. Calls clone the tokenizer's `Arc` and drop the lock
//! before doing any work, so a `release` racing with an `encode` cannot free
//! the tokenizer mid-call; it is dropped when the last call returns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::api::error::{TokenizerError, TokenizerResult};
use crate::api::types::{Encoding, TokenizerHandle};
use crate::core::pipeline::PipelineTokenizer;

#[derive(Debug)]
pub struct TokenizerRegistry {
    next: AtomicU64,
    entries: RwLock<HashMap<TokenizerHandle, Arc<PipelineTokenizer>>>,
}

impl Default for TokenizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenizerRegistry {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Build a tokenizer from `blob` and register it. Nothing is registered
    /// when the build fails.
    pub fn create(&self, blob: &[u8]) -> TokenizerResult<TokenizerHandle> {
        let tokenizer = Arc::new(PipelineTokenizer::from_bytes(blob)?);
        Ok(self.insert(tokenizer))
    }

    /// Register an already built tokenizer.
    pub fn insert(&self, tokenizer: Arc<PipelineTokenizer>) -> TokenizerHandle {
        let handle = TokenizerHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, tokenizer);
        log::debug!("Registered tokenizer {handle}");
        handle
    }

    /// The tokenizer behind `handle`.
    pub fn get(&self, handle: TokenizerHandle) -> TokenizerResult<Arc<PipelineTokenizer>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle)
            .cloned()
            .ok_or(TokenizerError::InvalidHandle(handle.0))
    }

    pub fn encode(
        &self,
        handle: TokenizerHandle,
        text: &str,
        add_special_tokens: bool,
    ) -> TokenizerResult<Encoding> {
        self.get(handle)?.encode(text, add_special_tokens)
    }

    pub fn decode(
        &self,
        handle: TokenizerHandle,
        ids: &[u32],
        skip_special_tokens: bool,
    ) -> TokenizerResult<String> {
        self.get(handle)?.decode(ids, skip_special_tokens)
    }

    /// Forget `handle`. Releasing twice is an error.
    pub fn release(&self, handle: TokenizerHandle) -> TokenizerResult<()> {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle);
        match removed {
            Some(_) => {
                log::debug!("Released tokenizer {handle}");
                Ok(())
            }
            None => Err(TokenizerError::InvalidHandle(handle.0)),
        }
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The process-wide registry behind [`create`], [`encode`], [`decode`] and
/// [`release`].
pub fn global() -> &'static TokenizerRegistry {
    static GLOBAL: OnceLock<TokenizerRegistry> = OnceLock::new();
    GLOBAL.get_or_init(TokenizerRegistry::new)
}

pub fn create(blob: &[u8]) -> TokenizerResult<TokenizerHandle> {
    global().create(blob)
}

pub fn encode(handle: TokenizerHandle, text: &str, add_special_tokens: bool) -> TokenizerResult<Encoding> {
    global().encode(handle, text, add_special_tokens)
}

pub fn decode(handle: TokenizerHandle, ids: &[u32], skip_special_tokens: bool) -> TokenizerResult<String> {
    global().decode(handle, ids, skip_special_tokens)
}

pub fn release(handle: TokenizerHandle) -> TokenizerResult<()> {
    global().release(handle)
}
