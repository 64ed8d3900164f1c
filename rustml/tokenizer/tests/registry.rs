use std::sync::Arc;

use rustml_tokenizers::{TokenizerError, TokenizerHandle, TokenizerRegistry};

const CONFIG: &[u8] = br#"{
  "added_tokens": [
    {"id": 3, "content": "<s>", "special": true, "normalized": false},
    {"id": 4, "content": "</s>", "special": true, "normalized": false}
  ],
  "pre_tokenizer": {"type": "WhitespaceSplit"},
  "model": {"type": "WordLevel", "vocab": {"hello": 0, "world": 1, "<unk>": 2}, "unk_token": "<unk>"},
  "post_processor": {
    "type": "TemplateProcessing",
    "single": "<s> $A </s>",
    "special_tokens": {
      "<s>": {"id": "<s>", "ids": [3], "tokens": ["<s>"]},
      "</s>": {"id": "</s>", "ids": [4], "tokens": ["</s>"]}
    }
  }
}"#;

// ── lifecycle ───────────────────────────────────────────────────────

#[test]
fn create_encode_decode_release() {
    let registry = TokenizerRegistry::new();
    let handle = registry.create(CONFIG).unwrap();
    assert_eq!(registry.len(), 1);

    let enc = registry.encode(handle, "hello world", true).unwrap();
    assert_eq!(enc.ids, vec![3, 0, 1, 4]);
    assert_eq!(registry.decode(handle, &enc.ids, true).unwrap(), "hello world");

    registry.release(handle).unwrap();
    assert!(registry.is_empty());
    assert!(matches!(
        registry.decode(handle, &[0], true),
        Err(TokenizerError::InvalidHandle(_))
    ));
}

#[test]
fn double_release_fails() {
    let registry = TokenizerRegistry::new();
    let handle = registry.create(CONFIG).unwrap();
    registry.release(handle).unwrap();
    match registry.release(handle) {
        Err(TokenizerError::InvalidHandle(raw)) => assert_eq!(raw, handle.as_u64()),
        other => panic!("expected InvalidHandle, got {other:?}"),
    }
}

#[test]
fn unknown_handle_fails() {
    let registry = TokenizerRegistry::new();
    let bogus = TokenizerHandle::from_u64(42);
    assert!(matches!(
        registry.encode(bogus, "hello", true),
        Err(TokenizerError::InvalidHandle(42))
    ));
}

#[test]
fn repeated_create_release_cycles() {
    let registry = TokenizerRegistry::new();
    let mut seen = std::collections::HashSet::new();
    for _ in 0..50 {
        let handle = registry.create(CONFIG).unwrap();
        assert!(seen.insert(handle), "handle {handle} was reused");
        registry.release(handle).unwrap();
    }
    assert!(registry.is_empty());
}

#[test]
fn invalid_config_creates_nothing() {
    let registry = TokenizerRegistry::new();
    let err = registry.create(b"{\"model\": 3}").unwrap_err();
    assert!(matches!(err, TokenizerError::Config(_)));
    assert_eq!(registry.len(), 0);
}

// ── concurrency ─────────────────────────────────────────────────────

#[test]
fn concurrent_encode_on_one_handle() {
    let registry = TokenizerRegistry::new();
    let handle = registry.create(CONFIG).unwrap();

    std::thread::scope(|s| {
        for t in 0..8 {
            let registry = &registry;
            s.spawn(move || {
                for i in 0..200 {
                    let text = if (t + i) % 2 == 0 { "hello world" } else { "world hello" };
                    let ids = registry.encode(handle, text, true).unwrap().ids;
                    let expected = if (t + i) % 2 == 0 { vec![3, 0, 1, 4] } else { vec![3, 1, 0, 4] };
                    assert_eq!(ids, expected);
                    assert_eq!(registry.decode(handle, &ids, true).unwrap(), text);
                }
            });
        }
    });
}

#[test]
fn release_while_in_use() {
    let registry = Arc::new(TokenizerRegistry::new());
    let handle = registry.create(CONFIG).unwrap();
    let tokenizer = registry.get(handle).unwrap();

    let releaser = {
        let registry = Arc::clone(&registry);
        std::thread::spawn(move || registry.release(handle))
    };
    for _ in 0..100 {
        assert_eq!(tokenizer.encode("hello", false).unwrap().ids, vec![0]);
    }
    releaser.join().unwrap().unwrap();
    assert_eq!(tokenizer.decode(&[1], false).unwrap(), "world");
}

#[test]
fn independent_registries() {
    let a = TokenizerRegistry::new();
    let b = TokenizerRegistry::new();
    let handle = a.create(CONFIG).unwrap();
    assert!(b.encode(handle, "hello", true).is_err());
    assert!(a.encode(handle, "hello", true).is_ok());
}

// ── process-wide registry ───────────────────────────────────────────

#[test]
fn global_functions() {
    let handle = rustml_tokenizers::create(CONFIG).unwrap();
    let ids = rustml_tokenizers::encode(handle, "world", true).unwrap().ids;
    assert_eq!(ids, vec![3, 1, 4]);
    assert_eq!(rustml_tokenizers::decode(handle, &ids, false).unwrap(), "<s> world </s>");
    rustml_tokenizers::release(handle).unwrap();
    assert!(rustml_tokenizers::release(handle).is_err());
}
