use std::path::PathBuf;
use std::process::Command;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rustml-tokenizers"))
}

const CONFIG: &str = r#"{
  "version": "1.0",
  "added_tokens": [
    {"id": 3, "content": "<s>", "special": true, "normalized": false},
    {"id": 4, "content": "</s>", "special": true, "normalized": false}
  ],
  "normalizer": {"type": "Lowercase"},
  "pre_tokenizer": {"type": "WhitespaceSplit"},
  "model": {
    "type": "WordLevel",
    "vocab": {"hello": 0, "world": 1, "<unk>": 2},
    "unk_token": "<unk>"
  },
  "post_processor": {
    "type": "TemplateProcessing",
    "single": "<s> $A </s>",
    "special_tokens": {
      "<s>": {"id": "<s>", "ids": [3], "tokens": ["<s>"]},
      "</s>": {"id": "</s>", "ids": [4], "tokens": ["</s>"]}
    }
  }
}"#;

/// Writes the test configuration into a fresh directory.
fn config_dir() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokenizer.json");
    std::fs::write(&path, CONFIG).unwrap();
    (dir, path)
}

// ── encode ──────────────────────────────────────────────────────────

#[test]
fn encode_hello_world() {
    let (_dir, config) = config_dir();
    let out = bin()
        .arg("--config")
        .arg(&config)
        .args(["encode", "Hello world"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "3 0 1 4");
}

#[test]
fn encode_json_without_special_tokens() {
    let (_dir, config) = config_dir();
    let out = bin()
        .arg("--config")
        .arg(&config)
        .args(["encode", "--json", "--no-special-tokens", "hello there"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "[0, 2]");
}

#[test]
fn encode_from_directory_config() {
    let (dir, _) = config_dir();
    let out = bin()
        .arg("--config")
        .arg(dir.path())
        .args(["encode", ""])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "3 4");
}

#[test]
fn encode_from_file() {
    let (dir, config) = config_dir();
    let path = dir.path().join("input.txt");
    std::fs::write(&path, "world").unwrap();

    let out = bin()
        .arg("--config")
        .arg(&config)
        .args(["encode", "--file"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "3 1 4");
}

#[test]
fn encode_from_stdin() {
    use std::io::Write;
    let (_dir, config) = config_dir();
    let mut child = bin()
        .arg("--config")
        .arg(&config)
        .args(["encode"])
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .unwrap();

    child.stdin.take().unwrap().write_all(b"world hello\n").unwrap();
    let out = child.wait_with_output().unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "3 1 0 4");
}

// ── decode ──────────────────────────────────────────────────────────

#[test]
fn decode_skips_special_tokens() {
    let (_dir, config) = config_dir();
    let out = bin()
        .arg("--config")
        .arg(&config)
        .args(["decode", "3", "0", "1", "4"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "hello world");
}

#[test]
fn decode_keeps_special_tokens() {
    let (_dir, config) = config_dir();
    let out = bin()
        .arg("--config")
        .arg(&config)
        .args(["decode", "--keep-special-tokens", "3", "0", "1", "4"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "<s> hello world </s>");
}

#[test]
fn decode_from_file() {
    let (dir, config) = config_dir();
    let path = dir.path().join("ids.txt");
    std::fs::write(&path, "1\n0").unwrap();

    let out = bin()
        .arg("--config")
        .arg(&config)
        .args(["decode", "--file"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "world hello");
}

#[test]
fn decode_unknown_id_fails() {
    let (_dir, config) = config_dir();
    let out = bin()
        .arg("--config")
        .arg(&config)
        .args(["decode", "5"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Unknown token id 5 (vocab size 5)"), "{stderr}");
}

// ── info ────────────────────────────────────────────────────────────

#[test]
fn info_shows_vocab_and_specials() {
    let (_dir, config) = config_dir();
    let out = bin()
        .arg("--config")
        .arg(&config)
        .args(["info", "--lookup", "world", "--lookup", "<mask>"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Vocab size: 5"));
    assert!(stdout.contains("Model: WordLevel"));
    assert!(stdout.contains("unk: <unk> (2)"));
    assert!(stdout.contains("bos: <s> (3)"));
    assert!(stdout.contains("eos: </s> (4)"));
    assert!(stdout.contains("pad: (none)"));
    assert!(stdout.contains("world -> 1"));
    assert!(stdout.contains("<mask> -> (not found)"));
}

// ── error cases ─────────────────────────────────────────────────────

#[test]
fn missing_config_flag_fails() {
    let out = bin().args(["encode", "hello"]).output().unwrap();
    assert!(!out.status.success());
}

#[test]
fn nonexistent_config_fails() {
    let out = bin()
        .args(["--config", "/tmp/nonexistent_tokenizer.json", "encode", "hello"])
        .output()
        .unwrap();
    assert!(!out.status.success());
}

#[test]
fn malformed_config_reports_offset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokenizer.json");
    std::fs::write(&path, "{\n  \"model\": ]\n}").unwrap();

    let out = bin()
        .arg("--config")
        .arg(&path)
        .args(["encode", "hello"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("(byte 13)"), "{stderr}");
}

#[test]
fn decode_invalid_ids_from_file_fails() {
    let (dir, config) = config_dir();
    let path = dir.path().join("bad_ids.txt");
    std::fs::write(&path, "not_a_number").unwrap();

    let out = bin()
        .arg("--config")
        .arg(&config)
        .args(["decode", "--file"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(!out.status.success());
}

// ── stderr diagnostics ──────────────────────────────────────────────

#[test]
fn stderr_shows_loading_message() {
    let (_dir, config) = config_dir();
    let out = bin()
        .arg("--config")
        .arg(&config)
        .args(["encode", "x"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Loading tokenizer from"));
}
