use std::io::{self, BufRead, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rustml_tokenizers::{PipelineTokenizer, Tokenizer};

/// Encode and decode text with a tokenizer.json configuration.
#[derive(Parser)]
#[command(name = "rustml-tokenizers", version, about)]
struct Cli {
    /// tokenizer.json file, or a directory containing one.
    #[arg(long, value_name = "PATH")]
    config: PathBuf,

    #[command(subcommand)]
    command: TokenizerCommand,
}

#[derive(Subcommand)]
enum TokenizerCommand {
    /// Encode text into token IDs.
    Encode {
        /// Text to encode (reads from stdin if omitted and --file not given).
        text: Option<String>,

        /// Read input text from a file.
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Output token IDs as a JSON array instead of space-separated.
        #[arg(long)]
        json: bool,

        /// Do not insert the post-processor's special tokens.
        #[arg(long)]
        no_special_tokens: bool,
    },

    /// Decode token IDs back into text.
    Decode {
        /// Token IDs to decode (reads from stdin if omitted and --file not given).
        ids: Vec<u32>,

        /// Read token IDs from a file (one per line or space-separated).
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Keep special tokens in the output text.
        #[arg(long)]
        keep_special_tokens: bool,
    },

    /// Display tokenizer info (vocab size, special tokens, token lookups).
    Info {
        /// Look up specific tokens and print their IDs.
        #[arg(long, value_name = "TOKEN")]
        lookup: Vec<String>,
    },
}

fn read_text(text: Option<&str>, file: Option<&PathBuf>) -> Result<String> {
    if let Some(t) = text {
        Ok(t.to_string())
    } else if let Some(path) = file {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))
    } else {
        eprintln!("Reading from stdin...");
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    }
}

fn read_ids(ids: &[u32], file: Option<&PathBuf>) -> Result<Vec<u32>> {
    if !ids.is_empty() {
        return Ok(ids.to_vec());
    }

    let raw = if let Some(path) = file {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?
    } else {
        eprintln!("Reading IDs from stdin...");
        let mut buf = String::new();
        for line in io::stdin().lock().lines() {
            let line = line.context("Failed to read stdin")?;
            buf.push_str(&line);
            buf.push(' ');
        }
        buf
    };

    raw.split_whitespace()
        .map(|s| {
            s.parse::<u32>()
                .with_context(|| format!("Invalid token ID: {s}"))
        })
        .collect()
}

fn describe(tokenizer: &PipelineTokenizer, id: Option<u32>) -> String {
    match id {
        Some(id) => format!("{} ({id})", tokenizer.id_to_token(id).unwrap_or("?")),
        None => "(none)".to_string(),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    eprintln!("Loading tokenizer from {}", cli.config.display());
    let tokenizer = PipelineTokenizer::from_file(&cli.config)
        .with_context(|| format!("Failed to load tokenizer: {}", cli.config.display()))?;

    match &cli.command {
        TokenizerCommand::Encode {
            text,
            file,
            json,
            no_special_tokens,
        } => {
            let input = read_text(text.as_deref(), file.as_ref())?;
            let encoding = tokenizer
                .encode(&input, !no_special_tokens)
                .context("Encoding failed")?;
            let ids: Vec<String> = encoding.ids.iter().map(|id| id.to_string()).collect();

            if *json {
                println!("[{}]", ids.join(", "));
            } else {
                println!("{}", ids.join(" "));
            }
        }

        TokenizerCommand::Decode {
            ids,
            file,
            keep_special_tokens,
        } => {
            let token_ids = read_ids(ids, file.as_ref())?;
            let text = tokenizer
                .decode(&token_ids, !keep_special_tokens)
                .context("Decoding failed")?;
            print!("{text}");
        }

        TokenizerCommand::Info { lookup } => {
            let special = tokenizer.special_tokens();
            println!("Vocab size: {}", tokenizer.vocab_size());
            println!("Model: {}", tokenizer.model_kind());
            println!("  unk: {}", describe(&tokenizer, special.unk));
            println!("  pad: {}", describe(&tokenizer, special.pad));
            println!("  bos: {}", describe(&tokenizer, special.bos));
            println!("  eos: {}", describe(&tokenizer, special.eos));

            for token in lookup {
                match tokenizer.token_to_id(token) {
                    Some(id) => println!("  {token} -> {id}"),
                    None => println!("  {token} -> (not found)"),
                }
            }
        }
    }

    Ok(())
}
