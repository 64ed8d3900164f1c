//! Vocabulary store: the dense id <-> token table and special-token bindings

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::api::error::ConfigError;
use crate::core::added_vocabulary::AddedToken;
use crate::core::model::ModelWrapper;
use crate::spi::contract::Model;

/// Every token a tokenizer can emit, indexed by id.
///
/// Ids are dense: `id_to_token` is total over `0..len()`.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: HashMap<String, u32>,
}

impl Vocabulary {
    /// Merge the model vocabulary with the added tokens and check the id range.
    pub fn build(model: &ModelWrapper, added: &[AddedToken]) -> Result<Self, ConfigError> {
        let model_vocab = model.vocab();
        let mut by_id: BTreeMap<u32, String> = BTreeMap::new();
        for (token, &id) in &model_vocab {
            if let Some(other) = by_id.insert(id, token.clone()) {
                let (a, b) = if other < *token { (other, token.clone()) } else { (token.clone(), other) };
                return Err(ConfigError::field(
                    "model.vocab",
                    format!("id {id} is assigned to both {a:?} and {b:?}"),
                ));
            }
        }

        let mut seen: HashMap<&str, u32> = HashMap::new();
        for (i, token) in added.iter().enumerate() {
            let field = format!("added_tokens[{i}]");
            if let Some(&prev) = seen.get(token.content.as_str()) {
                if prev != token.id {
                    return Err(ConfigError::field(
                        field,
                        format!("{:?} is listed with ids {prev} and {}", token.content, token.id),
                    ));
                }
            }
            seen.insert(&token.content, token.id);

            match model_vocab.get(&token.content) {
                Some(&id) if id == token.id => {}
                Some(&id) => {
                    return Err(ConfigError::field(
                        format!("{field}.id"),
                        format!(
                            "{:?} has id {id} in the model vocabulary but {} here",
                            token.content, token.id
                        ),
                    ));
                }
                None => match by_id.get(&token.id) {
                    Some(existing) if *existing == token.content => {}
                    Some(existing) => {
                        return Err(ConfigError::field(
                            format!("{field}.id"),
                            format!("id {} already belongs to {existing:?}", token.id),
                        ));
                    }
                    None => {
                        by_id.insert(token.id, token.content.clone());
                    }
                },
            }
        }

        if let Some((&max, _)) = by_id.last_key_value() {
            if max as usize + 1 != by_id.len() {
                let gap = by_id
                    .keys()
                    .zip(0u32..)
                    .find(|(&id, expected)| id != *expected)
                    .map_or(max, |(_, expected)| expected);
                return Err(ConfigError::field(
                    "model.vocab",
                    format!("ids must be dense in [0, {}): id {gap} is missing", max as u64 + 1),
                ));
            }
        }

        let mut ids = HashMap::with_capacity(model.vocab_size() + added.len());
        let tokens: Vec<String> = by_id.into_values().collect();
        ids.extend(tokens.iter().enumerate().map(|(id, t)| (t.clone(), id as u32)));
        Ok(Self { tokens, ids })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.ids.get(token).copied()
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    /// Check that `token` exists and is bound to `id`.
    pub fn expect_binding(&self, field: &str, token: &str, id: u32) -> Result<(), ConfigError> {
        match self.token_to_id(token) {
            Some(found) if found == id => Ok(()),
            Some(found) => Err(ConfigError::field(
                field,
                format!("special token {token:?} is bound to id {id} but the vocabulary has it at {found}"),
            )),
            None => Err(ConfigError::field(
                field,
                format!("special token {token:?} is not in the vocabulary"),
            )),
        }
    }
}

/// Ids with a reserved meaning, fixed for the lifetime of a tokenizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialTokens {
    pub unk: Option<u32>,
    pub pad: Option<u32>,
    pub bos: Option<u32>,
    pub eos: Option<u32>,
    /// Every id flagged special, including the named ones above.
    pub all: BTreeSet<u32>,
}

impl SpecialTokens {
    pub fn contains(&self, id: u32) -> bool {
        self.all.contains(&id)
    }
}
