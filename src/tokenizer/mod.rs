pub mod vocab;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use vocab::{EOS_TOKEN, TokenVocab};

/// Bidirectional token/id lookup consumed by the likelihood scorer.
///
/// Lookups never fall back to a substitute id: an unseen token is
/// [`LmError::UnknownToken`](crate::error::LmError::UnknownToken).
pub trait Vocabulary: Send + Sync {
    fn lookup(&self, token: &str) -> Result<u32>;
    fn token(&self, id: u32) -> Option<&str>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
}

pub type SharedVocabulary = Arc<dyn Vocabulary>;

/// How raw text lines are split into vocabulary tokens.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenizerKind {
    #[default]
    Word,
    Char,
}

impl TokenizerKind {
    pub fn split(&self, line: &str) -> Vec<String> {
        match self {
            TokenizerKind::Word => line.split_whitespace().map(str::to_string).collect(),
            TokenizerKind::Char => line.chars().map(String::from).collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TokenizerKind::Word => "word",
            TokenizerKind::Char => "char",
        }
    }
}

/// Map tokens through a shared (type-erased) vocabulary.
pub fn lookup_tokens<S: AsRef<str>>(vocab: &dyn Vocabulary, tokens: &[S]) -> Result<Vec<u32>> {
    tokens.iter().map(|token| vocab.lookup(token.as_ref())).collect()
}
