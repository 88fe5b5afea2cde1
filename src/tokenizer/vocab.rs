#[cfg(feature = "train")]
use std::fs;
#[cfg(feature = "train")]
use std::path::Path;

#[cfg(feature = "train")]
use anyhow::Context;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{LmError, Result};

use super::{TokenizerKind, Vocabulary};

/// End-of-sentence marker appended to every line when a vocabulary is fit with `add_eos`.
pub const EOS_TOKEN: &str = "</s>";

/// Insertion-ordered token table; a token's id is its position in the table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenVocab {
    tokens: IndexSet<String>,
    kind: TokenizerKind,
    eos: Option<u32>,
}

impl TokenVocab {
    /// Collect every token of `lines` in first-seen order.
    pub fn fit<'a, I>(lines: I, kind: TokenizerKind, add_eos: bool) -> Self
    where
        I: Iterator<Item = &'a str>,
    {
        let mut tokens = IndexSet::new();
        if add_eos {
            tokens.insert(EOS_TOKEN.to_string());
        }

        for line in lines {
            for token in kind.split(line) {
                tokens.insert(token);
            }
        }

        let eos = add_eos.then_some(0);
        Self { tokens, kind, eos }
    }

    pub fn from_tokens<I, S>(tokens: I, kind: TokenizerKind) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = IndexSet::new();
        for token in tokens {
            let token = token.into();
            if table.contains(&token) {
                return Err(LmError::InvalidConfig(format!(
                    "duplicate token {token:?} in vocabulary"
                )));
            }
            table.insert(token);
        }

        let eos = table.get_index_of(EOS_TOKEN).map(|idx| idx as u32);
        Ok(Self {
            tokens: table,
            kind,
            eos,
        })
    }

    pub fn kind(&self) -> TokenizerKind {
        self.kind
    }

    pub fn eos(&self) -> Option<u32> {
        self.eos
    }

    /// Split one line and map it to ids, closing it with the end-of-sentence id when present.
    pub fn encode_line(&self, line: &str) -> Result<Vec<u32>> {
        let mut ids = self
            .kind
            .split(line)
            .iter()
            .map(|token| self.lookup(token))
            .collect::<Result<Vec<_>>>()?;
        if let Some(eos) = self.eos {
            ids.push(eos);
        }
        Ok(ids)
    }

    /// Encode a whole corpus into one flat stream, line by line.
    pub fn encode_text(&self, text: &str) -> Result<Vec<u32>> {
        let mut stream = Vec::new();
        for line in text.lines() {
            stream.extend(self.encode_line(line)?);
        }
        Ok(stream)
    }

    fn to_record(&self) -> TokenVocabRecord {
        TokenVocabRecord {
            kind: self.kind,
            tokens: self.tokens.iter().cloned().collect(),
        }
    }

    fn from_record(record: TokenVocabRecord) -> Result<Self> {
        Self::from_tokens(record.tokens, record.kind)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_record())
            .map_err(|err| LmError::InvalidConfig(format!("failed to serialize vocabulary: {err}")))
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let record: TokenVocabRecord = serde_json::from_str(data)
            .map_err(|err| LmError::InvalidConfig(format!("failed to parse vocabulary: {err}")))?;
        Self::from_record(record)
    }

    #[cfg(feature = "train")]
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let json = self.to_json()?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    #[cfg(feature = "train")]
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read vocabulary {}", path.display()))?;
        Self::from_json_str(&data)
            .with_context(|| format!("failed to parse vocabulary {}", path.display()))
    }
}

impl Vocabulary for TokenVocab {
    fn lookup(&self, token: &str) -> Result<u32> {
        self.tokens
            .get_index_of(token)
            .map(|idx| idx as u32)
            .ok_or_else(|| LmError::UnknownToken(token.to_string()))
    }

    fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get_index(id as usize).map(String::as_str)
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }

    fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct TokenVocabRecord {
    kind: TokenizerKind,
    tokens: Vec<String>,
}
