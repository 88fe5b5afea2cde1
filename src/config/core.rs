use serde::{Deserialize, Serialize};

use crate::error::{LmError, Result};

/// Substitution noise applied to the input side of a training stream.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CorruptionConfig {
    #[serde(default)]
    pub substitution_rate: f64,
    /// Replacement ids are drawn from `[0, substitution_range)`; defaults to the vocabulary size.
    #[serde(default)]
    pub substitution_range: Option<u32>,
    /// Accepted for config compatibility; deletion is not performed.
    #[serde(default)]
    pub deletion_rate: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for CorruptionConfig {
    fn default() -> Self {
        Self {
            substitution_rate: 0.0,
            substitution_range: None,
            deletion_rate: 0.0,
            seed: None,
        }
    }
}

impl CorruptionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.substitution_rate) {
            return Err(LmError::InvalidConfig(format!(
                "substitution_rate must lie in [0, 1], got {}",
                self.substitution_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.deletion_rate) {
            return Err(LmError::InvalidConfig(format!(
                "deletion_rate must lie in [0, 1], got {}",
                self.deletion_rate
            )));
        }
        if self.substitution_range == Some(0) {
            return Err(LmError::InvalidConfig(
                "substitution_range must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub target_seq_len: usize,
    #[serde(default)]
    pub corruption: CorruptionConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(LmError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.target_seq_len == 0 {
            return Err(LmError::InvalidConfig(
                "target_seq_len must be positive".to_string(),
            ));
        }
        self.corruption.validate()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct ModelOverrides {
    pub d_embed: Option<usize>,
    pub d_hidden: Option<usize>,
    pub n_layers: Option<usize>,
    pub dropout: Option<f64>,
    pub label_smoothing: Option<f32>,
}
