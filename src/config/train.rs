use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::tokenizer::TokenizerKind;

use super::core::{ModelOverrides, PipelineConfig};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TrainingConfig {
    pub dataset: DatasetConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub model: ModelOverrides,
    pub optimizer: OptimizerConfig,
    pub training: TrainingHyperparameters,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DatasetConfig {
    pub train_path: PathBuf,
    #[serde(default)]
    pub valid_path: Option<PathBuf>,
    #[serde(default)]
    pub tokenizer: TokenizerKind,
    #[serde(default = "default_true")]
    pub add_eos: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OptimizerConfig {
    pub learning_rate: f64,
    #[serde(default)]
    pub weight_decay: f32,
    #[serde(default)]
    pub grad_clip: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TrainingHyperparameters {
    pub epochs: usize,
    pub log_frequency: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,
}

/// Load a training configuration from TOML files applied in order.
///
/// Tables are merged key by key, so later files only need to name the values they override.
pub fn load_training_config(paths: &[PathBuf]) -> Result<TrainingConfig> {
    let mut merged = toml::Value::Table(toml::map::Map::new());
    for path in paths {
        merge_values(&mut merged, read_toml(path)?);
    }

    let config: TrainingConfig = merged
        .try_into()
        .context("failed to deserialize training config")?;
    config
        .pipeline
        .validate()
        .context("invalid pipeline configuration")?;
    Ok(config)
}

fn read_toml(path: &Path) -> Result<toml::Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
}

fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn default_true() -> bool {
    true
}

fn default_seed() -> u64 {
    1337
}

fn default_run_dir() -> PathBuf {
    PathBuf::from("runs/lstm")
}
