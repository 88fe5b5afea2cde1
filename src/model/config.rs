use serde::{Deserialize, Serialize};

use crate::config::ModelOverrides;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LstmModelConfig {
    pub vocab_size: usize,
    pub d_embed: usize,
    pub d_hidden: usize,
    pub n_layers: usize,
    pub dropout: f64,
}

impl Default for LstmModelConfig {
    fn default() -> Self {
        Self {
            vocab_size: 256,
            d_embed: 256,
            d_hidden: 256,
            n_layers: 2,
            dropout: 0.2,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SoftmaxDecoderConfig {
    pub d_input: usize,
    pub vocab_size: usize,
    pub label_smoothing: f32,
}

impl Default for SoftmaxDecoderConfig {
    fn default() -> Self {
        Self {
            d_input: 256,
            vocab_size: 256,
            label_smoothing: 0.0,
        }
    }
}

/// Architecture of a trainable [`RnnLm`](super::RnnLm); persisted next to its weights.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Default)]
pub struct RnnLmConfig {
    pub model: LstmModelConfig,
    pub decoder: SoftmaxDecoderConfig,
}

/// Build a model configuration by applying overrides to the defaults.
pub fn build_model_config(overrides: &ModelOverrides, vocab_size: usize) -> RnnLmConfig {
    let mut model = LstmModelConfig::default();
    let mut decoder = SoftmaxDecoderConfig::default();

    if let Some(d_embed) = overrides.d_embed {
        model.d_embed = d_embed;
    }
    if let Some(d_hidden) = overrides.d_hidden {
        model.d_hidden = d_hidden;
    }
    if let Some(n_layers) = overrides.n_layers {
        model.n_layers = n_layers.max(1);
    }
    if let Some(dropout) = overrides.dropout {
        model.dropout = dropout;
    }
    if let Some(label_smoothing) = overrides.label_smoothing {
        decoder.label_smoothing = label_smoothing.clamp(0.0, 1.0);
    }

    model.vocab_size = vocab_size;
    decoder.vocab_size = vocab_size;
    decoder.d_input = model.d_hidden;

    RnnLmConfig { model, decoder }
}
