#![recursion_limit = "256"]

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod scoring;
pub mod tokenizer;
pub mod training;

pub use config::{CorruptionConfig, ModelOverrides, PipelineConfig};
#[cfg(feature = "train")]
pub use config::{
    DatasetConfig, OptimizerConfig, TrainingConfig, TrainingHyperparameters, load_training_config,
};
pub use error::{LmError, Result};
pub use model::{
    Decoder, DecoderMode, LstmModel, LstmModelConfig, RecurrentState, RnnLm, RnnLmConfig,
    SequenceModel, SoftmaxDecoder, SoftmaxDecoderConfig, build_model_config,
};
pub use pipeline::{
    BatchProvider, BatchedStreams, Corruptor, LazyBatcher, StreamProvider, TokenStreams, Window,
    WindowSplitter, batchify, form_input_targets,
};
pub use scoring::{HiddenSeed, HiddenStateProvider, LanguageModel, MaskedBatch};
pub use tokenizer::{SharedVocabulary, TokenVocab, TokenizerKind, Vocabulary};
pub use training::{EpochStats, evaluate, train_epoch};
