pub mod core;
#[cfg(feature = "train")]
pub mod train;

pub use self::core::{CorruptionConfig, ModelOverrides, PipelineConfig};
#[cfg(feature = "train")]
pub use self::train::{
    DatasetConfig, OptimizerConfig, TrainingConfig, TrainingHyperparameters, load_training_config,
};
