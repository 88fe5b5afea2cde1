mod hidden;
mod language_model;
mod masker;

pub use hidden::{HiddenSeed, HiddenStateProvider};
pub use language_model::LanguageModel;
pub use masker::{MaskedBatch, MaskedSteps};
