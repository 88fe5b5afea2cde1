//! TBPTT data preparation: substitution noise, time-major batching and window slicing.
//!
//! Data flows `TokenStreams -> Corruptor -> LazyBatcher -> WindowSplitter`; every
//! stage pulls from the one before it through [`StreamProvider`] or [`BatchProvider`].

mod batcher;
mod corruptor;
mod splitter;

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::error::{LmError, Result};

pub use batcher::{LazyBatcher, batchify};
pub use corruptor::Corruptor;
pub use splitter::{Window, WindowSplitter, Windows};

/// Paired input/target id streams where `targets[i]` follows `inputs[i]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenStreams {
    inputs: Vec<i64>,
    targets: Vec<i64>,
}

impl TokenStreams {
    pub fn new(inputs: Vec<i64>, targets: Vec<i64>) -> Result<Self> {
        if inputs.len() != targets.len() {
            return Err(LmError::StreamLengthMismatch {
                inputs: inputs.len(),
                targets: targets.len(),
            });
        }
        Ok(Self { inputs, targets })
    }

    /// Pair every token of a flat stream with its successor.
    pub fn from_stream(stream: &[i64]) -> Self {
        let (inputs, targets) = form_input_targets(stream);
        Self { inputs, targets }
    }

    pub fn inputs(&self) -> &[i64] {
        &self.inputs
    }

    pub fn targets(&self) -> &[i64] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Split a flat stream into `(stream[..n-1], stream[1..])`.
pub fn form_input_targets(stream: &[i64]) -> (Vec<i64>, Vec<i64>) {
    if stream.is_empty() {
        return (Vec::new(), Vec::new());
    }
    (
        stream[..stream.len() - 1].to_vec(),
        stream[1..].to_vec(),
    )
}

/// Source of equal-length input/target streams.
pub trait StreamProvider {
    fn provide(&mut self) -> TokenStreams;
}

/// Clean streams provide themselves unchanged.
impl StreamProvider for TokenStreams {
    fn provide(&mut self) -> TokenStreams {
        self.clone()
    }
}

/// Time-major `[T, B]` input and target matrices.
#[derive(Clone, Debug)]
pub struct BatchedStreams<B: Backend> {
    pub inputs: Tensor<B, 2, Int>,
    pub targets: Tensor<B, 2, Int>,
}

impl<B: Backend> BatchedStreams<B> {
    pub fn time_steps(&self) -> usize {
        self.inputs.dims()[0]
    }

    pub fn batch_size(&self) -> usize {
        self.inputs.dims()[1]
    }
}

/// Source of batch matrices; each call may return freshly sampled data.
pub trait BatchProvider<B: Backend> {
    fn provide(&mut self) -> BatchedStreams<B>;
}
