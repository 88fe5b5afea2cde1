use std::marker::PhantomData;

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use tracing::debug;

use crate::error::{LmError, Result};

use super::{BatchProvider, BatchedStreams};

/// Contiguous time slice `[L, B]` of a batch matrix pair.
#[derive(Clone, Debug)]
pub struct Window<B: Backend> {
    pub inputs: Tensor<B, 2, Int>,
    pub targets: Tensor<B, 2, Int>,
}

impl<B: Backend> Window<B> {
    pub fn len(&self) -> usize {
        self.inputs.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batch_size(&self) -> usize {
        self.inputs.dims()[1]
    }

    /// Transpose both sides to `[B, L]`, the layout sequence models consume.
    pub fn batch_first(self) -> (Tensor<B, 2, Int>, Tensor<B, 2, Int>) {
        (self.inputs.swap_dims(0, 1), self.targets.swap_dims(0, 1))
    }
}

/// Resampling producer of fixed-length TBPTT windows.
///
/// Every traversal calls the upstream provider exactly once and then walks the
/// time axis in steps of `target_seq_len`; the final window may be shorter.
/// Because the provider is asked for fresh data on each traversal, iterating
/// the same splitter twice is not guaranteed to yield the same windows unless
/// the upstream randomness is fixed.
pub struct WindowSplitter<B: Backend, P> {
    provider: P,
    target_seq_len: usize,
    _backend: PhantomData<B>,
}

impl<B: Backend, P: BatchProvider<B>> WindowSplitter<B, P> {
    pub fn new(target_seq_len: usize, provider: P) -> Result<Self> {
        if target_seq_len == 0 {
            return Err(LmError::InvalidConfig(
                "target_seq_len must be positive".to_string(),
            ));
        }
        Ok(Self {
            provider,
            target_seq_len,
            _backend: PhantomData,
        })
    }

    /// Start a traversal over freshly provided data.
    pub fn iter(&mut self) -> Windows<B> {
        let data = self.provider.provide();
        let windows = Windows {
            time_steps: data.time_steps(),
            data,
            cursor: 0,
            target_seq_len: self.target_seq_len,
        };
        debug!(
            "window traversal over {} steps yields {} windows",
            windows.time_steps,
            windows.len()
        );
        windows
    }
}

impl<'a, B: Backend, P: BatchProvider<B>> IntoIterator for &'a mut WindowSplitter<B, P> {
    type Item = Window<B>;
    type IntoIter = Windows<B>;

    fn into_iter(self) -> Windows<B> {
        self.iter()
    }
}

/// One traversal of a [`WindowSplitter`].
pub struct Windows<B: Backend> {
    data: BatchedStreams<B>,
    cursor: usize,
    time_steps: usize,
    target_seq_len: usize,
}

impl<B: Backend> Iterator for Windows<B> {
    type Item = Window<B>;

    fn next(&mut self) -> Option<Window<B>> {
        if self.cursor >= self.time_steps {
            return None;
        }

        let end = (self.cursor + self.target_seq_len).min(self.time_steps);
        let range = self.cursor..end;
        self.cursor = end;

        Some(Window {
            inputs: self.data.inputs.clone().slice_dim(0, range.clone()),
            targets: self.data.targets.clone().slice_dim(0, range),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .time_steps
            .saturating_sub(self.cursor)
            .div_ceil(self.target_seq_len);
        (remaining, Some(remaining))
    }
}

impl<B: Backend> ExactSizeIterator for Windows<B> {}
