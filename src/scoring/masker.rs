use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};

use crate::error::{LmError, Result};

/// Shifted, right-padded view of a batch of variable-length id sequences.
///
/// With `W = max_len - 1`, row `i` of `inputs` is sequence `i` without its
/// last token and row `i` of `targets` is the same sequence without its first
/// token, both padded to `W`. `mask` is 1 where the target is a real token.
#[derive(Clone, Debug)]
pub struct MaskedSteps<B: Backend> {
    pub inputs: Tensor<B, 2, Int>,
    pub targets: Tensor<B, 2, Int>,
    pub mask: Tensor<B, 2, Int>,
}

/// Padded batch for scoring; with the first-token column prepended, targets and mask are `[batch, max_len]`.
///
/// Padded cells hold the requested padding id. Scorers zero them through the
/// mask before any embedding lookup, so the padding id need not be in the vocabulary.
#[derive(Clone, Debug)]
pub struct MaskedBatch<B: Backend> {
    /// First token of every sequence, `[batch, 1]`.
    pub first_tokens: Tensor<B, 2, Int>,
    /// `None` when every sequence holds a single token.
    pub steps: Option<MaskedSteps<B>>,
    lengths: Vec<usize>,
}

impl<B: Backend> MaskedBatch<B> {
    pub fn from_sequences<S: AsRef<[u32]>>(sequences: &[S], device: &B::Device) -> Result<Self> {
        Self::from_sequences_with_padding(sequences, 0, device)
    }

    /// Like [`from_sequences`](Self::from_sequences) with an explicit padding id.
    pub fn from_sequences_with_padding<S: AsRef<[u32]>>(
        sequences: &[S],
        pad_id: i64,
        device: &B::Device,
    ) -> Result<Self> {
        if sequences.is_empty() {
            return Err(LmError::EmptyBatch);
        }

        let mut lengths = Vec::with_capacity(sequences.len());
        let mut first = Vec::with_capacity(sequences.len());
        for (index, sequence) in sequences.iter().enumerate() {
            let sequence = sequence.as_ref();
            let Some(&head) = sequence.first() else {
                return Err(LmError::EmptySequence { index });
            };
            lengths.push(sequence.len());
            first.push(i64::from(head));
        }

        let batch_size = sequences.len();
        let width = lengths.iter().copied().max().unwrap_or(1) - 1;
        let first_tokens =
            Tensor::<B, 2, Int>::from_data(TensorData::new(first, [batch_size, 1]), device);

        if width == 0 {
            return Ok(Self {
                first_tokens,
                steps: None,
                lengths,
            });
        }

        let mut inputs = vec![pad_id; batch_size * width];
        let mut targets = vec![pad_id; batch_size * width];
        let mut mask = vec![0i64; batch_size * width];
        for (row, sequence) in sequences.iter().enumerate() {
            let sequence = sequence.as_ref();
            let base = row * width;
            for (t, pair) in sequence.windows(2).enumerate() {
                inputs[base + t] = i64::from(pair[0]);
                targets[base + t] = i64::from(pair[1]);
                mask[base + t] = 1;
            }
        }

        let shape = [batch_size, width];
        let steps = MaskedSteps {
            inputs: Tensor::from_data(TensorData::new(inputs, shape), device),
            targets: Tensor::from_data(TensorData::new(targets, shape), device),
            mask: Tensor::from_data(TensorData::new(mask, shape), device),
        };

        Ok(Self {
            first_tokens,
            steps: Some(steps),
            lengths,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.lengths.len()
    }

    /// Original (unpadded) length of every sequence.
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Number of shifted time steps, `max_len - 1`.
    pub fn width(&self) -> usize {
        self.steps
            .as_ref()
            .map(|steps| steps.inputs.dims()[1])
            .unwrap_or(0)
    }
}
