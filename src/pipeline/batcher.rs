use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use tracing::debug;

use crate::error::{LmError, Result};

use super::{BatchProvider, BatchedStreams, StreamProvider};

/// Reshape a flat stream into a time-major `[T, B]` matrix with `T = len / batch_size`.
///
/// The stream is cut into `batch_size` contiguous runs of length `T`, run `b`
/// becoming column `b`, so `matrix[t, b] == stream[b * T + t]`. Trailing
/// tokens that do not fill a whole row are dropped.
pub fn batchify<B: Backend>(
    stream: &[i64],
    batch_size: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let steps = stream.len().checked_div(batch_size).unwrap_or(0);
    let kept = stream[..steps * batch_size].to_vec();

    Tensor::<B, 2, Int>::from_data(TensorData::new(kept, [batch_size, steps]), device)
        .swap_dims(0, 1)
}

/// Pulls a stream pair from its source on every call and batchifies both sides.
pub struct LazyBatcher<B: Backend, S> {
    source: S,
    batch_size: usize,
    device: B::Device,
}

impl<B: Backend, S: StreamProvider> LazyBatcher<B, S> {
    pub fn new(batch_size: usize, source: S, device: &B::Device) -> Result<Self> {
        if batch_size == 0 {
            return Err(LmError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        Ok(Self {
            source,
            batch_size,
            device: device.clone(),
        })
    }
}

impl<B: Backend, S: StreamProvider> BatchProvider<B> for LazyBatcher<B, S> {
    fn provide(&mut self) -> BatchedStreams<B> {
        let streams = self.source.provide();
        let inputs = batchify::<B>(streams.inputs(), self.batch_size, &self.device);
        let targets = batchify::<B>(streams.targets(), self.batch_size, &self.device);

        let batched = BatchedStreams { inputs, targets };
        debug!(
            "batched {} tokens into [{}, {}] (dropped {})",
            streams.len(),
            batched.time_steps(),
            batched.batch_size(),
            streams.len() - batched.time_steps() * batched.batch_size()
        );
        batched
    }
}
