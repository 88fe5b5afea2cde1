//! Truncated backpropagation through time over a [`WindowSplitter`].

use burn::optim::{GradientsParams, LearningRate, Optimizer};
use burn::tensor::Tensor;
use burn::tensor::backend::{AutodiffBackend, Backend};
use tracing::{debug, info};

use crate::error::{LmError, Result};
use crate::model::{Decoder, RnnLm, SequenceModel};
use crate::pipeline::{BatchProvider, WindowSplitter};

/// Loss accumulated over one traversal of a splitter.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EpochStats {
    pub windows: usize,
    pub tokens: usize,
    pub total_loss: f64,
}

impl EpochStats {
    fn record(&mut self, tokens: usize, summed_loss: f64) {
        self.windows += 1;
        self.tokens += tokens;
        self.total_loss += summed_loss;
    }

    /// Per-token mean loss, zero when nothing was scored.
    pub fn mean_loss(&self) -> f64 {
        if self.tokens == 0 {
            return 0.0;
        }
        self.total_loss / self.tokens as f64
    }

    pub fn perplexity(&self) -> f64 {
        self.mean_loss().exp()
    }
}

/// Train over one traversal of `splitter`, stepping the optimizer once per window.
///
/// The recurrent state flows from window to window but is detached first, so
/// gradients never reach past the current window. The decoder runs in
/// training mode.
pub fn train_epoch<B, P, O>(
    lm: RnnLm<B>,
    optimizer: &mut O,
    splitter: &mut WindowSplitter<B, P>,
    learning_rate: LearningRate,
    log_frequency: usize,
) -> Result<(RnnLm<B>, EpochStats)>
where
    B: AutodiffBackend,
    P: BatchProvider<B>,
    O: Optimizer<RnnLm<B>, B>,
{
    let mut lm = RnnLm {
        decoder: lm.decoder.train(),
        ..lm
    };
    let mut stats = EpochStats::default();
    let mut hidden = None;

    for window in splitter.iter() {
        let (inputs, targets) = window.batch_first();
        let state = match hidden.take() {
            Some(state) => lm.model.detach(state),
            None => lm.model.init_hidden(inputs.dims()[0]),
        };

        let (outputs, next) = lm.model.forward(inputs, state);
        let (total, count) = lm.decoder.neg_log_prob(outputs, targets);
        let loss = total.div_scalar(count.max(1) as f32);
        let loss_value = scalar(loss.clone())?;

        let grads = GradientsParams::from_grads(loss.backward(), &lm);
        lm = optimizer.step(learning_rate, lm, grads);
        hidden = Some(next);

        stats.record(count, f64::from(loss_value) * count as f64);
        if log_frequency > 0 && stats.windows % log_frequency == 0 {
            info!(
                "window {} loss {:.4} ppl {:.2}",
                stats.windows,
                loss_value,
                f64::from(loss_value).exp()
            );
        }
    }

    debug!(
        "epoch finished: {} windows, {} tokens",
        stats.windows, stats.tokens
    );
    Ok((lm, stats))
}

/// Exact negative log-likelihood over one traversal, without gradient steps.
pub fn evaluate<B, P>(lm: &RnnLm<B>, splitter: &mut WindowSplitter<B, P>) -> Result<EpochStats>
where
    B: Backend,
    P: BatchProvider<B>,
{
    let mut stats = EpochStats::default();
    let mut hidden = None;

    for window in splitter.iter() {
        let (inputs, targets) = window.batch_first();
        let [batch, time] = inputs.dims();
        let state = hidden.take().unwrap_or_else(|| lm.model.init_hidden(batch));

        let (outputs, next) = lm.model.forward(inputs, state);
        let nll = lm.decoder.neg_log_prob_raw(outputs, targets).sum();
        hidden = Some(next);

        stats.record(batch * time, f64::from(scalar(nll)?));
    }

    Ok(stats)
}

fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> Result<f32> {
    tensor
        .into_data()
        .convert::<f32>()
        .into_vec::<f32>()
        .map_err(|err| LmError::TensorData(format!("{err:?}")))?
        .first()
        .copied()
        .ok_or_else(|| LmError::TensorData("loss tensor was empty".to_string()))
}
