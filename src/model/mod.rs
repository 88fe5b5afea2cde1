mod config;
mod decoder;
mod lstm;
mod rnn_lm;
mod state;

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

pub use config::{LstmModelConfig, RnnLmConfig, SoftmaxDecoderConfig, build_model_config};
pub use decoder::{DecoderSettings, SoftmaxDecoder};
pub use lstm::LstmModel;
pub use rnn_lm::RnnLm;
pub use state::{LayerState, RecurrentState};

/// Recurrent sequence model consumed by the scorer and the TBPTT loop.
///
/// Inputs are batch-first id matrices `[batch, time]`; outputs are
/// `[batch, time, dim]`. The hidden state is opaque to callers and is passed
/// through unmodified.
pub trait SequenceModel<B: Backend> {
    type Hidden: Clone;

    fn forward(&self, inputs: Tensor<B, 2, Int>, hidden: Self::Hidden)
    -> (Tensor<B, 3>, Self::Hidden);

    fn init_hidden(&self, batch_size: usize) -> Self::Hidden;

    /// Output-shaped view `[batch, 1, dim]` of a hidden state, used as the
    /// output that "precedes" the first token of a sequence.
    fn hidden_output(&self, hidden: &Self::Hidden) -> Tensor<B, 3>;

    /// Cut the autodiff graph so the next window does not backpropagate into this one.
    fn detach(&self, hidden: Self::Hidden) -> Self::Hidden;

    /// Disable stochastic layers such as dropout, on every backend.
    fn eval(self) -> Self
    where
        Self: Sized;

    fn device(&self) -> B::Device;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderMode {
    Train,
    Eval,
}

/// Maps model outputs to token distributions and scores targets against them.
pub trait Decoder<B: Backend> {
    fn forward(&self, outputs: Tensor<B, 3>) -> Tensor<B, 3>;

    /// Summed loss over all positions and the number of positions scored.
    ///
    /// Training mode may apply regularization such as label smoothing.
    fn neg_log_prob(
        &self,
        outputs: Tensor<B, 3>,
        targets: Tensor<B, 2, Int>,
    ) -> (Tensor<B, 1>, usize);

    /// Exact per-token negative log-probability, shaped like `targets`.
    fn neg_log_prob_raw(&self, outputs: Tensor<B, 3>, targets: Tensor<B, 2, Int>)
    -> Tensor<B, 2>;

    fn mode(&self) -> DecoderMode;

    fn with_mode(self, mode: DecoderMode) -> Self
    where
        Self: Sized;

    fn train(self) -> Self
    where
        Self: Sized,
    {
        self.with_mode(DecoderMode::Train)
    }

    fn eval(self) -> Self
    where
        Self: Sized,
    {
        self.with_mode(DecoderMode::Eval)
    }
}
