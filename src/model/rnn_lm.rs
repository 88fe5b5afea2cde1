use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::scoring::LanguageModel;
use crate::tokenizer::SharedVocabulary;

use super::config::RnnLmConfig;
use super::decoder::SoftmaxDecoder;
use super::lstm::LstmModel;
use super::state::RecurrentState;
use super::{Decoder, SequenceModel};

/// Trainable pairing of the recurrent model with its softmax decoder.
#[derive(Module, Debug)]
pub struct RnnLm<B: Backend> {
    pub model: LstmModel<B>,
    pub decoder: SoftmaxDecoder<B>,
}

impl<B: Backend> RnnLm<B> {
    pub fn new(config: &RnnLmConfig, device: &B::Device) -> Self {
        Self {
            model: LstmModel::new(&config.model, device),
            decoder: SoftmaxDecoder::new(&config.decoder, device),
        }
    }

    /// Logits `[batch, time, vocab]` and the state after the last step.
    pub fn forward(
        &self,
        inputs: Tensor<B, 2, Int>,
        hidden: RecurrentState<B>,
    ) -> (Tensor<B, 3>, RecurrentState<B>) {
        let (outputs, hidden) = self.model.forward(inputs, hidden);
        (self.decoder.forward(outputs), hidden)
    }

    pub fn into_scorer(
        self,
        vocab: SharedVocabulary,
    ) -> LanguageModel<B, LstmModel<B>, SoftmaxDecoder<B>> {
        LanguageModel::new(self.model, self.decoder, vocab)
    }
}
