use std::marker::PhantomData;

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};

use crate::error::{LmError, Result};
use crate::model::{Decoder, SequenceModel};
use crate::tokenizer::{SharedVocabulary, lookup_tokens};

use super::hidden::HiddenStateProvider;
use super::masker::MaskedBatch;

/// Likelihood scorer over a vocabulary, a sequence model and a decoder.
///
/// The first token of an unprefixed sequence has no real predecessor. Its
/// probability is taken from the decoder applied to the model's initial
/// hidden state ([`SequenceModel::hidden_output`]), so that sequences scored
/// alone and sequences scored in a padded batch get identical totals.
pub struct LanguageModel<B: Backend, M, D> {
    model: M,
    decoder: D,
    vocab: SharedVocabulary,
    _backend: PhantomData<B>,
}

impl<B, M, D> LanguageModel<B, M, D>
where
    B: Backend,
    M: SequenceModel<B>,
    D: Decoder<B>,
{
    /// Model and decoder are switched to evaluation mode; scores are exact NLLs.
    pub fn new(model: M, decoder: D, vocab: SharedVocabulary) -> Self {
        Self {
            model: model.eval(),
            decoder: decoder.eval(),
            vocab,
            _backend: PhantomData,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn vocab(&self) -> &SharedVocabulary {
        &self.vocab
    }

    pub fn device(&self) -> B::Device {
        self.model.device()
    }

    /// Run the model and decode its outputs to logits.
    pub fn forward(
        &self,
        inputs: Tensor<B, 2, Int>,
        hidden: M::Hidden,
    ) -> (Tensor<B, 3>, M::Hidden) {
        let (outputs, hidden) = self.model.forward(inputs, hidden);
        (self.decoder.forward(outputs), hidden)
    }

    /// Negative log-probability of one token sequence, optionally conditioned on a prefix token.
    pub fn single_sentence_nll<S: AsRef<str>>(
        &self,
        sentence: &[S],
        prefix: Option<&str>,
    ) -> Result<f32> {
        let ids = self.lookup(sentence)?;
        let prefix_id = self.lookup_prefix(prefix)?;
        let device = self.device();
        let h0 = self.model.init_hidden(1);

        let nll = match prefix_id {
            Some(prefix_id) => {
                if ids.is_empty() {
                    return Ok(0.0);
                }
                let mut sequence = Vec::with_capacity(ids.len() + 1);
                sequence.push(prefix_id);
                sequence.extend(ids);

                let inputs = id_row::<B>(&sequence[..sequence.len() - 1], &device);
                let targets = id_row::<B>(&sequence[1..], &device);
                let (outputs, _) = self.model.forward(inputs, h0);
                self.decoder.neg_log_prob(outputs, targets).0
            }
            None => {
                if ids.is_empty() {
                    return Err(LmError::EmptySequence { index: 0 });
                }
                let mut outputs = vec![self.model.hidden_output(&h0)];
                if ids.len() > 1 {
                    let inputs = id_row::<B>(&ids[..ids.len() - 1], &device);
                    outputs.push(self.model.forward(inputs, h0).0);
                }
                let targets = id_row::<B>(&ids, &device);
                self.decoder.neg_log_prob(Tensor::cat(outputs, 1), targets).0
            }
        };

        first_value(nll)
    }

    /// Per-sentence negative log-probabilities, in input order.
    ///
    /// A shared prefix token is prepended to every sentence; without one the
    /// first token of each sentence is scored from the initial hidden state.
    pub fn batch_nll<T, S>(&self, sentences: &[T], prefix: Option<&str>) -> Result<Vec<f32>>
    where
        T: AsRef<[S]>,
        S: AsRef<str>,
    {
        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        let mut idx_seqs = sentences
            .iter()
            .map(|sentence| lookup_tokens(self.vocab.as_ref(), sentence.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let prefix_id = match prefix.filter(|token| !token.is_empty()) {
            Some(token) => Some(self.vocab.lookup(token)?),
            None => None,
        };
        if let Some(prefix_id) = prefix_id {
            for ids in idx_seqs.iter_mut() {
                ids.insert(0, prefix_id);
            }
        }

        let masked = self.batch_nll_idxs(&idx_seqs, prefix_id.is_none())?;
        row_sums(masked)
    }

    /// Masked per-token negative log-probabilities `[batch, width]` for id sequences.
    ///
    /// Padding positions are exactly zero. With `predict_first`, column 0 holds
    /// the score of each sequence's first token.
    pub fn batch_nll_idxs<S: AsRef<[u32]>>(
        &self,
        idxs: &[S],
        predict_first: bool,
    ) -> Result<Tensor<B, 2>> {
        let batch = MaskedBatch::from_sequences(idxs, &self.device())?;
        Ok(self.masked_nll(batch, predict_first))
    }

    /// Score an already masked batch; see [`batch_nll_idxs`](Self::batch_nll_idxs).
    pub fn masked_nll(&self, batch: MaskedBatch<B>, predict_first: bool) -> Tensor<B, 2> {
        let device = self.device();
        let batch_size = batch.batch_size();
        let h0 = self.model.init_hidden(batch_size);

        let mut outputs = Vec::with_capacity(2);
        let mut targets = Vec::with_capacity(2);
        let mut masks = Vec::with_capacity(2);

        if predict_first {
            outputs.push(self.model.hidden_output(&h0));
            targets.push(batch.first_tokens);
            masks.push(Tensor::<B, 2>::ones([batch_size, 1], &device));
        }
        if let Some(steps) = batch.steps {
            // Padded cells become id 0 so no lookup sees the padding id.
            let inputs = steps.inputs * steps.mask.clone();
            let (steps_out, _) = self.model.forward(inputs, h0);
            outputs.push(steps_out);
            targets.push(steps.targets * steps.mask.clone());
            masks.push(steps.mask.float());
        }

        if outputs.is_empty() {
            // Prefix-only sequences: nothing left to predict.
            return Tensor::zeros([batch_size, 1], &device);
        }

        let nll = self
            .decoder
            .neg_log_prob_raw(Tensor::cat(outputs, 1), Tensor::cat(targets, 1));
        nll * Tensor::cat(masks, 1)
    }

    /// Initial hidden states conditioned on `prefix`; an empty prefix is a passthrough to
    /// the model's `init_hidden`.
    pub fn custom_h0_provider<S: AsRef<str>>(
        &self,
        prefix: &[S],
    ) -> Result<HiddenStateProvider<'_, B, M>> {
        if prefix.is_empty() {
            return Ok(HiddenStateProvider::passthrough(&self.model));
        }
        let ids = lookup_tokens(self.vocab.as_ref(), prefix)?;
        Ok(HiddenStateProvider::with_prefix(
            &self.model,
            &ids,
            &self.device(),
        ))
    }

    fn lookup<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<i64>> {
        Ok(lookup_tokens(self.vocab.as_ref(), tokens)?
            .into_iter()
            .map(i64::from)
            .collect())
    }

    fn lookup_prefix(&self, prefix: Option<&str>) -> Result<Option<i64>> {
        match prefix.filter(|token| !token.is_empty()) {
            Some(token) => Ok(Some(i64::from(self.vocab.lookup(token)?))),
            None => Ok(None),
        }
    }
}

fn id_row<B: Backend>(ids: &[i64], device: &B::Device) -> Tensor<B, 2, Int> {
    Tensor::from_data(TensorData::new(ids.to_vec(), [1, ids.len()]), device)
}

fn first_value<B: Backend>(tensor: Tensor<B, 1>) -> Result<f32> {
    tensor_values(tensor)?
        .first()
        .copied()
        .ok_or_else(|| LmError::TensorData("scalar tensor was empty".to_string()))
}

fn row_sums<B: Backend>(masked: Tensor<B, 2>) -> Result<Vec<f32>> {
    let [batch, _] = masked.dims();
    tensor_values(masked.sum_dim(1).reshape([batch]))
}

fn tensor_values<B: Backend>(tensor: Tensor<B, 1>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .into_vec::<f32>()
        .map_err(|err| LmError::TensorData(format!("{err:?}")))
}
