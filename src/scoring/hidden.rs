use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};

use crate::model::SequenceModel;

/// Where a [`HiddenStateProvider`] takes its initial state from.
#[derive(Clone, Debug)]
pub enum HiddenSeed<B: Backend> {
    /// The model's own `init_hidden`.
    Default,
    /// The state reached after running the model over these ids, `[1, P]`.
    Prefix(Tensor<B, 2, Int>),
}

/// Produces initial hidden states for a requested batch size.
///
/// The prefix ids are mapped and placed on the model's device once; each
/// [`provide`](Self::provide) call replicates them across the batch and runs
/// the model from its default initial state.
pub struct HiddenStateProvider<'a, B: Backend, M> {
    model: &'a M,
    seed: HiddenSeed<B>,
}

impl<'a, B: Backend, M: SequenceModel<B>> HiddenStateProvider<'a, B, M> {
    pub fn passthrough(model: &'a M) -> Self {
        Self {
            model,
            seed: HiddenSeed::Default,
        }
    }

    /// Seed from a prefix; an empty prefix degrades to [`passthrough`](Self::passthrough).
    pub fn with_prefix(model: &'a M, prefix_ids: &[u32], device: &B::Device) -> Self {
        if prefix_ids.is_empty() {
            return Self::passthrough(model);
        }

        let ids: Vec<i64> = prefix_ids.iter().map(|&id| i64::from(id)).collect();
        let prefix = Tensor::<B, 2, Int>::from_data(TensorData::new(ids, [1, prefix_ids.len()]), device);
        Self {
            model,
            seed: HiddenSeed::Prefix(prefix),
        }
    }

    pub fn is_prefixed(&self) -> bool {
        matches!(self.seed, HiddenSeed::Prefix(_))
    }

    pub fn provide(&self, batch_size: usize) -> M::Hidden {
        let h0 = self.model.init_hidden(batch_size);
        match &self.seed {
            HiddenSeed::Prefix(prefix) if batch_size > 0 => {
                let replicated = Tensor::cat(vec![prefix.clone(); batch_size], 0);
                let (_, hidden) = self.model.forward(replicated, h0);
                hidden
            }
            _ => h0,
        }
    }
}
