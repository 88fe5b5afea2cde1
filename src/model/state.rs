use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

#[derive(Debug, Clone)]
pub struct LayerState<B: Backend> {
    pub cell: Tensor<B, 2>,
    pub hidden: Tensor<B, 2>,
}

/// Per-layer LSTM memory, each tensor shaped `[batch, d_hidden]`.
#[derive(Debug, Clone)]
pub struct RecurrentState<B: Backend> {
    layers: Vec<LayerState<B>>,
}

impl<B: Backend> RecurrentState<B> {
    pub fn zeros(num_layers: usize, batch_size: usize, d_hidden: usize, device: &B::Device) -> Self {
        Self {
            layers: (0..num_layers.max(1))
                .map(|_| LayerState {
                    cell: Tensor::zeros([batch_size, d_hidden], device),
                    hidden: Tensor::zeros([batch_size, d_hidden], device),
                })
                .collect(),
        }
    }

    pub(crate) fn from_layers(layers: Vec<LayerState<B>>) -> Self {
        Self { layers }
    }

    pub fn layers(&self) -> &[LayerState<B>] {
        &self.layers
    }

    pub fn into_layers(self) -> Vec<LayerState<B>> {
        self.layers
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn batch_size(&self) -> usize {
        self.layers
            .first()
            .map(|layer| layer.hidden.dims()[0])
            .unwrap_or(0)
    }

    /// Hidden vector of the bottom layer.
    pub fn first_hidden(&self) -> Option<&Tensor<B, 2>> {
        self.layers.first().map(|layer| &layer.hidden)
    }

    pub fn detach(self) -> Self {
        Self {
            layers: self
                .layers
                .into_iter()
                .map(|layer| LayerState {
                    cell: layer.cell.detach(),
                    hidden: layer.hidden.detach(),
                })
                .collect(),
        }
    }
}
