use burn::module::Module;
use burn::nn::{
    Dropout, DropoutConfig, Embedding, EmbeddingConfig, Lstm, LstmConfig, LstmState,
};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use super::SequenceModel;
use super::config::LstmModelConfig;
use super::state::{LayerState, RecurrentState};

/// Embedding followed by stacked LSTM layers with dropout between them.
#[derive(Module, Debug)]
pub struct LstmModel<B: Backend> {
    d_hidden: usize,
    embedding: Embedding<B>,
    layers: Vec<Lstm<B>>,
    dropout: Dropout,
}

impl<B: Backend> LstmModel<B> {
    pub fn new(config: &LstmModelConfig, device: &B::Device) -> Self {
        let embedding = EmbeddingConfig::new(config.vocab_size, config.d_embed).init(device);
        let layers = (0..config.n_layers.max(1))
            .map(|idx| {
                let d_input = if idx == 0 {
                    config.d_embed
                } else {
                    config.d_hidden
                };
                LstmConfig::new(d_input, config.d_hidden, true).init(device)
            })
            .collect();
        let dropout = DropoutConfig::new(config.dropout).init();

        Self {
            d_hidden: config.d_hidden,
            embedding,
            layers,
            dropout,
        }
    }

    pub fn d_hidden(&self) -> usize {
        self.d_hidden
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }
}

impl<B: Backend> SequenceModel<B> for LstmModel<B> {
    type Hidden = RecurrentState<B>;

    fn forward(
        &self,
        inputs: Tensor<B, 2, Int>,
        hidden: RecurrentState<B>,
    ) -> (Tensor<B, 3>, RecurrentState<B>) {
        let mut x = self.dropout.forward(self.embedding.forward(inputs));
        let mut next = Vec::with_capacity(self.layers.len());

        for (lstm, state) in self.layers.iter().zip(hidden.into_layers()) {
            let (output, state) =
                lstm.forward(x, Some(LstmState::new(state.cell, state.hidden)));
            next.push(LayerState {
                cell: state.cell,
                hidden: state.hidden,
            });
            x = self.dropout.forward(output);
        }

        (x, RecurrentState::from_layers(next))
    }

    fn init_hidden(&self, batch_size: usize) -> RecurrentState<B> {
        RecurrentState::zeros(self.layers.len(), batch_size, self.d_hidden, &self.device())
    }

    fn hidden_output(&self, hidden: &RecurrentState<B>) -> Tensor<B, 3> {
        match hidden.first_hidden() {
            Some(first) => first.clone().unsqueeze_dim::<3>(1),
            None => Tensor::zeros([hidden.batch_size(), 1, self.d_hidden], &self.device()),
        }
    }

    fn detach(&self, hidden: RecurrentState<B>) -> RecurrentState<B> {
        hidden.detach()
    }

    fn eval(self) -> Self {
        Self {
            dropout: DropoutConfig::new(0.0).init(),
            ..self
        }
    }

    fn device(&self) -> B::Device {
        self.embedding.weight.val().device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn small_config() -> LstmModelConfig {
        LstmModelConfig {
            vocab_size: 11,
            d_embed: 6,
            d_hidden: 5,
            n_layers: 2,
            dropout: 0.0,
        }
    }

    #[test]
    fn forward_keeps_batch_first_layout() {
        let device = Default::default();
        let model = LstmModel::<TestBackend>::new(&small_config(), &device);
        let inputs = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::new(vec![1i64, 2, 3, 4, 5, 6], [2, 3]),
            &device,
        );

        let (outputs, hidden) = model.forward(inputs, model.init_hidden(2));
        assert_eq!(outputs.dims(), [2, 3, 5]);
        assert_eq!(hidden.num_layers(), 2);
        assert_eq!(hidden.batch_size(), 2);
    }

    #[test]
    fn hidden_output_is_one_step_wide() {
        let device = Default::default();
        let model = LstmModel::<TestBackend>::new(&small_config(), &device);
        let surrogate = model.hidden_output(&model.init_hidden(3));
        assert_eq!(surrogate.dims(), [3, 1, 5]);
    }

    #[test]
    fn eval_disables_dropout_on_autodiff_backend() {
        type AutodiffBackend = burn_autodiff::Autodiff<TestBackend>;
        let device = Default::default();
        let config = LstmModelConfig {
            dropout: 0.5,
            ..small_config()
        };
        let model = LstmModel::<AutodiffBackend>::new(&config, &device).eval();
        let run = || {
            let inputs = Tensor::<AutodiffBackend, 2, Int>::from_data(
                TensorData::new(vec![1i64, 2, 3, 4, 5, 6], [2, 3]),
                &device,
            );
            model
                .forward(inputs, model.init_hidden(2))
                .0
                .into_data()
                .convert::<f32>()
                .into_vec::<f32>()
                .expect("float data")
        };
        assert_eq!(run(), run());
    }
}
