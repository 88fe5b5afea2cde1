use burn::module::{
    AutodiffModule, Content, Devices, Module, ModuleDisplay, ModuleDisplayDefault, ModuleMapper,
    ModuleVisitor,
};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Int, Tensor, activation};

use super::config::SoftmaxDecoderConfig;
use super::{Decoder, DecoderMode};

/// Non-trainable decoder settings carried inside the module tree.
#[derive(Clone, Debug)]
pub struct DecoderSettings {
    pub label_smoothing: f32,
    pub mode: DecoderMode,
}

impl DecoderSettings {
    /// Smoothing factor in effect for the current mode.
    pub fn active_smoothing(&self) -> f32 {
        match self.mode {
            DecoderMode::Train => self.label_smoothing,
            DecoderMode::Eval => 0.0,
        }
    }
}

impl<B: Backend> Module<B> for DecoderSettings {
    type Record = ();

    fn collect_devices(&self, devices: Devices<B>) -> Devices<B> {
        devices
    }

    fn fork(self, _device: &B::Device) -> Self {
        self
    }

    fn to_device(self, _device: &B::Device) -> Self {
        self
    }

    fn visit<Visitor: ModuleVisitor<B>>(&self, _visitor: &mut Visitor) {}

    fn map<Mapper: ModuleMapper<B>>(self, _mapper: &mut Mapper) -> Self {
        self
    }

    fn load_record(self, _record: Self::Record) -> Self {
        self
    }

    fn into_record(self) -> Self::Record {}
}

impl<B: AutodiffBackend> AutodiffModule<B> for DecoderSettings {
    type InnerModule = DecoderSettings;

    fn valid(&self) -> Self::InnerModule {
        self.clone()
    }
}

impl ModuleDisplayDefault for DecoderSettings {
    fn content(&self, content: Content) -> Option<Content> {
        let summary = format!(
            "label_smoothing={}, mode={:?}",
            self.label_smoothing, self.mode
        );

        content
            .set_top_level_type("DecoderSettings")
            .add_formatted(&summary)
            .optional()
    }
}

impl ModuleDisplay for DecoderSettings {}

/// Full-softmax output layer: a linear projection to vocabulary logits.
#[derive(Module, Debug)]
pub struct SoftmaxDecoder<B: Backend> {
    projection: Linear<B>,
    settings: DecoderSettings,
}

impl<B: Backend> SoftmaxDecoder<B> {
    pub fn new(config: &SoftmaxDecoderConfig, device: &B::Device) -> Self {
        Self {
            projection: LinearConfig::new(config.d_input, config.vocab_size).init(device),
            settings: DecoderSettings {
                label_smoothing: config.label_smoothing,
                mode: DecoderMode::Train,
            },
        }
    }

    pub fn settings(&self) -> &DecoderSettings {
        &self.settings
    }

    fn log_probs(&self, outputs: Tensor<B, 3>) -> Tensor<B, 3> {
        activation::log_softmax(self.projection.forward(outputs), 2)
    }
}

impl<B: Backend> Decoder<B> for SoftmaxDecoder<B> {
    fn forward(&self, outputs: Tensor<B, 3>) -> Tensor<B, 3> {
        self.projection.forward(outputs)
    }

    fn neg_log_prob(
        &self,
        outputs: Tensor<B, 3>,
        targets: Tensor<B, 2, Int>,
    ) -> (Tensor<B, 1>, usize) {
        let [batch, time] = targets.dims();
        let log_probs = self.log_probs(outputs);
        let nll = log_probs
            .clone()
            .gather(2, targets.reshape([batch, time, 1]))
            .neg();

        let smoothing = self.settings.active_smoothing();
        let per_token = if smoothing > 0.0 {
            let uniform = log_probs.mean_dim(2).neg();
            nll.mul_scalar(1.0 - smoothing)
                .add(uniform.mul_scalar(smoothing))
        } else {
            nll
        };

        (per_token.sum(), batch * time)
    }

    fn neg_log_prob_raw(
        &self,
        outputs: Tensor<B, 3>,
        targets: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let [batch, time] = targets.dims();
        self.log_probs(outputs)
            .gather(2, targets.reshape([batch, time, 1]))
            .reshape([batch, time])
            .neg()
    }

    fn mode(&self) -> DecoderMode {
        self.settings.mode
    }

    fn with_mode(mut self, mode: DecoderMode) -> Self {
        self.settings.mode = mode;
        self
    }
}
