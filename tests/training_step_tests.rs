use burn::module::AutodiffModule;
use burn::optim::{AdamWConfig, LearningRate};
use burn::tensor::backend::Backend as BackendTrait;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use burn_tbptt_lm::{
    Corruptor, LazyBatcher, ModelOverrides, RnnLm, TokenStreams, TokenVocab, TokenizerKind,
    Vocabulary, WindowSplitter, build_model_config, evaluate, train_epoch,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

type Backend = Autodiff<NdArray<f32>>;
type Inner = NdArray<f32>;

const TEXT: &str = "the quick brown fox jumps over the lazy dog\n\
                    the lazy dog sleeps while the quick fox runs\n";

fn corpus() -> (TokenVocab, Vec<i64>) {
    let text = TEXT.repeat(8);
    let vocab = TokenVocab::fit(text.lines(), TokenizerKind::Word, true);
    let stream = vocab
        .encode_text(&text)
        .expect("encode")
        .into_iter()
        .map(i64::from)
        .collect();
    (vocab, stream)
}

fn small_model(vocab_size: usize, device: &<Backend as BackendTrait>::Device) -> RnnLm<Backend> {
    let overrides = ModelOverrides {
        d_embed: Some(16),
        d_hidden: Some(16),
        n_layers: Some(2),
        dropout: Some(0.1),
        label_smoothing: Some(0.1),
    };
    RnnLm::new(&build_model_config(&overrides, vocab_size), device)
}

#[test]
fn one_epoch_visits_every_window_with_finite_loss() {
    let device = <Backend as BackendTrait>::Device::default();
    <Backend as BackendTrait>::seed(&device, 123);
    let (vocab, stream) = corpus();

    let corruptor = Corruptor::new(
        TokenStreams::from_stream(&stream),
        0.1,
        vocab.len() as u32,
        StdRng::seed_from_u64(3),
    )
    .expect("corruptor");
    let batcher = LazyBatcher::<Backend, _>::new(4, corruptor, &device).expect("batcher");
    let mut splitter = WindowSplitter::new(7, batcher).expect("splitter");
    let expected_windows = splitter.iter().len();
    assert!(expected_windows > 1);

    let lm = small_model(vocab.len(), &device);
    let mut optimizer = AdamWConfig::new()
        .with_weight_decay(0.01)
        .init::<Backend, RnnLm<Backend>>();
    let lr: LearningRate = 1e-2;

    let (_lm, stats) = train_epoch(lm, &mut optimizer, &mut splitter, lr, 2).expect("epoch");
    assert_eq!(stats.windows, expected_windows);
    assert_eq!(stats.tokens, (stream.len() - 1) / 4 * 4);
    assert!(stats.mean_loss().is_finite());
    assert!(stats.mean_loss() > 0.0);
}

#[test]
fn training_lowers_clean_validation_loss() {
    let device = <Backend as BackendTrait>::Device::default();
    <Backend as BackendTrait>::seed(&device, 7);
    let (vocab, stream) = corpus();

    let batcher =
        LazyBatcher::<Backend, _>::new(4, TokenStreams::from_stream(&stream), &device)
            .expect("batcher");
    let mut train_splitter = WindowSplitter::new(8, batcher).expect("splitter");

    let valid_batcher =
        LazyBatcher::<Inner, _>::new(4, TokenStreams::from_stream(&stream), &device)
            .expect("valid batcher");
    let mut valid_splitter = WindowSplitter::new(8, valid_batcher).expect("valid splitter");

    let mut lm = small_model(vocab.len(), &device);
    let mut optimizer = AdamWConfig::new().init::<Backend, RnnLm<Backend>>();

    let before = evaluate(&lm.valid(), &mut valid_splitter).expect("evaluate");
    for _ in 0..5 {
        let (trained, _) =
            train_epoch(lm, &mut optimizer, &mut train_splitter, 1e-2, 0).expect("epoch");
        lm = trained;
    }
    let after = evaluate(&lm.valid(), &mut valid_splitter).expect("evaluate");

    assert_eq!(before.tokens, after.tokens);
    assert!(
        after.mean_loss() < before.mean_loss(),
        "validation loss {} did not improve on {}",
        after.mean_loss(),
        before.mean_loss()
    );
}
