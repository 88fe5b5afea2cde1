#![recursion_limit = "256"]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use burn::grad_clipping::GradientClippingConfig;
use burn::module::{AutodiffModule, Module};
use burn::optim::AdamWConfig;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::{AutodiffBackend, Backend as BackendTrait};
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
#[cfg(feature = "wgpu")]
use burn_wgpu::Wgpu;
use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use burn_tbptt_lm::{
    Corruptor, LazyBatcher, RnnLm, RnnLmConfig, TokenStreams, TokenVocab, TrainingConfig,
    Vocabulary, WindowSplitter, build_model_config, evaluate, load_training_config, train_epoch,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Train a recurrent language model with truncated BPTT")]
struct Cli {
    /// Additional configuration files applied in order (later files override earlier ones).
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Vec<PathBuf>,
    /// Backend to use for training.
    #[arg(long, value_enum, default_value_t = BackendArg::Ndarray)]
    backend: BackendArg,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BackendArg {
    Ndarray,
    #[cfg(feature = "wgpu")]
    Wgpu,
}

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("burn_tbptt_lm=info,train=info")),
        )
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Cli::parse();

    let mut config_paths = vec![PathBuf::from("config/base.toml")];
    config_paths.extend(args.config);
    let config = load_training_config(&config_paths)?;

    let corpus = Corpus::load(&config)?;

    match args.backend {
        BackendArg::Ndarray => train_backend::<Autodiff<NdArray<f32>>>(&config, &corpus, "ndarray"),
        #[cfg(feature = "wgpu")]
        BackendArg::Wgpu => train_backend::<Autodiff<Wgpu<f32>>>(&config, &corpus, "wgpu"),
    }
}

/// Tokenized training and validation streams with the vocabulary fit on them.
struct Corpus {
    vocab: TokenVocab,
    train: Vec<i64>,
    valid: Option<Vec<i64>>,
}

impl Corpus {
    fn load(config: &TrainingConfig) -> Result<Self> {
        let dataset = &config.dataset;
        let train_text = read_text(&dataset.train_path)?;
        let valid_text = dataset.valid_path.as_deref().map(read_text).transpose()?;

        let lines = train_text
            .lines()
            .chain(valid_text.iter().flat_map(|text| text.lines()));
        let vocab = TokenVocab::fit(lines, dataset.tokenizer, dataset.add_eos);
        info!(
            "built {} vocabulary with {} tokens from {}",
            dataset.tokenizer.name(),
            vocab.len(),
            dataset.train_path.display()
        );

        let train = encode(&vocab, &train_text)?;
        let valid = valid_text
            .as_deref()
            .map(|text| encode(&vocab, text))
            .transpose()?;
        info!(
            "train stream: {} tokens, valid stream: {} tokens",
            train.len(),
            valid.as_ref().map_or(0, Vec::len)
        );

        Ok(Self {
            vocab,
            train,
            valid,
        })
    }
}

fn train_backend<B>(config: &TrainingConfig, corpus: &Corpus, backend_name: &str) -> Result<()>
where
    B: AutodiffBackend,
{
    let device = B::Device::default();
    let training = &config.training;
    let pipeline = &config.pipeline;
    B::seed(&device, training.seed);

    let model_config = build_model_config(&config.model, corpus.vocab.len());
    let mut lm = RnnLm::<B>::new(&model_config, &device);

    let rng = StdRng::seed_from_u64(pipeline.corruption.seed.unwrap_or(training.seed));
    let corruptor = Corruptor::from_config(
        TokenStreams::from_stream(&corpus.train),
        &pipeline.corruption,
        corpus.vocab.len(),
        rng,
    )?;
    let batcher = LazyBatcher::<B, _>::new(pipeline.batch_size, corruptor, &device)?;
    let mut train_splitter = WindowSplitter::new(pipeline.target_seq_len, batcher)?;

    let mut valid_splitter = match &corpus.valid {
        Some(stream) => {
            let batcher = LazyBatcher::<B::InnerBackend, _>::new(
                pipeline.batch_size,
                TokenStreams::from_stream(stream),
                &device,
            )?;
            Some(WindowSplitter::new(pipeline.target_seq_len, batcher)?)
        }
        None => None,
    };

    let optimizer_cfg = &config.optimizer;
    let mut optimizer = AdamWConfig::new()
        .with_weight_decay(optimizer_cfg.weight_decay)
        .with_grad_clipping(optimizer_cfg.grad_clip.map(GradientClippingConfig::Norm))
        .init::<B, RnnLm<B>>();

    info!(
        "training on {backend_name}: epochs={}, batch_size={}, target_seq_len={}, substitution_rate={}",
        training.epochs,
        pipeline.batch_size,
        pipeline.target_seq_len,
        pipeline.corruption.substitution_rate
    );

    for epoch in 1..=training.epochs {
        let (trained, stats) = train_epoch(
            lm,
            &mut optimizer,
            &mut train_splitter,
            optimizer_cfg.learning_rate,
            training.log_frequency,
        )?;
        lm = trained;
        info!(
            "epoch {epoch}: train loss {:.4} ppl {:.2} over {} windows",
            stats.mean_loss(),
            stats.perplexity(),
            stats.windows
        );

        if let Some(splitter) = valid_splitter.as_mut() {
            let stats = evaluate(&lm.valid(), splitter)?;
            info!(
                "epoch {epoch}: valid loss {:.4} ppl {:.2}",
                stats.mean_loss(),
                stats.perplexity()
            );
        }
    }

    save_run(&training.run_dir, &corpus.vocab, &model_config, lm.valid())?;
    info!("training complete on {backend_name}; run saved to {}", training.run_dir.display());
    Ok(())
}

fn save_run<B: BackendTrait>(
    run_dir: &Path,
    vocab: &TokenVocab,
    model_config: &RnnLmConfig,
    lm: RnnLm<B>,
) -> Result<()> {
    fs::create_dir_all(run_dir)
        .with_context(|| format!("failed to create run directory {}", run_dir.display()))?;

    vocab.save(run_dir.join("vocab.json"))?;

    let payload =
        serde_json::to_string_pretty(model_config).context("failed to serialize model config")?;
    let config_path = run_dir.join("config.json");
    fs::write(&config_path, payload)
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    lm.save_file(
        run_dir.join("model"),
        &BinFileRecorder::<FullPrecisionSettings>::new(),
    )
    .map_err(|err| anyhow!("failed to save model record: {err}"))?;
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read corpus {}", path.display()))
}

fn encode(vocab: &TokenVocab, text: &str) -> Result<Vec<i64>> {
    Ok(vocab
        .encode_text(text)?
        .into_iter()
        .map(i64::from)
        .collect())
}
