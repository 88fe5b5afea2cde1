#![recursion_limit = "256"]

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend as BackendTrait;
use burn_ndarray::NdArray;
#[cfg(feature = "wgpu")]
use burn_wgpu::Wgpu;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use burn_tbptt_lm::tokenizer::EOS_TOKEN;
use burn_tbptt_lm::{RnnLm, RnnLmConfig, TokenVocab};

#[derive(Parser, Debug)]
#[command(author, version, about = "Score sentences with a trained recurrent language model")]
struct Cli {
    /// Run directory written by `train` (vocab.json, config.json, model.bin).
    #[arg(long, value_name = "DIR", default_value = "runs/lstm")]
    run_dir: PathBuf,
    /// File with one sentence per line; reads stdin when omitted.
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,
    /// Token every sentence is conditioned on instead of scoring its first token.
    #[arg(long)]
    prefix: Option<String>,
    /// Sentences scored per batch.
    #[arg(long, default_value_t = 64)]
    batch_size: usize,
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
                .unwrap_or_else(|_| EnvFilter::new("burn_tbptt_lm=info,score=info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Cli::parse();
    if args.batch_size == 0 {
        return Err(anyhow!("--batch-size must be positive"));
    }

    match args.backend {
        BackendArg::Ndarray => score_backend::<NdArray<f32>>(&args),
        #[cfg(feature = "wgpu")]
        BackendArg::Wgpu => score_backend::<Wgpu<f32>>(&args),
    }
}

fn score_backend<B: BackendTrait>(args: &Cli) -> Result<()> {
    let device = B::Device::default();
    let vocab = TokenVocab::load(args.run_dir.join("vocab.json"))?;
    let model_config = load_model_config(&args.run_dir.join("config.json"))?;

    let lm = RnnLm::<B>::new(&model_config, &device)
        .load_file(
            args.run_dir.join("model"),
            &BinFileRecorder::<FullPrecisionSettings>::new(),
            &device,
        )
        .map_err(|err| anyhow!("failed to load model record: {err}"))?;
    let kind = vocab.kind();
    let close_with_eos = vocab.eos().is_some();
    let scorer = lm.into_scorer(Arc::new(vocab));
    info!("loaded model from {}", args.run_dir.display());

    let text = read_input(args.input.as_deref())?;
    let sentences: Vec<Vec<String>> = text
        .lines()
        .map(|line| kind.split(line))
        .filter(|tokens| !tokens.is_empty())
        .map(|mut tokens| {
            if close_with_eos {
                tokens.push(EOS_TOKEN.to_string());
            }
            tokens
        })
        .collect();

    let mut total_nll = 0.0f64;
    let mut total_tokens = 0usize;
    for chunk in sentences.chunks(args.batch_size) {
        let scores = scorer.batch_nll(chunk, args.prefix.as_deref())?;
        for (sentence, nll) in chunk.iter().zip(scores) {
            println!("{nll:.4}\t{}", sentence.join(" "));
            total_nll += f64::from(nll);
            total_tokens += sentence.len();
        }
    }

    if total_tokens > 0 {
        let mean = total_nll / total_tokens as f64;
        info!(
            "scored {} sentences, {total_tokens} tokens: nll/token {mean:.4} ppl {:.2}",
            sentences.len(),
            mean.exp()
        );
    }
    Ok(())
}

fn load_model_config(path: &Path) -> Result<RnnLmConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}
