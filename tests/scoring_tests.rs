use std::sync::Arc;

use approx::assert_relative_eq;
use burn::tensor::backend::Backend as BackendTrait;
use burn::tensor::{Int, Tensor, TensorData};
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use burn_tbptt_lm::scoring::MaskedBatch;
use burn_tbptt_lm::{
    LanguageModel, LmError, LstmModel, LstmModelConfig, RecurrentState, RnnLm, RnnLmConfig,
    SequenceModel, SoftmaxDecoder, SoftmaxDecoderConfig, TokenVocab, TokenizerKind, Vocabulary,
};

type TestBackend = NdArray<f32>;
type Scorer = LanguageModel<TestBackend, LstmModel<TestBackend>, SoftmaxDecoder<TestBackend>>;

const CORPUS: &str = "the cat sat on the mat\na dog ran to the cat";

fn scorer_config(vocab_size: usize, dropout: f64) -> RnnLmConfig {
    RnnLmConfig {
        model: LstmModelConfig {
            vocab_size,
            d_embed: 8,
            d_hidden: 12,
            n_layers: 2,
            dropout,
        },
        decoder: SoftmaxDecoderConfig {
            d_input: 12,
            vocab_size,
            label_smoothing: 0.2,
        },
    }
}

fn scorer() -> Scorer {
    let device = <TestBackend as BackendTrait>::Device::default();
    TestBackend::seed(&device, 42);

    let vocab = TokenVocab::fit(CORPUS.lines(), TokenizerKind::Word, true);
    let config = scorer_config(vocab.len(), 0.3);
    RnnLm::<TestBackend>::new(&config, &device).into_scorer(Arc::new(vocab))
}

fn words(sentence: &str) -> Vec<&str> {
    sentence.split_whitespace().collect()
}

fn values(tensor: Tensor<TestBackend, 2>) -> Vec<f32> {
    tensor
        .into_data()
        .convert::<f32>()
        .into_vec::<f32>()
        .expect("float data")
}

fn hidden_values(hidden: &RecurrentState<TestBackend>) -> Vec<f32> {
    hidden
        .layers()
        .iter()
        .flat_map(|layer| {
            values(layer.hidden.clone())
                .into_iter()
                .chain(values(layer.cell.clone()))
        })
        .collect()
}

#[test]
fn batch_scores_match_single_sentence_scores() {
    let scorer = scorer();
    let sentences = vec![
        words("the cat sat on the mat </s>"),
        words("a dog"),
        words("cat"),
        words("the dog ran to the mat </s>"),
    ];

    let batch = scorer.batch_nll(&sentences, None).expect("batch");
    assert_eq!(batch.len(), sentences.len());

    for (sentence, batched) in sentences.iter().zip(&batch) {
        let single = scorer.single_sentence_nll(sentence, None).expect("single");
        assert!(single > 0.0);
        assert_relative_eq!(single, *batched, max_relative = 1e-4);
    }
}

#[test]
fn prefixed_batch_scores_match_single_sentence_scores() {
    let scorer = scorer();
    let sentences = vec![words("the cat"), words("dog ran to the mat"), words("on")];

    let batch = scorer.batch_nll(&sentences, Some("</s>")).expect("batch");
    for (sentence, batched) in sentences.iter().zip(&batch) {
        let single = scorer
            .single_sentence_nll(sentence, Some("</s>"))
            .expect("single");
        assert_relative_eq!(single, *batched, max_relative = 1e-4);
    }
}

#[test]
fn empty_prefix_is_treated_as_no_prefix() {
    let scorer = scorer();
    let sentence = words("a cat sat");
    let without = scorer.single_sentence_nll(&sentence, None).expect("none");
    let empty = scorer.single_sentence_nll(&sentence, Some("")).expect("empty");
    assert_eq!(without, empty);

    let batch = scorer
        .batch_nll(&[sentence.clone()], Some(""))
        .expect("batch");
    assert_relative_eq!(batch[0], without, max_relative = 1e-4);
}

#[test]
fn padding_values_do_not_change_scores() {
    let scorer = scorer();
    let device = scorer.device();
    let sequences = vec![vec![1u32, 2, 3, 4, 5], vec![6, 7], vec![8]];

    let with_zero = MaskedBatch::from_sequences_with_padding(&sequences, 0, &device).expect("pad 0");
    let with_seven =
        MaskedBatch::from_sequences_with_padding(&sequences, 7, &device).expect("pad 7");

    for predict_first in [true, false] {
        let a = values(scorer.masked_nll(with_zero.clone(), predict_first));
        let b = values(scorer.masked_nll(with_seven.clone(), predict_first));
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_relative_eq!(*x, *y, max_relative = 1e-5);
        }
    }
}

#[test]
fn padding_id_outside_the_vocabulary_is_never_looked_up() {
    let scorer = scorer();
    let device = scorer.device();
    let sequences = vec![vec![1u32, 2, 3, 4], vec![5]];

    let with_zero = MaskedBatch::from_sequences_with_padding(&sequences, 0, &device).expect("pad 0");
    let out_of_vocab = MaskedBatch::from_sequences_with_padding(&sequences, 1_000_000, &device)
        .expect("large pad");
    let negative = MaskedBatch::from_sequences_with_padding(&sequences, -1, &device)
        .expect("negative pad");

    for predict_first in [true, false] {
        let expected = values(scorer.masked_nll(with_zero.clone(), predict_first));
        for padded in [&out_of_vocab, &negative] {
            let actual = values(scorer.masked_nll(padded.clone(), predict_first));
            assert_eq!(actual.len(), expected.len());
            for (x, y) in actual.iter().zip(&expected) {
                assert_relative_eq!(*x, *y, max_relative = 1e-5);
            }
        }
    }
}

#[test]
fn autodiff_scorer_is_deterministic_despite_dropout() {
    type AutodiffBackend = Autodiff<TestBackend>;
    let device = <AutodiffBackend as BackendTrait>::Device::default();
    AutodiffBackend::seed(&device, 9);

    let vocab = TokenVocab::fit(CORPUS.lines(), TokenizerKind::Word, true);
    let config = scorer_config(vocab.len(), 0.5);
    let scorer = RnnLm::<AutodiffBackend>::new(&config, &device).into_scorer(Arc::new(vocab));

    let sentence = words("the cat sat on the mat </s>");
    let first = scorer.single_sentence_nll(&sentence, None).expect("first");
    let second = scorer.single_sentence_nll(&sentence, None).expect("second");
    assert_eq!(first, second);

    let batch = scorer
        .batch_nll(&[sentence.clone(), words("a dog")], None)
        .expect("batch");
    assert_relative_eq!(batch[0], first, max_relative = 1e-4);
}

#[test]
fn padded_positions_are_exactly_zero() {
    let scorer = scorer();
    let nll = scorer
        .batch_nll_idxs(&[vec![1u32, 2, 3, 4], vec![5]], true)
        .expect("nll");
    assert_eq!(nll.dims(), [2, 4]);

    let values = values(nll);
    assert!(values[..4].iter().all(|&v| v > 0.0));
    assert!(values[4] > 0.0, "first token is always scored");
    assert_eq!(&values[5..], &[0.0, 0.0, 0.0]);
}

#[test]
fn shared_prefix_only_scores_continuations() {
    let scorer = scorer();
    let nll = scorer
        .batch_nll_idxs(&[vec![0u32, 3, 4], vec![0]], false)
        .expect("nll");
    assert_eq!(nll.dims(), [2, 2]);
    assert_eq!(&values(nll)[2..], &[0.0, 0.0]);

    let empty = scorer
        .single_sentence_nll::<&str>(&[], Some("</s>"))
        .expect("prefix only");
    assert_eq!(empty, 0.0);
}

#[test]
fn empty_inputs_are_rejected_or_empty() {
    let scorer = scorer();
    let none: Vec<Vec<&str>> = Vec::new();
    assert!(scorer.batch_nll(&none, None).expect("empty batch").is_empty());

    let err = scorer
        .single_sentence_nll::<&str>(&[], None)
        .expect_err("nothing to score");
    assert!(matches!(err, LmError::EmptySequence { index: 0 }));

    let err = scorer
        .batch_nll(&[words("the cat"), Vec::new()], None)
        .expect_err("second sentence is empty");
    assert!(matches!(err, LmError::EmptySequence { index: 1 }));

    let none: Vec<Vec<u32>> = Vec::new();
    let err = scorer.batch_nll_idxs(&none, true).expect_err("no rows");
    assert!(matches!(err, LmError::EmptyBatch));
}

#[test]
fn unknown_tokens_are_reported() {
    let scorer = scorer();
    let err = scorer
        .batch_nll(&[words("the zebra")], None)
        .expect_err("zebra is unseen");
    assert!(matches!(err, LmError::UnknownToken(ref token) if token == "zebra"));

    let err = scorer
        .single_sentence_nll(&words("the cat"), Some("<bos>"))
        .expect_err("prefix is unseen");
    assert!(matches!(err, LmError::UnknownToken(ref token) if token == "<bos>"));

    assert!(scorer.custom_h0_provider(&["unicorn"]).is_err());
}

#[test]
fn empty_prefix_provider_matches_default_initial_state() {
    let scorer = scorer();
    let provider = scorer.custom_h0_provider::<&str>(&[]).expect("provider");
    assert!(!provider.is_prefixed());

    for batch_size in [1, 3, 8] {
        let provided = provider.provide(batch_size);
        let default = scorer.model().init_hidden(batch_size);
        assert_eq!(provided.batch_size(), batch_size);
        assert_eq!(hidden_values(&provided), hidden_values(&default));
    }
}

#[test]
fn prefix_provider_replicates_the_prefix_state() {
    let scorer = scorer();
    let prefix = ["the", "cat"];
    let provider = scorer.custom_h0_provider(&prefix).expect("provider");
    assert!(provider.is_prefixed());

    let device = scorer.device();
    let ids: Vec<i64> = prefix
        .iter()
        .map(|token| i64::from(scorer.vocab().lookup(token).expect("known")))
        .collect();
    let inputs = Tensor::<TestBackend, 2, Int>::from_data(TensorData::new(ids, [1, 2]), &device);
    let (_, expected) = scorer
        .model()
        .forward(inputs, scorer.model().init_hidden(1));
    let expected = hidden_values(&expected);

    let provided = provider.provide(3);
    assert_eq!(provided.batch_size(), 3);
    for layer in provided.layers() {
        let rows = values(layer.hidden.clone());
        let width = rows.len() / 3;
        for (idx, value) in rows.iter().enumerate() {
            assert_relative_eq!(*value, rows[idx % width], max_relative = 1e-6);
        }
    }

    let single = hidden_values(&provider.provide(1));
    for (a, b) in single.iter().zip(&expected) {
        assert_relative_eq!(*a, *b, max_relative = 1e-5);
    }
}
