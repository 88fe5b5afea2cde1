use rand::Rng;
use tracing::warn;

use crate::config::CorruptionConfig;
use crate::error::{LmError, Result};

use super::{StreamProvider, TokenStreams};

/// Injects substitution noise into the input side of a stream pair.
///
/// Each input position is independently replaced, with probability
/// `substitution_rate`, by an id drawn uniformly from `[0, substitution_range)`.
/// Targets are never touched, so the model learns to predict the true next
/// token from a corrupted context. Every call to [`provide`](StreamProvider::provide)
/// draws fresh noise from the owned random source.
pub struct Corruptor<R> {
    streams: TokenStreams,
    substitution_rate: f64,
    substitution_range: i64,
    rng: R,
}

impl<R: Rng> Corruptor<R> {
    pub fn new(
        streams: TokenStreams,
        substitution_rate: f64,
        substitution_range: u32,
        rng: R,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&substitution_rate) {
            return Err(LmError::InvalidConfig(format!(
                "substitution_rate must lie in [0, 1], got {substitution_rate}"
            )));
        }
        if substitution_range == 0 {
            return Err(LmError::InvalidConfig(
                "substitution_range must be positive".to_string(),
            ));
        }

        Ok(Self {
            streams,
            substitution_rate,
            substitution_range: i64::from(substitution_range),
            rng,
        })
    }

    /// Build from config; an unset substitution range falls back to `vocab_size`.
    pub fn from_config(
        streams: TokenStreams,
        config: &CorruptionConfig,
        vocab_size: usize,
        rng: R,
    ) -> Result<Self> {
        config.validate()?;
        if config.deletion_rate > 0.0 {
            warn!(
                "deletion_rate={} is accepted but ignored; only substitution noise is applied",
                config.deletion_rate
            );
        }

        let range = match config.substitution_range {
            Some(range) => range,
            None => u32::try_from(vocab_size).map_err(|_| {
                LmError::InvalidConfig(format!("vocabulary size {vocab_size} exceeds u32"))
            })?,
        };
        Self::new(streams, config.substitution_rate, range, rng)
    }
}

impl<R: Rng> StreamProvider for Corruptor<R> {
    fn provide(&mut self) -> TokenStreams {
        let Self {
            streams,
            substitution_rate,
            substitution_range,
            rng,
        } = self;

        let inputs = streams
            .inputs()
            .iter()
            .map(|&token| {
                if rng.gen_bool(*substitution_rate) {
                    rng.gen_range(0..*substitution_range)
                } else {
                    token
                }
            })
            .collect();

        TokenStreams {
            inputs,
            targets: streams.targets().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn streams(len: usize) -> TokenStreams {
        let stream: Vec<i64> = (0..=len as i64).map(|idx| 100 + idx % 17).collect();
        TokenStreams::from_stream(&stream)
    }

    #[test]
    fn zero_rate_is_identity() {
        let original = streams(200);
        let mut corruptor =
            Corruptor::new(original.clone(), 0.0, 5, StdRng::seed_from_u64(1)).expect("corruptor");
        assert_eq!(corruptor.provide(), original);
    }

    #[test]
    fn full_rate_replaces_every_input_within_range() {
        let original = streams(1000);
        let mut corruptor =
            Corruptor::new(original.clone(), 1.0, 5, StdRng::seed_from_u64(2)).expect("corruptor");
        let corrupted = corruptor.provide();

        assert_eq!(corrupted.targets(), original.targets());
        assert_eq!(corrupted.len(), 1000);
        assert!(corrupted.inputs().iter().all(|&id| (0..5).contains(&id)));
    }

    #[test]
    fn same_seed_reproduces_corruption() {
        let original = streams(300);
        let mut first =
            Corruptor::new(original.clone(), 0.3, 9, StdRng::seed_from_u64(3)).expect("corruptor");
        let mut second =
            Corruptor::new(original, 0.3, 9, StdRng::seed_from_u64(3)).expect("corruptor");
        assert_eq!(first.provide(), second.provide());
    }

    #[test]
    fn repeated_calls_draw_fresh_noise() {
        let mut corruptor =
            Corruptor::new(streams(500), 0.5, 50, StdRng::seed_from_u64(4)).expect("corruptor");
        let first = corruptor.provide();
        let second = corruptor.provide();
        assert_ne!(first.inputs(), second.inputs());
        assert_eq!(first.targets(), second.targets());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(Corruptor::new(streams(10), 1.2, 5, StdRng::seed_from_u64(0)).is_err());
        assert!(Corruptor::new(streams(10), 0.2, 0, StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn config_range_defaults_to_vocab_size() {
        let config = CorruptionConfig {
            substitution_rate: 1.0,
            deletion_rate: 0.4,
            ..CorruptionConfig::default()
        };
        let mut corruptor =
            Corruptor::from_config(streams(100), &config, 3, StdRng::seed_from_u64(5))
                .expect("corruptor");
        assert!(corruptor.provide().inputs().iter().all(|&id| (0..3).contains(&id)));
    }
}
