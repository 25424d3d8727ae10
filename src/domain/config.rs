// ============================================================
// Layer 3 — Model Configuration
// ============================================================
// Three shapes of the same hyperparameters:
//
//   ModelOverrides — what the caller passes; every field optional
//   DefaultConfig  — the process-wide fallback (see defaults.rs)
//   ModelConfig    — the fully resolved, validated, immutable result
//
// Resolution happens once, when the model facade is constructed,
// never lazily at build time. A missing vocab_size is a
// configuration error; an unknown cell kind or an out-of-range
// number is a validation error.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::defaults::DefaultConfig;
use crate::domain::error::{CaptionError, CaptionResult};

// ─── RnnCellKind ──────────────────────────────────────────────────────────────
/// The recurrent cell used by the decoder. Bidirectionality is a separate flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RnnCellKind {
    Gru,
    Lstm,
}

impl FromStr for RnnCellKind {
    type Err = CaptionError;

    /// Case-sensitive: only "gru" and "lstm" are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gru"  => Ok(Self::Gru),
            "lstm" => Ok(Self::Lstm),
            other  => Err(CaptionError::validation(
                "rnn_cell_kind",
                format!("must be either \"gru\" or \"lstm\", got \"{other}\""),
            )),
        }
    }
}

impl fmt::Display for RnnCellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gru  => write!(f, "gru"),
            Self::Lstm => write!(f, "lstm"),
        }
    }
}

// ─── ModelOverrides ───────────────────────────────────────────────────────────
/// Constructor arguments. `None` means "take it from the default configuration".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOverrides {
    pub learning_rate:       Option<f64>,
    pub vocab_size:          Option<usize>,
    pub embedding_size:      Option<usize>,
    pub rnn_hidden_size:     Option<usize>,
    pub dropout_rate:        Option<f64>,
    pub bidirectional:       Option<bool>,
    pub rnn_cell_kind:       Option<String>,
    pub image_feature_width: Option<usize>,
}

impl ModelOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_learning_rate(mut self, value: f64) -> Self {
        self.learning_rate = Some(value);
        self
    }

    pub fn with_vocab_size(mut self, value: usize) -> Self {
        self.vocab_size = Some(value);
        self
    }

    pub fn with_embedding_size(mut self, value: usize) -> Self {
        self.embedding_size = Some(value);
        self
    }

    pub fn with_rnn_hidden_size(mut self, value: usize) -> Self {
        self.rnn_hidden_size = Some(value);
        self
    }

    pub fn with_dropout_rate(mut self, value: f64) -> Self {
        self.dropout_rate = Some(value);
        self
    }

    pub fn with_bidirectional(mut self, value: bool) -> Self {
        self.bidirectional = Some(value);
        self
    }

    pub fn with_rnn_cell_kind(mut self, value: impl Into<String>) -> Self {
        self.rnn_cell_kind = Some(value.into());
        self
    }

    pub fn with_image_feature_width(mut self, value: usize) -> Self {
        self.image_feature_width = Some(value);
        self
    }
}

// ─── ModelConfig ──────────────────────────────────────────────────────────────
/// Resolved hyperparameters. Built by [`ModelConfig::resolve`]; a copy read
/// back from disk must go through [`ModelConfig::validate`] before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub learning_rate:       f64,
    pub vocab_size:          usize,
    pub embedding_size:      usize,
    pub rnn_hidden_size:     usize,
    pub dropout_rate:        f64,
    pub bidirectional:       bool,
    pub rnn_cell_kind:       RnnCellKind,
    pub image_feature_width: usize,
}

impl ModelConfig {
    /// Fill every unset override from `defaults`, then validate.
    pub fn resolve(overrides: ModelOverrides, defaults: &DefaultConfig) -> CaptionResult<Self> {
        let vocab_size = overrides.vocab_size.or(defaults.vocab_size).ok_or_else(|| {
            CaptionError::Configuration(
                "vocab_size cannot be None: set it in the active default \
                 configuration or pass it explicitly"
                    .to_string(),
            )
        })?;

        let cell_name = overrides
            .rnn_cell_kind
            .as_deref()
            .unwrap_or(&defaults.rnn_cell_kind);
        let rnn_cell_kind = cell_name.parse::<RnnCellKind>()?;

        let config = Self {
            learning_rate:       overrides.learning_rate.unwrap_or(defaults.learning_rate),
            vocab_size,
            embedding_size:      overrides.embedding_size.unwrap_or(defaults.embedding_size),
            rnn_hidden_size:     overrides.rnn_hidden_size.unwrap_or(defaults.rnn_hidden_size),
            dropout_rate:        overrides.dropout_rate.unwrap_or(defaults.dropout_rate),
            bidirectional:       overrides.bidirectional.unwrap_or(defaults.bidirectional),
            rnn_cell_kind,
            image_feature_width: overrides
                .image_feature_width
                .unwrap_or(defaults.image_feature_width),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CaptionResult<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(CaptionError::validation(
                "learning_rate",
                format!("must be a positive finite number, got {}", self.learning_rate),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(CaptionError::validation(
                "dropout_rate",
                format!("must be in [0, 1), got {}", self.dropout_rate),
            ));
        }
        for (field, value) in [
            ("vocab_size",          self.vocab_size),
            ("embedding_size",      self.embedding_size),
            ("rnn_hidden_size",     self.rnn_hidden_size),
            ("image_feature_width", self.image_feature_width),
        ] {
            if value == 0 {
                return Err(CaptionError::validation(field, "must be greater than 0"));
            }
        }
        Ok(())
    }

    /// Number of recurrent directions feeding the output head.
    pub fn num_directions(&self) -> usize {
        if self.bidirectional { 2 } else { 1 }
    }

    /// Input width of the time-distributed output head.
    pub fn decoder_output_width(&self) -> usize {
        self.rnn_hidden_size * self.num_directions()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn defaults_with_vocab(vocab: usize) -> DefaultConfig {
        DefaultConfig { vocab_size: Some(vocab), ..DefaultConfig::default() }
    }

    #[test]
    fn test_unset_fields_come_from_defaults() {
        let defaults = defaults_with_vocab(500);
        let cfg = ModelConfig::resolve(ModelOverrides::new(), &defaults).unwrap();
        assert_eq!(cfg.vocab_size, 500);
        assert_eq!(cfg.embedding_size, defaults.embedding_size);
        assert_eq!(cfg.rnn_cell_kind.to_string(), defaults.rnn_cell_kind);
        assert_eq!(cfg.bidirectional, defaults.bidirectional);
    }

    #[test]
    fn test_overrides_win_over_defaults() {
        let overrides = ModelOverrides::new()
            .with_vocab_size(42)
            .with_embedding_size(16)
            .with_bidirectional(true)
            .with_rnn_cell_kind("gru");
        let cfg = ModelConfig::resolve(overrides, &defaults_with_vocab(500)).unwrap();
        assert_eq!(cfg.vocab_size, 42);
        assert_eq!(cfg.embedding_size, 16);
        assert!(cfg.bidirectional);
        assert_eq!(cfg.rnn_cell_kind, RnnCellKind::Gru);
    }

    #[test]
    fn test_missing_vocab_size_is_configuration_error() {
        let err = ModelConfig::resolve(ModelOverrides::new(), &DefaultConfig::default())
            .unwrap_err();
        assert!(matches!(err, CaptionError::Configuration(_)));
    }

    #[test]
    fn test_cell_kind_is_case_sensitive() {
        assert_eq!("lstm".parse::<RnnCellKind>().unwrap(), RnnCellKind::Lstm);
        for bad in ["GRU", "Lstm", "rnn", ""] {
            let err = bad.parse::<RnnCellKind>().unwrap_err();
            assert!(matches!(err, CaptionError::Validation { .. }), "{bad} accepted");
        }
    }

    #[test]
    fn test_unknown_cell_kind_rejected_on_resolve() {
        let overrides = ModelOverrides::new().with_vocab_size(10).with_rnn_cell_kind("transformer");
        let err = ModelConfig::resolve(overrides, &DefaultConfig::default()).unwrap_err();
        assert!(matches!(err, CaptionError::Validation { ref field, .. } if field == "rnn_cell_kind"));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let defaults = defaults_with_vocab(10);
        let bad_dropout = ModelOverrides::new().with_dropout_rate(1.0);
        assert!(ModelConfig::resolve(bad_dropout, &defaults).is_err());

        let bad_lr = ModelOverrides::new().with_learning_rate(0.0);
        assert!(ModelConfig::resolve(bad_lr, &defaults).is_err());

        let bad_vocab = ModelOverrides::new().with_vocab_size(0);
        assert!(ModelConfig::resolve(bad_vocab, &defaults).is_err());
    }

    #[test]
    fn test_decoder_output_width_doubles_when_bidirectional() {
        let defaults = defaults_with_vocab(10);
        let uni = ModelConfig::resolve(
            ModelOverrides::new().with_rnn_hidden_size(8).with_bidirectional(false),
            &defaults,
        )
        .unwrap();
        let bi = ModelConfig::resolve(
            ModelOverrides::new().with_rnn_hidden_size(8).with_bidirectional(true),
            &defaults,
        )
        .unwrap();
        assert_eq!(uni.decoder_output_width(), 8);
        assert_eq!(bi.decoder_output_width(), 16);
    }

    #[test]
    fn test_config_json_uses_lowercase_cell_kind() {
        let cfg = ModelConfig::resolve(
            ModelOverrides::new().with_rnn_cell_kind("gru"),
            &defaults_with_vocab(10),
        )
        .unwrap();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"rnn_cell_kind\":\"gru\""));
    }
}
