// ============================================================
// Layer 3 — Process-wide Default Configuration
// ============================================================
// The fallback every ModelOverrides field resolves against when
// left unset. There is exactly one active DefaultConfig per
// process; it can be read with `active_config()` and replaced with
// `set_active_config()` (the CLI does so when --defaults is given).
//
// vocab_size has no sensible default: it depends on the vocabulary
// built by the data pipeline, so it starts out as None and must be
// provided either here or explicitly on the model.

use std::sync::{LazyLock, RwLock};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultConfig {
    pub learning_rate:       f64,
    pub vocab_size:          Option<usize>,
    pub embedding_size:      usize,
    pub rnn_hidden_size:     usize,
    pub dropout_rate:        f64,
    pub bidirectional:       bool,
    /// Kept as text so an invalid value surfaces as a validation error
    /// when a model is constructed, not when the file is parsed.
    pub rnn_cell_kind:       String,
    /// Width of the pooled image feature vector (2048 for InceptionV3 avg-pool).
    pub image_feature_width: usize,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            learning_rate:       1e-3,
            vocab_size:          None,
            embedding_size:      300,
            rnn_hidden_size:     300,
            dropout_rate:        0.3,
            bidirectional:       false,
            rnn_cell_kind:       "lstm".to_string(),
            image_feature_width: 2048,
        }
    }
}

impl DefaultConfig {
    /// Parse a (possibly partial) JSON document; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

static ACTIVE_CONFIG: LazyLock<RwLock<DefaultConfig>> =
    LazyLock::new(|| RwLock::new(DefaultConfig::default()));

/// Snapshot of the currently active default configuration.
pub fn active_config() -> DefaultConfig {
    match ACTIVE_CONFIG.read() {
        Ok(guard)     => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Replace the active default configuration, returning the previous one.
/// Models constructed earlier keep the values they already resolved.
pub fn set_active_config(config: DefaultConfig) -> DefaultConfig {
    let mut guard = match ACTIVE_CONFIG.write() {
        Ok(guard)     => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    tracing::debug!("Active default configuration replaced");
    std::mem::replace(&mut *guard, config)
}
