// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands: `train` and `config`.
//
// Model flags are optional on purpose: an omitted flag is
// resolved from the active default configuration (built-in,
// or loaded with --defaults), exactly like an omitted field in
// ModelOverrides.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::domain::config::ModelOverrides;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the captioning model on a synthetic caption dataset
    Train(TrainArgs),

    /// Print the resolved model configuration as JSON
    Config(ConfigArgs),
}

/// Hyperparameter flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// JSON file replacing the process-wide default configuration
    #[arg(long)]
    pub defaults: Option<String>,

    /// Number of distinct token ids, padding (id 0) included
    #[arg(long)]
    pub vocab_size: Option<usize>,

    /// Width of word embeddings and of the projected image step
    #[arg(long)]
    pub embedding_size: Option<usize>,

    /// Hidden units per recurrent direction
    #[arg(long)]
    pub rnn_hidden_size: Option<usize>,

    /// Input and recurrent dropout probability, in [0, 1)
    #[arg(long)]
    pub dropout_rate: Option<f64>,

    /// Adam learning rate
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Recurrent cell: "gru" or "lstm"
    #[arg(long)]
    pub rnn_cell_kind: Option<String>,

    /// Run a second recurrent layer over the reversed sequence
    #[arg(long)]
    pub bidirectional: Option<bool>,

    /// Width of the precomputed image feature vector
    #[arg(long)]
    pub image_feature_width: Option<usize>,
}

impl From<ModelArgs> for ModelOverrides {
    fn from(a: ModelArgs) -> Self {
        ModelOverrides {
            learning_rate:       a.learning_rate,
            vocab_size:          a.vocab_size,
            embedding_size:      a.embedding_size,
            rnn_hidden_size:     a.rnn_hidden_size,
            dropout_rate:        a.dropout_rate,
            bidirectional:       a.bidirectional,
            rnn_cell_kind:       a.rnn_cell_kind,
            image_feature_width: a.image_feature_width,
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Train on the CPU (NdArray) instead of the GPU (Wgpu)
    #[arg(long)]
    pub cpu: bool,

    /// Number of synthetic (image, caption) samples to generate
    #[arg(long, default_value_t = 512)]
    pub num_samples: usize,

    /// Longest synthetic caption, in tokens
    #[arg(long, default_value_t = 8)]
    pub max_caption_len: usize,

    /// Number of samples per optimisation step
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Seed for sample generation, splitting and shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Directory for metrics.csv
    #[arg(long, default_value = "runs")]
    pub metrics_dir: String,

    /// Directory for network checkpoints and the resolved config
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            model:           a.model.into(),
            num_samples:     a.num_samples,
            max_caption_len: a.max_caption_len,
            batch_size:      a.batch_size,
            epochs:          a.epochs,
            seed:            a.seed,
            metrics_dir:     a.metrics_dir,
            checkpoint_dir:  a.checkpoint_dir,
            ..TrainConfig::default()
        }
    }
}

/// All arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub model: ModelArgs,
}
