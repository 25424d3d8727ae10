// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a reference training run in order:
//
//   Step 1: Resolve config + build the model   (Layer 5 - ml)
//   Step 2: Synthesise caption samples         (this file)
//   Step 3: Split train/validation             (Layer 4 - data)
//   Step 4: Build datasets                     (Layer 4 - data)
//   Step 5: Save resolved config               (Layer 6 - infra)
//   Step 6: Run training loop                  (Layer 5 - ml)
//
// The samples stand in for extractor features plus tokenised
// captions: each caption is a deterministic function of its
// feature vector, so a correctly wired model can learn them.
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use burn::tensor::backend::AutodiffBackend;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::{CaptionDataset, CaptionSample},
    splitter::split_train_val,
};
use crate::domain::config::ModelOverrides;
use crate::infra::{checkpoint::CheckpointManager, metrics::{EpochMetrics, MetricsLogger}};
use crate::ml::{model::ImageCaptioningModel, trainer::run_training};

// ─── Training Configuration ──────────────────────────────────────────────────
// Model hyperparameters stay as overrides: anything unset is filled from
// the process-wide default configuration when the model is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub model:           ModelOverrides,
    pub num_samples:     usize,
    pub max_caption_len: usize,
    pub train_fraction:  f64,
    pub batch_size:      usize,
    pub epochs:          usize,
    pub seed:            u64,
    pub metrics_dir:     String,
    pub checkpoint_dir:  String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            model:           ModelOverrides::default(),
            num_samples:     512,
            max_caption_len: 8,
            train_fraction:  0.8,
            batch_size:      16,
            epochs:          10,
            seed:            42,
            metrics_dir:     "runs".to_string(),
            checkpoint_dir:  "checkpoints".to_string(),
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline on backend `B` and return per-epoch metrics.
    pub fn execute<B: AutodiffBackend>(&self, device: B::Device) -> Result<Vec<EpochMetrics>> {
        let cfg = &self.config;
        if cfg.batch_size == 0 || cfg.max_caption_len == 0 {
            bail!("batch_size and max_caption_len must both be greater than 0");
        }

        // ── Step 1: Resolve config and build the trainable unit ──────────────
        let mut model = ImageCaptioningModel::<B>::new(cfg.model.clone(), device)?;
        model.build()?;
        let model_config = model.config().clone();

        // ── Step 2: Synthesise samples matching the model's shapes ───────────
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let samples = synthesize_samples(
            cfg.num_samples,
            model_config.image_feature_width,
            model_config.vocab_size,
            cfg.max_caption_len,
            &mut rng,
        )?;
        tracing::info!("Synthesised {} caption samples", samples.len());

        // ── Step 3: Train / validation split ──────────────────────────────────
        let (train_samples, val_samples) = split_train_val(samples, cfg.train_fraction, cfg.seed);
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );

        // ── Step 4: Build Burn datasets ───────────────────────────────────────
        let train_dataset = CaptionDataset::new(train_samples);
        let val_dataset   = CaptionDataset::new(val_samples);

        // ── Step 5: Save the resolved config next to the checkpoints ──────────
        let checkpoints = CheckpointManager::new(&cfg.checkpoint_dir)?;
        checkpoints.save_config(&model_config)?;
        let logger = MetricsLogger::new(&cfg.metrics_dir)?;

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        run_training(cfg, &mut model, train_dataset, val_dataset, &logger, &checkpoints)
    }
}

// ─── Synthetic Sample Generation ─────────────────────────────────────────────
// One feature is boosted per image; its index picks the first word, and
// every following word is the successor of the previous one (wrapping
// around the non-padding vocabulary). Lengths vary so batches need padding.
fn synthesize_samples(
    count:           usize,
    feature_width:   usize,
    vocab_size:      usize,
    max_caption_len: usize,
    rng:             &mut StdRng,
) -> Result<Vec<CaptionSample>> {
    if vocab_size < 2 {
        bail!("vocab_size must leave at least one word besides padding, got {vocab_size}");
    }
    let words = vocab_size - 1;

    let samples = (0..count)
        .map(|_| {
            let mut features: Vec<f32> = (0..feature_width).map(|_| rng.gen::<f32>()).collect();
            let anchor = rng.gen_range(0..feature_width);
            features[anchor] += 1.0;

            let len    = rng.gen_range(1..=max_caption_len);
            let tokens = (0..len)
                .map(|k| 1 + ((anchor + k) % words) as u32)
                .collect();
            CaptionSample::new(features, tokens)
        })
        .collect();

    Ok(samples)
}
