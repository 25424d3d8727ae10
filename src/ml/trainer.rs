// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Reference driver for a built ImageCaptioningModel: epochs of
// fit_batch over the training loader, then evaluate over the
// validation loader.
//
//   - Training batches live on the autodiff backend B
//   - Validation batches live on B::InnerBackend (no autodiff,
//     dropout off) and go through TrainableUnit::evaluate
//   - Loss and accuracy are pooled over scored positions across
//     batches, so short-caption batches are not over-weighted
//   - The network is checkpointed whenever validation loss improves
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::CaptionBatcher, dataset::CaptionDataset};
use crate::infra::{checkpoint::CheckpointManager, metrics::{EpochMetrics, MetricsLogger}};
use crate::ml::{model::ImageCaptioningModel, objective::MaskedAccuracy, unit::StepMetrics};

// ─── EpochPool ────────────────────────────────────────────────────────────────
/// Running totals for one phase of an epoch, weighted by scored positions.
#[derive(Debug, Default)]
struct EpochPool {
    weighted_loss: f64,
    batches:       usize,
    accuracy:      MaskedAccuracy,
}

impl EpochPool {
    fn add(&mut self, step: StepMetrics) {
        self.weighted_loss += step.loss * step.accuracy.scored as f64;
        self.batches       += 1;
        self.accuracy       = self.accuracy.combine(step.accuracy);
    }

    /// NaN when no batch was seen, 0 when every batch was all padding.
    fn mean_loss(&self) -> f64 {
        match (self.batches, self.accuracy.scored) {
            (0, _) => f64::NAN,
            (_, 0) => 0.0,
            (_, scored) => self.weighted_loss / scored as f64,
        }
    }
}

pub fn run_training<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    model:         &mut ImageCaptioningModel<B>,
    train_dataset: CaptionDataset,
    val_dataset:   CaptionDataset,
    logger:        &MetricsLogger,
    checkpoints:   &CheckpointManager,
) -> Result<Vec<EpochMetrics>> {
    tracing::info!(
        "Training on {} samples, validating on {} (longest caption {} tokens)",
        train_dataset.sample_count(),
        val_dataset.sample_count(),
        train_dataset.max_caption_len().max(val_dataset.max_caption_len()),
    );

    let device = model.device().clone();
    let unit = model.trainable_unit_mut()?;

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_loader = DataLoaderBuilder::new(CaptionBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);

    // ── Validation data loader (InnerBackend — no autodiff overhead) ──────────
    let val_loader = DataLoaderBuilder::new(CaptionBatcher::<B::InnerBackend>::new(device))
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    let mut history       = Vec::with_capacity(cfg.epochs);
    let mut best_val_loss = f64::INFINITY;

    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train = EpochPool::default();
        for batch in train_loader.iter() {
            train.add(unit.fit_batch(batch)?);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let mut val = EpochPool::default();
        for batch in val_loader.iter() {
            val.add(unit.evaluate(batch)?);
        }

        let metrics = EpochMetrics::new(
            epoch,
            train.mean_loss(),
            train.accuracy.value(),
            val.mean_loss(),
            val.accuracy.value(),
        );

        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} | train_acc={:.1}% | val_loss={:.4} | val_acc={:.1}%",
            epoch, cfg.epochs,
            metrics.train_loss, metrics.train_acc * 100.0,
            metrics.val_loss,   metrics.val_acc * 100.0,
        );

        logger.log(&metrics)?;

        // Without validation batches val_loss is NaN and nothing is saved.
        if metrics.is_improvement(best_val_loss) {
            best_val_loss = metrics.val_loss;
            checkpoints.save_network(unit.network(), epoch)?;
            tracing::info!("New best val_loss={:.4}, checkpoint saved", best_val_loss);
        }

        history.push(metrics);
    }

    tracing::info!("Training complete after {} optimiser steps", unit.steps());
    Ok(history)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn step(loss: f64, correct: usize, scored: usize) -> StepMetrics {
        StepMetrics { loss, accuracy: MaskedAccuracy { correct, scored } }
    }

    #[test]
    fn test_loss_is_weighted_by_scored_positions() {
        let mut pool = EpochPool::default();
        pool.add(step(1.0, 1, 2));
        pool.add(step(4.0, 3, 6));
        // (1*2 + 4*6) / 8, not the per-batch mean 2.5
        assert!((pool.mean_loss() - 3.25).abs() < 1e-12);
        assert_eq!(pool.accuracy, MaskedAccuracy { correct: 4, scored: 8 });
    }

    #[test]
    fn test_empty_and_all_padding_phases() {
        assert!(EpochPool::default().mean_loss().is_nan());

        let mut pool = EpochPool::default();
        pool.add(step(0.0, 0, 0));
        assert_eq!(pool.mean_loss(), 0.0);
    }
}
