// ============================================================
// Layer 5 — Trainable Unit
// ============================================================
// The built model: network + optimiser + objective, bound together
// once by `ImageCaptioningModel::build()`.
//
// Teacher forcing, for a padded caption batch of length L:
//
//   word input = captions[:, 0..L-1]   (last token never fed)
//   target     = captions[:, 0..L]
//   logits     = [batch, 1 + (L-1), vocab] = [batch, L, vocab]
//
// Binding checks, done once before any training step:
//   - the extractor's output width equals the projector's input width
//   - a probe batch produces logits of exactly [1, L, vocab_size]
//   - the optimiser covers exactly the trainable parameter groups
//
// Entry points:
//   fit_batch — forward, masked loss, backward, Adam step
//   evaluate  — forward on the inner backend (no autodiff, no dropout)

use burn::{
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, Adam, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::CaptionBatch;
use crate::domain::config::ModelConfig;
use crate::domain::error::{CaptionError, CaptionResult};
use crate::ml::{
    extractor::FeatureExtractor,
    network::CaptionNetwork,
    objective::{MaskedAccuracy, MaskedObjective},
};

// ─── ParamGroup ───────────────────────────────────────────────────────────────
/// A named block of parameters and whether the optimiser may update it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamGroup {
    pub name:       &'static str,
    pub trainable:  bool,
    pub num_params: usize,
}

// ─── StepMetrics ──────────────────────────────────────────────────────────────
/// Masked loss and accuracy for one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    pub loss:     f64,
    pub accuracy: MaskedAccuracy,
}

/// Split a padded caption batch into its teacher-forcing word input.
/// Returns None for single-token captions (the image step is the whole input).
pub fn teacher_forcing_inputs<B: Backend>(
    captions: &Tensor<B, 2, Int>,
) -> CaptionResult<Option<Tensor<B, 2, Int>>> {
    let [batch, len] = captions.dims();
    match len {
        0 => Err(CaptionError::Usage("caption batch has no timesteps".to_string())),
        1 => Ok(None),
        _ => Ok(Some(captions.clone().slice([0..batch, 0..len - 1]))),
    }
}

fn check_token_range<B: Backend>(captions: &Tensor<B, 2, Int>, vocab_size: usize) -> CaptionResult<()> {
    let min = captions.clone().min().into_scalar().elem::<i64>();
    let max = captions.clone().max().into_scalar().elem::<i64>();
    if min < 0 || max >= vocab_size as i64 {
        return Err(CaptionError::Usage(format!(
            "token ids must lie in [0, {vocab_size}), batch spans [{min}, {max}]"
        )));
    }
    Ok(())
}

/// Shared forward used by training (autodiff) and evaluation (inner backend).
fn teacher_forced_logits<B: Backend>(
    network:    &CaptionNetwork<B>,
    vocab_size: usize,
    batch:      &CaptionBatch<B>,
) -> CaptionResult<Tensor<B, 3>> {
    let [feature_batch, _] = batch.image_features.dims();
    if feature_batch != batch.batch_size() {
        return Err(CaptionError::shape(
            "caption batch",
            format!("{} image feature rows", batch.batch_size()),
            format!("{feature_batch} image feature rows"),
        ));
    }
    // Length first: min/max reductions are undefined on an empty caption axis.
    let word_ids = teacher_forcing_inputs(&batch.captions)?;
    check_token_range(&batch.captions, vocab_size)?;

    network.forward(batch.image_features.clone(), word_ids)
}

// ─── TrainableUnit ────────────────────────────────────────────────────────────
pub struct TrainableUnit<B: AutodiffBackend> {
    network:       CaptionNetwork<B>,
    optimizer:     OptimizerAdaptor<Adam, CaptionNetwork<B>, B>,
    objective:     MaskedObjective,
    learning_rate: f64,
    vocab_size:    usize,
    extractor:     Option<Box<dyn FeatureExtractor<B::InnerBackend>>>,
    groups:        Vec<ParamGroup>,
    steps:         usize,
}

impl<B: AutodiffBackend> TrainableUnit<B> {
    /// Construct the graph and bind optimiser + objective. Called once by the facade.
    pub(crate) fn bind(
        config:    &ModelConfig,
        device:    &B::Device,
        extractor: Option<Box<dyn FeatureExtractor<B::InnerBackend>>>,
    ) -> CaptionResult<Self> {
        if let Some(extractor) = &extractor {
            if extractor.output_width() != config.image_feature_width {
                return Err(CaptionError::shape(
                    "feature extractor",
                    format!("output width {}", config.image_feature_width),
                    format!("output width {}", extractor.output_width()),
                ));
            }
        }

        let network: CaptionNetwork<B> = config.init(device);
        let objective = MaskedObjective::default();
        probe_shapes(&network.valid(), config, &objective, device)?;

        let mut groups = Vec::with_capacity(4);
        if let Some(extractor) = &extractor {
            groups.push(ParamGroup {
                name:       "image_extractor",
                trainable:  false,
                num_params: extractor.num_params(),
            });
        }
        groups.push(ParamGroup {
            name:       "image_projector",
            trainable:  true,
            num_params: network.projector.num_params(),
        });
        groups.push(ParamGroup {
            name:       "word_embedder",
            trainable:  true,
            num_params: network.embedder.num_params(),
        });
        groups.push(ParamGroup {
            name:       "sequence_decoder",
            trainable:  true,
            num_params: network.decoder.num_params(),
        });

        // The optimiser updates the network module and nothing else, so the
        // trainable groups must account for exactly its parameters.
        let trainable: usize = groups.iter().filter(|g| g.trainable).map(|g| g.num_params).sum();
        if trainable != network.num_params() {
            return Err(CaptionError::Usage(format!(
                "trainable groups hold {trainable} parameters but the optimiser \
                 would update {}",
                network.num_params()
            )));
        }
        let frozen: usize = groups.iter().filter(|g| !g.trainable).map(|g| g.num_params).sum();

        let optimizer = AdamConfig::new().with_epsilon(1e-8).init();
        tracing::info!(
            "Bound Adam (lr={}) to {} trainable parameters; {} frozen",
            config.learning_rate,
            trainable,
            frozen,
        );

        Ok(Self {
            network,
            optimizer,
            objective,
            learning_rate: config.learning_rate,
            vocab_size: config.vocab_size,
            extractor,
            groups,
            steps: 0,
        })
    }

    pub fn network(&self) -> &CaptionNetwork<B> {
        &self.network
    }

    pub fn objective(&self) -> MaskedObjective {
        self.objective
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn parameter_groups(&self) -> &[ParamGroup] {
        &self.groups
    }

    /// Optimiser steps taken so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Run the frozen extractor. Lift the result with [`Self::lift_features`]
    /// to train on it.
    pub fn extract_features(
        &self,
        images: Tensor<B::InnerBackend, 4>,
    ) -> CaptionResult<Tensor<B::InnerBackend, 2>> {
        let extractor = self.extractor.as_ref().ok_or_else(|| {
            CaptionError::Usage("no feature extractor attached to this model".to_string())
        })?;
        Ok(extractor.extract(images))
    }

    /// Move inner-backend features into the autodiff graph as a constant.
    pub fn lift_features(features: Tensor<B::InnerBackend, 2>) -> Tensor<B, 2> {
        Tensor::from_inner(features)
    }

    /// Teacher-forced logits [batch, L, vocab_size] with the training backend.
    pub fn forward(&self, batch: &CaptionBatch<B>) -> CaptionResult<Tensor<B, 3>> {
        teacher_forced_logits(&self.network, self.vocab_size, batch)
    }

    /// One optimisation step on `batch` using the masked objective.
    pub fn fit_batch(&mut self, batch: CaptionBatch<B>) -> CaptionResult<StepMetrics> {
        let logits = self.forward(&batch)?;
        let (loss, accuracy) = self.objective.score(logits, batch.captions)?;
        let loss_value = loss.clone().into_scalar().elem::<f64>();

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.network);
        self.network = self
            .optimizer
            .step(self.learning_rate, self.network.clone(), grads);
        self.steps += 1;

        tracing::debug!(
            "step {} loss={:.4} acc={:.3} ({} positions)",
            self.steps,
            loss_value,
            accuracy.value(),
            accuracy.scored,
        );
        Ok(StepMetrics { loss: loss_value, accuracy })
    }

    /// Masked loss and accuracy without updating parameters.
    pub fn evaluate(&self, batch: CaptionBatch<B::InnerBackend>) -> CaptionResult<StepMetrics> {
        let network = self.network.valid();
        let logits = teacher_forced_logits(&network, self.vocab_size, &batch)?;
        let (loss, accuracy) = self.objective.score(logits, batch.captions)?;
        Ok(StepMetrics { loss: loss.into_scalar().elem::<f64>(), accuracy })
    }
}

/// Push a tiny batch through the fresh network and check every shape the
/// objective relies on.
fn probe_shapes<B: Backend>(
    network:   &CaptionNetwork<B>,
    config:    &ModelConfig,
    objective: &MaskedObjective,
    device:    &B::Device,
) -> CaptionResult<()> {
    const PROBE_LEN: usize = 2;

    if network.decoder.head_input_width() != config.decoder_output_width() {
        return Err(CaptionError::shape(
            "decoder head",
            format!("input width {}", config.decoder_output_width()),
            format!("input width {}", network.decoder.head_input_width()),
        ));
    }

    let features = Tensor::<B, 2>::zeros([1, config.image_feature_width], device);
    let captions = Tensor::<B, 2, Int>::zeros([1, PROBE_LEN], device);
    let batch = CaptionBatch::new(features, captions);
    let logits = teacher_forced_logits(network, config.vocab_size, &batch)?;

    let expected = [1, PROBE_LEN, config.vocab_size];
    if logits.dims() != expected {
        return Err(CaptionError::shape(
            "decoder output",
            format!("{expected:?}"),
            format!("{:?}", logits.dims()),
        ));
    }
    objective.check_alignment(&logits, &batch.captions)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{batcher::CaptionBatcher, dataset::CaptionSample};
    use crate::domain::config::ModelOverrides;
    use crate::domain::defaults::DefaultConfig;
    use crate::ml::extractor::GlobalAveragePool;
    use burn::backend::{Autodiff, NdArray};
    use burn::data::dataloader::batcher::Batcher;

    type TestBackend = Autodiff<NdArray>;

    fn config(feature_width: usize) -> ModelConfig {
        ModelConfig::resolve(
            ModelOverrides::new()
                .with_vocab_size(12)
                .with_embedding_size(8)
                .with_rnn_hidden_size(8)
                .with_dropout_rate(0.0)
                .with_learning_rate(0.05)
                .with_image_feature_width(feature_width)
                .with_rnn_cell_kind("gru"),
            &DefaultConfig::default(),
        )
        .unwrap()
    }

    fn batch(captions: &[i32], rows: usize) -> CaptionBatch<TestBackend> {
        let device = Default::default();
        let len = captions.len() / rows;
        CaptionBatch::new(
            Tensor::<TestBackend, 2>::ones([rows, 4], &device),
            Tensor::<TestBackend, 1, Int>::from_ints(captions, &device).reshape([rows, len]),
        )
    }

    #[test]
    fn test_teacher_forcing_drops_last_token() {
        let device = Default::default();
        let captions = Tensor::<NdArray, 1, Int>::from_ints([3, 7, 5, 0], &device).reshape([1, 4]);
        let inputs = teacher_forcing_inputs(&captions).unwrap().unwrap();
        assert_eq!(inputs.into_data().to_vec::<i64>().unwrap(), vec![3, 7, 5]);

        let single = Tensor::<NdArray, 2, Int>::ones([2, 1], &device);
        assert!(teacher_forcing_inputs(&single).unwrap().is_none());
    }

    #[test]
    fn test_logits_length_equals_caption_length() {
        let unit = TrainableUnit::<TestBackend>::bind(&config(4), &Default::default(), None).unwrap();
        for len in 1..=5usize {
            let captions: Vec<i32> = (1..=len as i32).collect();
            let logits = unit.forward(&batch(&captions, 1)).unwrap();
            assert_eq!(logits.dims(), [1, len, 12]);
        }
    }

    #[test]
    fn test_extractor_width_mismatch_fails_at_bind() {
        let extractor: Box<dyn FeatureExtractor<NdArray>> = Box::new(GlobalAveragePool::new(5));
        let result = TrainableUnit::<TestBackend>::bind(&config(4), &Default::default(), Some(extractor));
        assert!(matches!(result, Err(CaptionError::ShapeMismatch { stage: "feature extractor", .. })));
    }

    #[test]
    fn test_extractor_group_is_frozen() {
        let extractor: Box<dyn FeatureExtractor<NdArray>> = Box::new(GlobalAveragePool::new(4));
        let unit = TrainableUnit::<TestBackend>::bind(&config(4), &Default::default(), Some(extractor))
            .unwrap();
        let groups = unit.parameter_groups();
        assert_eq!(groups[0].name, "image_extractor");
        assert!(!groups[0].trainable);
        assert!(groups[1..].iter().all(|g| g.trainable && g.num_params > 0));
    }

    #[test]
    fn test_extracted_features_feed_training() {
        let device = Default::default();
        let extractor: Box<dyn FeatureExtractor<NdArray>> = Box::new(GlobalAveragePool::new(4));
        let mut unit = TrainableUnit::<TestBackend>::bind(&config(4), &device, Some(extractor))
            .unwrap();

        let images = Tensor::<NdArray, 4>::ones([2, 4, 3, 3], &device);
        let features = unit.extract_features(images).unwrap();
        let features = TrainableUnit::<TestBackend>::lift_features(features);
        let captions = Tensor::<TestBackend, 1, Int>::from_ints([1, 2, 3, 4, 0, 0], &device)
            .reshape([2, 3]);

        let metrics = unit.fit_batch(CaptionBatch::new(features, captions)).unwrap();
        assert_eq!(metrics.accuracy.scored, 4);
    }

    #[test]
    fn test_extract_without_extractor_is_usage_error() {
        let unit = TrainableUnit::<TestBackend>::bind(&config(4), &Default::default(), None).unwrap();
        let images = Tensor::<NdArray, 4>::ones([1, 4, 2, 2], &Default::default());
        assert!(unit.extract_features(images).unwrap_err().is_usage());
    }

    #[test]
    fn test_out_of_vocab_token_is_usage_error() {
        let mut unit = TrainableUnit::<TestBackend>::bind(&config(4), &Default::default(), None).unwrap();
        let err = unit.fit_batch(batch(&[3, 12], 1)).unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_empty_caption_batch_is_usage_error() {
        let device = Default::default();
        let mut unit = TrainableUnit::<TestBackend>::bind(&config(4), &device, None).unwrap();

        let hand_built = CaptionBatch::new(
            Tensor::<TestBackend, 2>::ones([2, 4], &device),
            Tensor::<TestBackend, 2, Int>::zeros([2, 0], &device),
        );
        assert!(matches!(unit.fit_batch(hand_built), Err(CaptionError::Usage(_))));

        let batched = CaptionBatcher::<TestBackend>::new(device)
            .batch(vec![CaptionSample::new(vec![0.5; 4], vec![])]);
        assert_eq!(batched.caption_len(), 0);
        assert!(matches!(unit.fit_batch(batched), Err(CaptionError::Usage(_))));
        assert_eq!(unit.steps(), 0);
    }

    /// Logits at every step for one image and caption, dropout off.
    fn step_logits(unit: &TrainableUnit<TestBackend>, image: [f32; 4], caption: [i32; 4]) -> Vec<Vec<f32>> {
        let device = Default::default();
        let batch = CaptionBatch::new(
            Tensor::<TestBackend, 1>::from_floats(image, &device).reshape([1, 4]),
            Tensor::<TestBackend, 1, Int>::from_ints(caption, &device).reshape([1, 4]),
        );
        let logits = unit.forward(&batch).unwrap();
        (0..4)
            .map(|t| logits.clone().slice([0..1, t..t + 1]).into_data().to_vec::<f32>().unwrap())
            .collect()
    }

    fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f32::max)
    }

    #[test]
    fn test_step_t_scores_token_t_from_earlier_tokens_only() {
        let unit = TrainableUnit::<TestBackend>::bind(&config(4), &Default::default(), None).unwrap();
        let image = [0.2, -0.4, 0.9, 0.1];
        let base = step_logits(&unit, image, [3, 7, 5, 2]);

        // Changing token t leaves steps 0..=t unchanged and moves step t+1.
        for t in 0..3 {
            let mut caption = [3, 7, 5, 2];
            caption[t] = 9;
            let changed = step_logits(&unit, image, caption);
            for s in 0..=t {
                assert!(max_abs_diff(&base[s], &changed[s]) < 1e-6, "token {t} leaked into step {s}");
            }
            assert!(max_abs_diff(&base[t + 1], &changed[t + 1]) > 1e-6, "token {t} unused at step {}", t + 1);
        }

        // The last token is a target only and never an input.
        let changed = step_logits(&unit, image, [3, 7, 5, 9]);
        for s in 0..4 {
            assert!(max_abs_diff(&base[s], &changed[s]) < 1e-6);
        }

        // Step 0 sees the image alone.
        let other_image = step_logits(&unit, [1.0, 0.0, -1.0, 0.5], [3, 7, 5, 2]);
        assert!(max_abs_diff(&base[0], &other_image[0]) > 1e-6);
        let other_words = step_logits(&unit, image, [8, 1, 4, 6]);
        assert!(max_abs_diff(&base[0], &other_words[0]) < 1e-6);
    }

    #[test]
    fn test_fit_batch_reduces_loss_on_repeated_batch() {
        let mut unit = TrainableUnit::<TestBackend>::bind(&config(4), &Default::default(), None).unwrap();
        let first = unit.fit_batch(batch(&[3, 7, 0, 0, 5, 9, 2, 4], 2)).unwrap();
        let mut last = first;
        for _ in 0..30 {
            last = unit.fit_batch(batch(&[3, 7, 0, 0, 5, 9, 2, 4], 2)).unwrap();
        }
        assert_eq!(unit.steps(), 31);
        assert_eq!(last.accuracy.scored, 6);
        assert!(last.loss < first.loss, "{} !< {}", last.loss, first.loss);
    }

    #[test]
    fn test_evaluate_does_not_update_parameters() {
        let unit = TrainableUnit::<TestBackend>::bind(&config(4), &Default::default(), None).unwrap();
        let device = Default::default();
        let eval_batch = CaptionBatch::<NdArray>::new(
            Tensor::ones([1, 4], &device),
            Tensor::<NdArray, 1, Int>::from_ints([3, 7, 0, 0], &device).reshape([1, 4]),
        );
        let a = unit.evaluate(eval_batch.clone()).unwrap();
        let b = unit.evaluate(eval_batch).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.accuracy.scored, 2);
        assert_eq!(unit.steps(), 0);
    }
}
