// ============================================================
// Layer 5 — ImageCaptioningModel (facade)
// ============================================================
// Owns the resolved configuration and builds the trainable unit
// exactly once.
//
//   new()/with_defaults()  — resolve + validate config (may fail)
//   build()                — Unbuilt → Built, no-op when Built
//   trainable_unit()       — Usage error until build() succeeded
//
// Construction and build are single-threaded; `build(&mut self)`
// lets the borrow checker rule out concurrent builds.

use burn::tensor::backend::AutodiffBackend;

use crate::domain::config::{ModelConfig, ModelOverrides};
use crate::domain::defaults::{active_config, DefaultConfig};
use crate::domain::error::{CaptionError, CaptionResult};
use crate::ml::{extractor::FeatureExtractor, unit::TrainableUnit};

enum BuildState<B: AutodiffBackend> {
    Unbuilt,
    Built(TrainableUnit<B>),
}

pub struct ImageCaptioningModel<B: AutodiffBackend> {
    config:    ModelConfig,
    device:    B::Device,
    extractor: Option<Box<dyn FeatureExtractor<B::InnerBackend>>>,
    state:     BuildState<B>,
}

impl<B: AutodiffBackend> ImageCaptioningModel<B> {
    /// Resolve unset fields from the process-wide default configuration.
    pub fn new(overrides: ModelOverrides, device: B::Device) -> CaptionResult<Self> {
        Self::with_defaults(overrides, &active_config(), device)
    }

    /// Resolve unset fields from an explicit default configuration.
    pub fn with_defaults(
        overrides: ModelOverrides,
        defaults:  &DefaultConfig,
        device:    B::Device,
    ) -> CaptionResult<Self> {
        let config = ModelConfig::resolve(overrides, defaults)?;
        tracing::debug!("Resolved model config: {:?}", config);
        Ok(Self { config, device, extractor: None, state: BuildState::Unbuilt })
    }

    /// Attach the frozen image feature extractor. Only allowed before build.
    pub fn with_feature_extractor(
        mut self,
        extractor: Box<dyn FeatureExtractor<B::InnerBackend>>,
    ) -> CaptionResult<Self> {
        if self.is_built() {
            return Err(CaptionError::Usage(
                "cannot attach a feature extractor after build()".to_string(),
            ));
        }
        self.extractor = Some(extractor);
        Ok(self)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn is_built(&self) -> bool {
        matches!(self.state, BuildState::Built(_))
    }

    /// Build the trainable unit. Calling it again after success does nothing.
    pub fn build(&mut self) -> CaptionResult<()> {
        if self.is_built() {
            return Ok(());
        }

        tracing::info!(
            "Building captioning model: {} {}, hidden={}, embedding={}, vocab={}",
            if self.config.bidirectional { "bidirectional" } else { "unidirectional" },
            self.config.rnn_cell_kind,
            self.config.rnn_hidden_size,
            self.config.embedding_size,
            self.config.vocab_size,
        );

        // On failure the extractor is handed back so build() can be retried.
        let extractor = self.extractor.take();
        let width_ok = extractor
            .as_ref()
            .map_or(true, |e| e.output_width() == self.config.image_feature_width);
        if !width_ok {
            let actual = extractor.as_ref().map_or(0, |e| e.output_width());
            self.extractor = extractor;
            return Err(CaptionError::shape(
                "feature extractor",
                format!("output width {}", self.config.image_feature_width),
                format!("output width {actual}"),
            ));
        }

        let unit = TrainableUnit::bind(&self.config, &self.device, extractor)?;
        self.state = BuildState::Built(unit);
        Ok(())
    }

    pub fn trainable_unit(&self) -> CaptionResult<&TrainableUnit<B>> {
        match &self.state {
            BuildState::Built(unit) => Ok(unit),
            BuildState::Unbuilt => Err(not_built()),
        }
    }

    pub fn trainable_unit_mut(&mut self) -> CaptionResult<&mut TrainableUnit<B>> {
        match &mut self.state {
            BuildState::Built(unit) => Ok(unit),
            BuildState::Unbuilt => Err(not_built()),
        }
    }
}

fn not_built() -> CaptionError {
    CaptionError::Usage("model is not built: call build() before accessing the trainable unit".into())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::CaptionBatch;
    use crate::ml::extractor::GlobalAveragePool;
    use burn::backend::{Autodiff, NdArray};
    use burn::prelude::*;

    type TestBackend = Autodiff<NdArray>;

    fn small(bidirectional: bool) -> ModelOverrides {
        ModelOverrides::new()
            .with_vocab_size(10)
            .with_embedding_size(6)
            .with_rnn_hidden_size(5)
            .with_image_feature_width(4)
            .with_dropout_rate(0.0)
            .with_bidirectional(bidirectional)
    }

    fn model(overrides: ModelOverrides) -> ImageCaptioningModel<TestBackend> {
        ImageCaptioningModel::with_defaults(overrides, &DefaultConfig::default(), Default::default())
            .unwrap()
    }

    fn projector_weights(model: &ImageCaptioningModel<TestBackend>) -> Vec<f32> {
        let unit = model.trainable_unit().unwrap();
        let features = Tensor::<TestBackend, 2>::ones([1, 4], &Default::default());
        unit.network()
            .projector
            .forward(features)
            .unwrap()
            .into_data()
            .to_vec::<f32>()
            .unwrap()
    }

    #[test]
    fn test_access_before_build_is_usage_error() {
        let mut m = model(small(false));
        assert!(!m.is_built());
        assert!(matches!(m.trainable_unit(), Err(CaptionError::Usage(_))));
        assert!(m.trainable_unit_mut().is_err());

        m.build().unwrap();
        assert!(m.trainable_unit().is_ok());
        assert!(m.trainable_unit_mut().is_ok());
    }

    #[test]
    fn test_build_twice_keeps_same_unit_and_parameters() {
        let mut m = model(small(false));
        m.build().unwrap();
        let first_ptr = m.trainable_unit().unwrap() as *const TrainableUnit<TestBackend>;
        let first_weights = projector_weights(&m);

        m.build().unwrap();
        let second_ptr = m.trainable_unit().unwrap() as *const TrainableUnit<TestBackend>;
        assert_eq!(first_ptr, second_ptr);
        assert_eq!(first_weights, projector_weights(&m));
    }

    #[test]
    fn test_missing_vocab_size_fails_at_construction() {
        let overrides = ModelOverrides::new().with_embedding_size(6);
        let result = ImageCaptioningModel::<TestBackend>::with_defaults(
            overrides,
            &DefaultConfig::default(),
            Default::default(),
        );
        assert!(matches!(result, Err(CaptionError::Configuration(_))));
    }

    #[test]
    fn test_process_wide_defaults_have_no_vocab_size() {
        // Nothing in the test suite replaces the active configuration.
        let result = ImageCaptioningModel::<TestBackend>::new(ModelOverrides::new(), Default::default());
        assert!(matches!(result, Err(CaptionError::Configuration(_))));
    }

    #[test]
    fn test_invalid_cell_kind_fails_before_build() {
        let result = ImageCaptioningModel::<TestBackend>::with_defaults(
            small(false).with_rnn_cell_kind("GRU"),
            &DefaultConfig::default(),
            Default::default(),
        );
        assert!(matches!(result, Err(CaptionError::Validation { .. })));
    }

    #[test]
    fn test_bidirectional_changes_head_width_not_output_shape() {
        let mut uni = model(small(false));
        let mut bi = model(small(true));
        uni.build().unwrap();
        bi.build().unwrap();

        let uni_unit = uni.trainable_unit().unwrap();
        let bi_unit = bi.trainable_unit().unwrap();
        assert_eq!(
            bi_unit.network().decoder.head_input_width(),
            2 * uni_unit.network().decoder.head_input_width(),
        );

        let device = Default::default();
        let batch = CaptionBatch::<TestBackend>::new(
            Tensor::ones([2, 4], &device),
            Tensor::<TestBackend, 1, Int>::from_ints([3, 7, 0, 0, 1, 2, 3, 4], &device)
                .reshape([2, 4]),
        );
        let uni_logits = uni_unit.forward(&batch).unwrap();
        let bi_logits = bi_unit.forward(&batch).unwrap();
        assert_eq!(uni_logits.dims(), [2, 4, 10]);
        assert_eq!(bi_logits.dims(), [2, 4, 10]);
    }

    #[test]
    fn test_extractor_width_mismatch_leaves_model_unbuilt() {
        let mut m = model(small(false))
            .with_feature_extractor(Box::new(GlobalAveragePool::new(3)))
            .unwrap();
        let err = m.build().unwrap_err();
        assert!(err.is_usage());
        assert!(!m.is_built());
        assert!(m.trainable_unit().is_err());
    }

    #[test]
    fn test_cannot_attach_extractor_after_build() {
        let mut m = model(small(false));
        m.build().unwrap();
        let result = m.with_feature_extractor(Box::new(GlobalAveragePool::new(4)));
        assert!(result.is_err());
    }

    #[test]
    fn test_fit_through_facade() {
        let mut m = model(small(false).with_rnn_cell_kind("lstm"));
        m.build().unwrap();
        let device = Default::default();
        let batch = CaptionBatch::<TestBackend>::new(
            Tensor::ones([1, 4], &device),
            Tensor::<TestBackend, 1, Int>::from_ints([3, 7, 0, 0], &device).reshape([1, 4]),
        );
        let metrics = m.trainable_unit_mut().unwrap().fit_batch(batch).unwrap();
        assert_eq!(metrics.accuracy.scored, 2);
        assert!(metrics.loss.is_finite());
    }
}
