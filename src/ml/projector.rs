// ============================================================
// Layer 5 — Image Feature Projector
// ============================================================
// Maps the extractor's fixed-width feature vector into the word
// embedding space and gives it a time axis of length one, so the
// image can sit in front of the caption as step 0.
//
//   features [batch, feature_width]
//       → Linear (with bias)   [batch, embedding_size]
//       → unsqueeze(1)         [batch, 1, embedding_size]

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

use crate::domain::error::{CaptionError, CaptionResult};

#[derive(Config, Debug)]
pub struct ImageFeatureProjectorConfig {
    pub feature_width:  usize,
    pub embedding_size: usize,
}

impl ImageFeatureProjectorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ImageFeatureProjector<B> {
        let dense = LinearConfig::new(self.feature_width, self.embedding_size)
            .with_bias(true)
            .init(device);
        ImageFeatureProjector { dense, feature_width: self.feature_width }
    }
}

#[derive(Module, Debug)]
pub struct ImageFeatureProjector<B: Backend> {
    dense:         Linear<B>,
    feature_width: usize,
}

impl<B: Backend> ImageFeatureProjector<B> {
    pub fn feature_width(&self) -> usize {
        self.feature_width
    }

    /// Forward: [batch, feature_width] → [batch, 1, embedding_size]
    pub fn forward(&self, features: Tensor<B, 2>) -> CaptionResult<Tensor<B, 3>> {
        let [batch, width] = features.dims();
        if width != self.feature_width {
            return Err(CaptionError::shape(
                "image projector",
                format!("[{batch}, {}]", self.feature_width),
                format!("[{batch}, {width}]"),
            ));
        }
        Ok(self.dense.forward(features).unsqueeze_dim::<3>(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_projection_adds_single_timestep() {
        let device = Default::default();
        let projector = ImageFeatureProjectorConfig::new(6, 4).init::<NdArray>(&device);
        let out = projector
            .forward(Tensor::<NdArray, 2>::ones([3, 6], &device))
            .unwrap();
        assert_eq!(out.dims(), [3, 1, 4]);
    }

    #[test]
    fn test_wrong_feature_width_rejected() {
        let device = Default::default();
        let projector = ImageFeatureProjectorConfig::new(6, 4).init::<NdArray>(&device);
        let err = projector
            .forward(Tensor::<NdArray, 2>::ones([3, 5], &device))
            .unwrap_err();
        assert!(matches!(err, CaptionError::ShapeMismatch { stage: "image projector", .. }));
    }
}
