// ============================================================
// Layer 5 — Image Feature Extractor Seam
// ============================================================
// The pretrained convolutional network that turns an image into a
// fixed-width vector lives outside this crate. It is consumed
// through the `FeatureExtractor` trait.
//
// Freezing: the trainable unit always runs the extractor on the
// *inner* (non-autodiff) backend and lifts the result into the
// autodiff graph with `Tensor::from_inner`. The result is a
// constant from the optimiser's point of view, so no gradient can
// ever reach the extractor's parameters.

use burn::prelude::*;

pub trait FeatureExtractor<B: Backend> {
    /// Width of one feature vector; must equal the projector's input width.
    fn output_width(&self) -> usize;

    /// Parameter count, reported in the frozen parameter group.
    fn num_params(&self) -> usize {
        0
    }

    /// images: [batch, channels, height, width] → [batch, output_width]
    fn extract(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;
}

/// Global average pooling over the spatial axes: [b, c, h, w] → [b, c].
///
/// Stands in for a pretrained backbone whose last feature map is
/// already computed; also useful in tests.
#[derive(Debug, Clone, Copy)]
pub struct GlobalAveragePool {
    channels: usize,
}

impl GlobalAveragePool {
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl<B: Backend> FeatureExtractor<B> for GlobalAveragePool {
    fn output_width(&self) -> usize {
        self.channels
    }

    fn extract(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch, channels, height, width] = images.dims();
        images
            .reshape([batch, channels, height * width])
            .mean_dim(2)
            .reshape([batch, channels])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_average_pool_shape_and_values() {
        let device = Default::default();
        let images = Tensor::<NdArray, 4>::from_floats(
            [[[[1.0, 3.0], [5.0, 7.0]], [[2.0, 2.0], [2.0, 2.0]]]],
            &device,
        );
        let pool = GlobalAveragePool::new(2);
        let features = FeatureExtractor::<NdArray>::extract(&pool, images);
        assert_eq!(features.dims(), [1, 2]);
        let values = features.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![4.0, 2.0]);
    }
}
