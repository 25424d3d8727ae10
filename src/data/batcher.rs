// ============================================================
// Layer 4 — Caption Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<CaptionSample>
// into tensors for the trainable unit.
//
// Captions have different lengths, so padding happens HERE,
// per batch: every caption is right-padded with PAD_ID up to the
// longest caption in this batch only. Two batches from the same
// loader may therefore have different time lengths; the model
// and the objective never assume a fixed length.
//
//   Input:  N samples, feature width F, caption lengths l1..lN
//   Output: image_features [N, F], captions [N, max(l1..lN)]
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::CaptionSample;

// ─── CaptionBatch ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct CaptionBatch<B: Backend> {
    /// Precomputed image features — shape: [batch_size, feature_width]
    pub image_features: Tensor<B, 2>,

    /// Right-padded caption token ids — shape: [batch_size, max_len]
    /// Serves both as teacher-forcing input and as the target.
    pub captions: Tensor<B, 2, Int>,
}

impl<B: Backend> CaptionBatch<B> {
    pub fn new(image_features: Tensor<B, 2>, captions: Tensor<B, 2, Int>) -> Self {
        Self { image_features, captions }
    }

    pub fn batch_size(&self) -> usize {
        self.captions.dims()[0]
    }

    pub fn caption_len(&self) -> usize {
        self.captions.dims()[1]
    }
}

// ─── CaptionBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct CaptionBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> CaptionBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<CaptionSample, CaptionBatch<B>> for CaptionBatcher<B> {
    fn batch(&self, items: Vec<CaptionSample>) -> CaptionBatch<B> {
        let batch_size    = items.len();
        let feature_width = items.first().map(|s| s.feature_width()).unwrap_or(0);
        let max_len       = items.iter().map(|s| s.caption.len()).max().unwrap_or(0);

        let features_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.image_features.iter().copied())
            .collect();

        // Pad every caption to this batch's longest caption
        let captions_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.caption.padded_to(max_len).into_iter().map(|t| t as i32))
            .collect();

        let image_features = Tensor::<B, 1>::from_floats(
            features_flat.as_slice(), &self.device
        ).reshape([batch_size, feature_width]);

        let captions = Tensor::<B, 1, Int>::from_ints(
            captions_flat.as_slice(), &self.device
        ).reshape([batch_size, max_len]);

        CaptionBatch { image_features, captions }
    }
}
