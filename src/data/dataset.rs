// ============================================================
// Layer 4 — Caption Dataset
// ============================================================
// In-memory (image features, caption) pairs behind Burn's
// Dataset trait. Captions keep their natural length here;
// padding is the batcher's job.
//
// Reference: Burn Book §4 (Datasets)

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::caption::Caption;

/// One (image, caption) training pair. The image is already reduced to
/// its feature vector by the external extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSample {
    pub image_features: Vec<f32>,
    pub caption:        Caption,
}

impl CaptionSample {
    pub fn new(image_features: Vec<f32>, tokens: Vec<u32>) -> Self {
        Self { image_features, caption: Caption::new(tokens) }
    }

    pub fn feature_width(&self) -> usize {
        self.image_features.len()
    }
}

pub struct CaptionDataset {
    samples: Vec<CaptionSample>,
}

impl CaptionDataset {
    pub fn new(samples: Vec<CaptionSample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    /// Longest caption in the dataset (upper bound on any batch length).
    pub fn max_caption_len(&self) -> usize {
        self.samples.iter().map(|s| s.caption.len()).max().unwrap_or(0)
    }
}

impl Dataset<CaptionSample> for CaptionDataset {
    fn get(&self, index: usize) -> Option<CaptionSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_keeps_natural_lengths() {
        let ds = CaptionDataset::new(vec![
            CaptionSample::new(vec![0.1, 0.2], vec![4, 2]),
            CaptionSample::new(vec![0.3, 0.4], vec![1, 5, 3]),
        ]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.max_caption_len(), 3);
        assert_eq!(ds.get(0).unwrap().caption.len(), 2);
        assert!(ds.get(2).is_none());
    }
}
