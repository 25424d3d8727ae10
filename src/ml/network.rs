// ============================================================
// Layer 5 — Caption Network (the trainable graph)
// ============================================================
// Wires the four stages together:
//
//   image features ─→ ImageFeatureProjector ─┐
//                                            ├─→ SequenceComposer ─→ SequenceDecoder ─→ logits
//   word ids       ─→ WordSequenceEmbedder  ─┘
//
// Only this module's parameters are handed to the optimiser; the
// image feature extractor sits outside it (see extractor.rs).

use burn::prelude::*;

use crate::domain::config::ModelConfig;
use crate::domain::error::CaptionResult;
use crate::ml::{
    composer::SequenceComposer,
    decoder::{SequenceDecoder, SequenceDecoderConfig},
    embedder::{WordSequenceEmbedder, WordSequenceEmbedderConfig},
    projector::{ImageFeatureProjector, ImageFeatureProjectorConfig},
};

impl ModelConfig {
    /// Build a freshly initialised network on `device`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> CaptionNetwork<B> {
        let projector = ImageFeatureProjectorConfig::new(self.image_feature_width, self.embedding_size);
        let embedder  = WordSequenceEmbedderConfig::new(self.vocab_size, self.embedding_size);
        let decoder   = SequenceDecoderConfig::new(
            self.rnn_cell_kind,
            self.embedding_size,
            self.rnn_hidden_size,
            self.vocab_size,
        )
        .with_bidirectional(self.bidirectional)
        .with_dropout(self.dropout_rate);

        CaptionNetwork {
            projector: projector.init(device),
            embedder:  embedder.init(device),
            decoder:   decoder.init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct CaptionNetwork<B: Backend> {
    pub projector: ImageFeatureProjector<B>,
    pub embedder:  WordSequenceEmbedder<B>,
    pub decoder:   SequenceDecoder<B>,
}

impl<B: Backend> CaptionNetwork<B> {
    /// image_features: [batch, feature_width]
    /// word_ids:       [batch, L-1] teacher-forcing inputs, or None when L == 1
    /// returns logits: [batch, L, vocab_size]
    pub fn forward(
        &self,
        image_features: Tensor<B, 2>,
        word_ids:       Option<Tensor<B, 2, Int>>,
    ) -> CaptionResult<Tensor<B, 3>> {
        let image = self.projector.forward(image_features)?;
        let words = word_ids.map(|ids| self.embedder.forward(ids));
        let sequence = SequenceComposer::new().compose(image, words)?;
        Ok(self.decoder.forward(sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::ModelOverrides;
    use crate::domain::defaults::DefaultConfig;
    use burn::backend::NdArray;

    #[test]
    fn test_logit_length_is_one_more_than_word_input() {
        let device = Default::default();
        let config = ModelConfig::resolve(
            ModelOverrides::new()
                .with_vocab_size(9)
                .with_embedding_size(4)
                .with_rnn_hidden_size(3)
                .with_image_feature_width(6),
            &DefaultConfig::default(),
        )
        .unwrap();
        let network = config.init::<NdArray>(&device);

        let features = Tensor::<NdArray, 2>::ones([2, 6], &device);
        let words = Tensor::<NdArray, 2, Int>::ones([2, 3], &device);
        let logits = network.forward(features.clone(), Some(words)).unwrap();
        assert_eq!(logits.dims(), [2, 4, 9]);

        let logits = network.forward(features, None).unwrap();
        assert_eq!(logits.dims(), [2, 1, 9]);
    }
}
