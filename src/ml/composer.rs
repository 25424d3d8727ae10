// ============================================================
// Layer 5 — Sequence Composer
// ============================================================
// Puts the image step in front of the word steps:
//
//   image [batch, 1, emb] ++ words [batch, len, emb]
//       → [batch, 1 + len, emb]     (index 0 = image)
//
// No parameters. A caption of length one has no word input under
// teacher forcing, in which case the image step is the whole
// sequence.

use burn::prelude::*;

use crate::domain::error::{CaptionError, CaptionResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceComposer;

impl SequenceComposer {
    pub fn new() -> Self {
        Self
    }

    pub fn compose<B: Backend>(
        &self,
        image: Tensor<B, 3>,
        words: Option<Tensor<B, 3>>,
    ) -> CaptionResult<Tensor<B, 3>> {
        let [image_batch, image_steps, image_width] = image.dims();
        if image_steps != 1 {
            return Err(CaptionError::shape(
                "sequence composer",
                format!("[{image_batch}, 1, {image_width}]"),
                format!("{:?}", image.dims()),
            ));
        }

        let Some(words) = words else {
            return Ok(image);
        };

        let [word_batch, word_steps, word_width] = words.dims();
        if word_batch != image_batch || word_width != image_width {
            return Err(CaptionError::shape(
                "sequence composer",
                format!("[{image_batch}, {word_steps}, {image_width}]"),
                format!("[{word_batch}, {word_steps}, {word_width}]"),
            ));
        }
        Ok(Tensor::cat(vec![image, words], 1))
    }
}
