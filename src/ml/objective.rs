// ============================================================
// Layer 5 — Masked Objective (loss + accuracy)
// ============================================================
// Scores decoder logits against the padded caption.
//
// Timestep alignment:
//   composed input : [img, w0, w1, ..., w(L-2)]
//   decoder output : [o0,  o1, o2, ..., o(L-1)]
//   targets        : [w0,  w1, w2, ..., w(L-1)]
//
//   o0 has only seen the image, so it predicts w0; o(t) predicts
//   w(t). Decoder length must EQUAL target length. The injected
//   image step shifts the inputs, it does not add an extra score
//   to throw away. Any other length is a shape error.
//
// Masking:
//   positions whose target is PAD_ID count neither in the
//   numerator nor in the denominator, so
//
//     loss     = Σ_valid −log softmax(o_t)[w_t]  /  #valid
//     accuracy = Σ_valid [argmax(o_t) == w_t]    /  #valid
//
//   #valid comes from the batch itself, never from a fixed length.
//   A batch with no valid position scores 0 for both.
//
// Cross-entropy is computed with log-softmax on the logits, not
// on already-normalised probabilities, so it cannot underflow.

use burn::{prelude::*, tensor::activation::log_softmax};

use crate::domain::caption::PAD_ID;
use crate::domain::error::{CaptionError, CaptionResult};

// ─── MaskedAccuracy ───────────────────────────────────────────────────────────
/// Correct predictions over scored (non-padding) positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskedAccuracy {
    pub correct: usize,
    pub scored:  usize,
}

impl MaskedAccuracy {
    /// Fraction correct; 0.0 when nothing was scored.
    pub fn value(&self) -> f64 {
        if self.scored == 0 {
            0.0
        } else {
            self.correct as f64 / self.scored as f64
        }
    }

    /// Pool counts across batches (a position-weighted average).
    pub fn combine(self, other: Self) -> Self {
        Self {
            correct: self.correct + other.correct,
            scored:  self.scored + other.scored,
        }
    }
}

// ─── MaskedObjective ──────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskedObjective {
    pad_id: u32,
}

impl Default for MaskedObjective {
    fn default() -> Self {
        Self { pad_id: PAD_ID }
    }
}

impl MaskedObjective {
    pub fn new(pad_id: u32) -> Self {
        Self { pad_id }
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    /// logits [batch, T, vocab] must line up with targets [batch, T].
    pub fn check_alignment<B: Backend>(
        &self,
        logits:  &Tensor<B, 3>,
        targets: &Tensor<B, 2, Int>,
    ) -> CaptionResult<()> {
        let [logit_batch, logit_steps, vocab] = logits.dims();
        let [target_batch, target_steps] = targets.dims();
        if logit_batch != target_batch || logit_steps != target_steps {
            return Err(CaptionError::shape(
                "masked objective",
                format!("[{target_batch}, {target_steps}, {vocab}]"),
                format!("[{logit_batch}, {logit_steps}, {vocab}]"),
            ));
        }
        Ok(())
    }

    /// 1.0 where the target is a real token, 0.0 at padding.
    pub fn mask<B: Backend>(&self, targets: &Tensor<B, 2, Int>) -> Tensor<B, 2> {
        targets.clone().not_equal_elem(self.pad_id as i64).float()
    }

    /// Number of positions that enter the loss and accuracy denominators.
    pub fn scored_positions<B: Backend>(&self, targets: &Tensor<B, 2, Int>) -> usize {
        self.mask(targets).sum().into_scalar().elem::<f64>().round() as usize
    }

    /// Mean cross-entropy over non-padding positions. Shape [1].
    pub fn loss<B: Backend>(
        &self,
        logits:  Tensor<B, 3>,
        targets: Tensor<B, 2, Int>,
    ) -> CaptionResult<Tensor<B, 1>> {
        self.check_alignment(&logits, &targets)?;
        let [batch, steps, _] = logits.dims();

        let log_probs = log_softmax(logits, 2);
        let target_log_probs = log_probs
            .gather(2, targets.clone().unsqueeze_dim::<3>(2))
            .reshape([batch, steps]);

        let mask = self.mask(&targets);
        let count = mask.clone().sum().clamp_min(1.0);
        Ok((target_log_probs * mask).sum().neg() / count)
    }

    /// Argmax accuracy over non-padding positions.
    pub fn accuracy<B: Backend>(
        &self,
        logits:  Tensor<B, 3>,
        targets: Tensor<B, 2, Int>,
    ) -> CaptionResult<MaskedAccuracy> {
        self.check_alignment(&logits, &targets)?;
        let [batch, steps, _] = logits.dims();

        let predictions = logits.argmax(2).reshape([batch, steps]);
        let valid = targets.clone().not_equal_elem(self.pad_id as i64).int();
        let hits = predictions.equal(targets).int() * valid.clone();

        let correct = hits.sum().into_scalar().elem::<i64>();
        let scored = valid.sum().into_scalar().elem::<i64>();
        Ok(MaskedAccuracy {
            correct: correct.max(0) as usize,
            scored:  scored.max(0) as usize,
        })
    }

    /// Loss and accuracy from one forward pass.
    pub fn score<B: Backend>(
        &self,
        logits:  Tensor<B, 3>,
        targets: Tensor<B, 2, Int>,
    ) -> CaptionResult<(Tensor<B, 1>, MaskedAccuracy)> {
        let accuracy = self.accuracy(logits.clone().detach(), targets.clone())?;
        let loss = self.loss(logits, targets)?;
        Ok((loss, accuracy))
    }
}
