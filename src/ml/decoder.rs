// ============================================================
// Layer 5 — Sequence Decoder
// ============================================================
// Recurrent decoder over the composed [image, words...] sequence.
//
//   composed [batch, T, emb]
//       → forward RNN                    [batch, T, H]
//       → (+ reversed RNN, concatenated) [batch, T, 2H]  if bidirectional
//       → time-distributed Linear        [batch, T, vocab_size]
//
// The output length always equals the input length T. The head
// emits raw logits: the objective applies log-softmax itself.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

use crate::domain::config::RnnCellKind;
use crate::ml::recurrent::{Direction, RecurrentLayer, RecurrentLayerConfig};

#[derive(Config, Debug)]
pub struct SequenceDecoderConfig {
    pub cell_kind:  RnnCellKind,
    pub d_input:    usize,
    pub d_hidden:   usize,
    pub vocab_size: usize,
    #[config(default = false)]
    pub bidirectional: bool,
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl SequenceDecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SequenceDecoder<B> {
        let rnn = RecurrentLayerConfig::new(self.cell_kind, self.d_input, self.d_hidden);
        let directions = if self.bidirectional { 2 } else { 1 };

        SequenceDecoder {
            forward_rnn:  rnn.init(device),
            backward_rnn: self.bidirectional.then(|| rnn.init(device)),
            head:         LinearConfig::new(directions * self.d_hidden, self.vocab_size)
                .with_bias(true)
                .init(device),
            dropout:      self.dropout,
            vocab_size:   self.vocab_size,
        }
    }
}

#[derive(Module, Debug)]
pub struct SequenceDecoder<B: Backend> {
    forward_rnn:  RecurrentLayer<B>,
    backward_rnn: Option<RecurrentLayer<B>>,
    head:         Linear<B>,
    dropout:      f64,
    vocab_size:   usize,
}

impl<B: Backend> SequenceDecoder<B> {
    pub fn cell_kind(&self) -> RnnCellKind {
        self.forward_rnn.kind()
    }

    pub fn is_bidirectional(&self) -> bool {
        self.backward_rnn.is_some()
    }

    /// Feature width entering the output head.
    pub fn head_input_width(&self) -> usize {
        let directions = if self.is_bidirectional() { 2 } else { 1 };
        self.forward_rnn.d_hidden() * directions
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Forward: [batch, T, emb] → logits [batch, T, vocab_size]
    pub fn forward(&self, sequence: Tensor<B, 3>) -> Tensor<B, 3> {
        let forward = self
            .forward_rnn
            .forward(sequence.clone(), Direction::Forward, self.dropout);

        let features = match &self.backward_rnn {
            Some(backward_rnn) => {
                let backward = backward_rnn.forward(sequence, Direction::Reversed, self.dropout);
                Tensor::cat(vec![forward, backward], 2)
            }
            None => forward,
        };

        self.head.forward(features)
    }
}
