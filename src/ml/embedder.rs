// ============================================================
// Layer 5 — Word Sequence Embedder
// ============================================================
// Learned token embeddings: vocabulary → embedding_size.
// The sequence length is not fixed at construction; every batch
// may be padded to a different length. Padded positions are
// embedded like real tokens; masking happens in the objective.

use burn::{
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
};

#[derive(Config, Debug)]
pub struct WordSequenceEmbedderConfig {
    pub vocab_size:     usize,
    pub embedding_size: usize,
}

impl WordSequenceEmbedderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> WordSequenceEmbedder<B> {
        WordSequenceEmbedder {
            embedding:  EmbeddingConfig::new(self.vocab_size, self.embedding_size).init(device),
            vocab_size: self.vocab_size,
        }
    }
}

#[derive(Module, Debug)]
pub struct WordSequenceEmbedder<B: Backend> {
    embedding:  Embedding<B>,
    vocab_size: usize,
}

impl<B: Backend> WordSequenceEmbedder<B> {
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Forward: [batch, seq_len] → [batch, seq_len, embedding_size]
    pub fn forward(&self, token_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.embedding.forward(token_ids)
    }
}
