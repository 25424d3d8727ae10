// ============================================================
// Layer 3 — Caption Domain Type
// ============================================================
// A caption is an ordered list of token ids. Captions in a batch
// differ in length, so they are right-padded with PAD_ID up to the
// longest caption of that batch. Padding carries no information:
// it is embedded like any other token but excluded from every loss
// and accuracy computation by position.
//
// Example (pad id 0, batch max length 4):
//   [3, 7]       → [3, 7, 0, 0]   real length 2
//   [5, 9, 2, 4] → [5, 9, 2, 4]   real length 4

use serde::{Deserialize, Serialize};

/// Reserved token id for padding. Never a real vocabulary entry.
pub const PAD_ID: u32 = 0;

/// A tokenised caption before batching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caption {
    pub tokens: Vec<u32>,
}

impl Caption {
    pub fn new(tokens: Vec<u32>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of non-padding tokens.
    pub fn real_length(&self) -> usize {
        self.tokens.iter().filter(|&&t| t != PAD_ID).count()
    }

    /// Copy of the tokens right-padded with PAD_ID to `len`.
    /// Captions longer than `len` are returned unchanged.
    pub fn padded_to(&self, len: usize) -> Vec<u32> {
        let mut tokens = self.tokens.clone();
        if tokens.len() < len {
            tokens.resize(len, PAD_ID);
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_preserves_order() {
        let c = Caption::new(vec![3, 7]);
        assert_eq!(c.padded_to(4), vec![3, 7, 0, 0]);
        assert_eq!(c.real_length(), 2);
    }

    #[test]
    fn test_no_padding_when_already_long_enough() {
        let c = Caption::new(vec![5, 9, 2, 4]);
        assert_eq!(c.padded_to(3), vec![5, 9, 2, 4]);
        assert_eq!(c.real_length(), 4);
    }
}
