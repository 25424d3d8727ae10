// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From (image features, caption) pairs to padded tensor batches:
//
//   Vec<CaptionSample>
//       │
//       ▼
//   split_train_val   → seeded shuffle, train/validation cut
//       │
//       ▼
//   CaptionDataset    → implements Burn's Dataset trait
//       │
//       ▼
//   CaptionBatcher    → pads captions per batch, stacks tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Implements Burn's Dataset trait for caption samples
pub mod dataset;

/// Implements Burn's Batcher trait with per-batch padding
pub mod batcher;

/// Seeded shuffle and train/validation split
pub mod splitter;
