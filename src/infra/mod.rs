// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File-system concerns used by the training workflow:
//
//   checkpoint.rs — network weights (Burn CompactRecorder) and
//                   the resolved ModelConfig as JSON
//
//   metrics.rs    — per-epoch masked loss/accuracy as CSV
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Network checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
