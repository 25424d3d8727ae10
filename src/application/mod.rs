// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only:
//   - No ML math or model code here
//   - No argument parsing or printing (that's Layer 1)
//
// Reference: Clean Architecture pattern

/// The reference training workflow
pub mod train_use_case;
