// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that define the captioning problem:
// hyperparameters, the process-wide defaults they fall back to,
// captions and their padding, and the error taxonomy.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and functions
//
// Reference: Rust Book §5 (Structs), §9 (Error Handling)

// Tokenised captions and the padding id
pub mod caption;

// ModelOverrides → ModelConfig resolution and validation
pub mod config;

// Process-wide default configuration
pub mod defaults;

// CaptionError taxonomy
pub mod error;
