//! Image captioning on Burn.
//!
//! An [`ml::model::ImageCaptioningModel`] resolves its hyperparameters
//! against the process-wide [`domain::defaults`], builds its trainable
//! unit once, and trains it with teacher forcing and a padding-masked
//! cross-entropy objective.

#![recursion_limit = "256"]

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod infra;
pub mod ml;

pub use domain::config::{ModelConfig, ModelOverrides, RnnCellKind};
pub use domain::error::{CaptionError, CaptionResult};
pub use ml::model::ImageCaptioningModel;
