// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes to Layer 2. Nothing here
// computes; the only side effect besides dispatch is installing
// a --defaults file as the process-wide default configuration.
//
//   1. `train`  — train on synthetic captions, Wgpu or NdArray
//   2. `config` — print the resolved ModelConfig as JSON
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{Context, Result};
use burn::backend::{Autodiff, NdArray, Wgpu};
use clap::Parser;
use commands::{Commands, ConfigArgs, ModelArgs, TrainArgs};

use crate::application::train_use_case::{TrainConfig, TrainUseCase};
use crate::domain::config::ModelConfig;
use crate::domain::defaults::{active_config, set_active_config, DefaultConfig};

type GpuBackend = Autodiff<Wgpu>;
type CpuBackend = Autodiff<NdArray>;

#[derive(Parser, Debug)]
#[command(
    name = "image-captioning",
    version = "0.1.0",
    about = "Build and train an image-captioning model (projected image step + word embeddings → GRU/LSTM → per-step vocabulary scores)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)  => run_train(args),
            Commands::Config(args) => run_config(args),
        }
    }
}

/// Install `--defaults` (when given) as the active default configuration.
fn install_defaults(model: &ModelArgs) -> Result<()> {
    if let Some(path) = &model.defaults {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read defaults file '{path}'"))?;
        let defaults = DefaultConfig::from_json_str(&json)
            .with_context(|| format!("Invalid defaults file '{path}'"))?;
        set_active_config(defaults);
        tracing::info!("Loaded default configuration from '{}'", path);
    }
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    install_defaults(&args.model)?;
    let cpu = args.cpu;
    let use_case = TrainUseCase::new(TrainConfig::from(args));

    let history = if cpu {
        tracing::info!("Training on NdArray (CPU)");
        use_case.execute::<CpuBackend>(Default::default())?
    } else {
        tracing::info!("Training on Wgpu");
        use_case.execute::<GpuBackend>(Default::default())?
    };

    if let Some(last) = history.last() {
        println!(
            "Training complete: val_loss={:.4}, val_acc={:.1}% after {} epochs.",
            last.val_loss,
            last.val_acc * 100.0,
            last.epoch,
        );
    }
    Ok(())
}

fn run_config(args: ConfigArgs) -> Result<()> {
    install_defaults(&args.model)?;
    let config = ModelConfig::resolve(args.model.into(), &active_config())?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
