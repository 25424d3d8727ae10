// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Persists the caption network's weights with Burn's
// CompactRecorder, next to the resolved ModelConfig needed to
// rebuild the same architecture before loading them.
//
//   checkpoints/
//     network_epoch_3.mpk.gz   ← weights after the best epoch so far
//     best_epoch.json          ← epoch number of that file
//     model_config.json        ← resolved ModelConfig
//
// The optimiser state and the frozen extractor are not saved.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::domain::config::ModelConfig;
use crate::ml::network::CaptionNetwork;

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Record the network weights for `epoch` and mark it as the best one.
    pub fn save_network<B: Backend>(&self, network: &CaptionNetwork<B>, epoch: usize) -> Result<()> {
        let path = self.dir.join(format!("network_epoch_{epoch}"));

        CompactRecorder::new()
            .record(network.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        fs::write(self.dir.join("best_epoch.json"), serde_json::to_string(&epoch)?)
            .context("Failed to write best_epoch.json")?;

        tracing::debug!("Saved network checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Rebuild the saved architecture and restore the best weights into it.
    pub fn load_network<B: Backend>(&self, device: &B::Device) -> Result<CaptionNetwork<B>> {
        let config = self.load_config()?;
        let epoch  = self.best_epoch()?;
        let path   = self.dir.join(format!("network_epoch_{epoch}"));

        tracing::info!("Loading network checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;

        Ok(config.init::<B>(device).load_record(record))
    }

    pub fn save_config(&self, config: &ModelConfig) -> Result<()> {
        let path = self.dir.join("model_config.json");
        fs::write(&path, serde_json::to_string_pretty(config)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<ModelConfig> {
        let path = self.dir.join("model_config.json");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        let config: ModelConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    fn best_epoch(&self) -> Result<usize> {
        let s = fs::read_to_string(self.dir.join("best_epoch.json"))
            .context("Cannot find 'best_epoch.json'. Has a training run saved a checkpoint?")?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
