// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved:
//   1. Model weights (.mpk.gz file) per epoch
//   2. latest.json       - which epoch was saved last
//   3. train_config.json - the TrainConfig of the run
//
// The config is needed at prediction time: the architecture
// (depth, width, positions, options) must be rebuilt exactly
// before the weights can be loaded into it.
//
// begin_run() drops latest.json before writing a new config, so
// weights of an earlier run are never paired with the config of
// a run that has not saved a checkpoint yet.
//
// File naming convention:
//   build/model/
//     captcha-0001.mpk.gz   ← weights after epoch 1
//     captcha-0002.mpk.gz   ← weights after epoch 2
//     latest.json
//     train_config.json
//     metrics.csv           (written by MetricsLogger)
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::CaptchaModel;

const LATEST_FILE: &str = "latest.json";
const CONFIG_FILE: &str = "train_config.json";

/// Pointer to the most recent checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct LatestCheckpoint {
    epoch: usize,
}

/// Manages saving and loading of model checkpoints.
pub struct CheckpointManager {
    dir:    PathBuf,
    prefix: String,
}

impl CheckpointManager {
    /// Create a new CheckpointManager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, prefix: prefix.into() })
    }

    /// Open an existing checkpoint directory without creating it
    pub fn open(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self { dir: dir.into(), prefix: prefix.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the weights file for an epoch, without the recorder's extension
    fn weights_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{}-{:04}", self.prefix, epoch))
    }

    /// Save model weights for a given epoch and move the latest pointer.
    pub fn save_model<B: Backend>(&self, model: &CaptchaModel<B>, epoch: usize) -> Result<()> {
        let path = self.weights_path(epoch);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join(LATEST_FILE);
        fs::write(&latest_path, serde_json::to_string(&LatestCheckpoint { epoch })?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        tracing::debug!("Saved checkpoint: epoch {} → '{}'", epoch, path.display());
        Ok(())
    }

    /// Load the weights of the latest saved epoch into `model`.
    ///
    /// The model must already have the checkpoint's architecture.
    pub fn load_model<B: Backend>(
        &self,
        model:  CaptchaModel<B>,
        device: &B::Device,
    ) -> Result<CaptchaModel<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.weights_path(epoch);

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display()
                )
            })?;

        Ok(model.load_record(record))
    }

    /// Start a new run: forget the previous latest checkpoint,
    /// then record this run's config.
    pub fn begin_run(&self, cfg: &TrainConfig) -> Result<()> {
        let latest_path = self.dir.join(LATEST_FILE);
        if latest_path.exists() {
            fs::remove_file(&latest_path)
                .with_context(|| format!("Cannot remove '{}'", latest_path.display()))?;
            tracing::debug!("Cleared previous run's '{}'", latest_path.display());
        }
        self.save_config(cfg)
    }

    /// Save the training configuration to JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the training configuration from JSON.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);

        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'predict'.",
                path.display()
            )
        })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }

    /// Epoch number of the most recent checkpoint
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_FILE);

        let s = fs::read_to_string(&path).with_context(|| {
            format!("Cannot find '{}'. Have you run 'train' first?", path.display())
        })?;

        let latest: LatestCheckpoint = serde_json::from_str(&s)
            .with_context(|| format!("Malformed '{}'", path.display()))?;
        Ok(latest.epoch)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::CaptchaModelConfig;

    type TestBackend = burn::backend::NdArray;

    fn tiny_model(device: &<TestBackend as Backend>::Device) -> CaptchaModel<TestBackend> {
        CaptchaModelConfig::new(18, 4, 2, 3)
            .with_image_height(16)
            .with_image_width(16)
            .init(device)
            .unwrap()
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path(), "captcha").unwrap();

        let cfg = TrainConfig { epochs: 7, seed: 3, ..TrainConfig::default() };
        ckpt.save_config(&cfg).unwrap();

        let loaded = ckpt.load_config().unwrap();
        assert_eq!(loaded.epochs, 7);
        assert_eq!(loaded.seed, 3);
    }

    #[test]
    fn test_missing_files_are_errors() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::open(dir.path(), "captcha");
        assert!(ckpt.load_config().is_err());
        let err = ckpt.latest_epoch().unwrap_err();
        assert!(err.to_string().contains("train"));
    }

    #[test]
    fn test_begin_run_forgets_previous_weights() {
        let device = Default::default();
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path(), "captcha").unwrap();

        ckpt.begin_run(&TrainConfig { base_filters: 4, ..TrainConfig::default() }).unwrap();
        ckpt.save_model(&tiny_model(&device), 1).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 1);

        // A second run that stops before its first checkpoint
        ckpt.begin_run(&TrainConfig { base_filters: 8, ..TrainConfig::default() }).unwrap();
        assert_eq!(ckpt.load_config().unwrap().base_filters, 8);
        assert!(ckpt.latest_epoch().is_err());
        assert!(ckpt.load_model(tiny_model(&device), &device).is_err());
    }

    #[test]
    fn test_save_and_load_latest_weights() {
        let device = Default::default();
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path(), "captcha").unwrap();

        let model = tiny_model(&device);
        ckpt.save_model(&model, 1).unwrap();
        ckpt.save_model(&model, 2).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        let images = Tensor::<TestBackend, 4>::ones([1, 1, 16, 16], &device);
        let before: Vec<f32> = model.forward(images.clone()).unwrap().digits[0]
            .clone()
            .into_data()
            .to_vec()
            .unwrap();

        // Fresh weights, then restore from disk
        let restored = ckpt.load_model(tiny_model(&device), &device).unwrap();
        let after: Vec<f32> = restored.forward(images).unwrap().digits[0]
            .clone()
            .into_data()
            .to_vec()
            .unwrap();

        // CompactRecorder stores half precision, so compare loosely
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() <= 0.05 * a.abs().max(1.0), "{a} vs {b}");
        }
    }
}
