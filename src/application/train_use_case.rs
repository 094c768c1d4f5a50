// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the training split        (Layer 4 - data)
//   Step 2: Load or hold out validation    (Layer 4 - data)
//   Step 3: Build Burn datasets            (Layer 4 - data)
//   Step 4: Start run, save config         (Layer 6 - infra)
//   Step 5: Run training loop              (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::CaptchaDataset,
    loader::ImageDirLoader,
    splitter::split_train_val,
};
use crate::domain::captcha::{CAPTCHA_LENGTH, CAPTCHA_OPTIONS, IMAGE_HEIGHT, IMAGE_WIDTH};
use crate::domain::traits::SampleSource;
use crate::domain::usage::Usage;
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::model::CaptchaModelConfig;
use crate::ml::trainer::{run_training, TrainingResult};

/// Name prefix of every checkpoint file
pub const MODEL_NAME: &str = "captcha";

/// Share of the training images kept for training when no
/// validation split exists on disk
const HOLD_OUT_TRAIN_FRACTION: f64 = 0.8;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Serialisable so it can be saved to disk and reloaded for prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:       String,
    pub output_dir:     String,
    pub epochs:         usize,
    pub batch_size:     usize,
    pub max_gpus:       usize,
    pub max_iterations: Option<usize>,
    pub learning_rate:  f64,
    pub num_layers:     usize,
    pub base_filters:   usize,
    pub seed:           u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:       "data/captcha".to_string(),
            output_dir:     "build/model".to_string(),
            epochs:         2,
            batch_size:     32,
            max_gpus:       1,
            max_iterations: None,
            learning_rate:  1e-3,
            num_layers:     50,
            base_filters:   64,
            seed:           42,
        }
    }
}

impl TrainConfig {
    /// Architecture implied by this config: a ResNet whose output width
    /// is CAPTCHA_LENGTH * CAPTCHA_OPTIONS over single-channel images.
    pub fn model_config(&self) -> CaptchaModelConfig {
        CaptchaModelConfig::new(self.num_layers, self.base_filters, CAPTCHA_LENGTH, CAPTCHA_OPTIONS)
            .with_channels(1)
            .with_image_height(IMAGE_HEIGHT)
            .with_image_width(IMAGE_WIDTH)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingResult> {
        let cfg = &self.config;

        // ── Steps 1-3: Datasets ───────────────────────────────────────────────
        let loader = ImageDirLoader::new(&cfg.data_dir);
        let (train, validate) = self.datasets(&loader)?;
        tracing::info!(
            "Datasets ready: {} train, {} validation samples",
            train.sample_count(),
            validate.sample_count()
        );

        // ── Step 4: Start the run, save config for prediction ─────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.output_dir, MODEL_NAME)?;
        ckpt_manager.begin_run(cfg)?;
        let metrics = MetricsLogger::new(ckpt_manager.dir(), CAPTCHA_LENGTH)?;

        // ── Step 5: Run training loop (Layer 5) ───────────────────────────────
        run_training(cfg, train, validate, &ckpt_manager, &metrics)
    }

    /// Build the train and validation datasets from a sample source.
    /// Without a validation split on disk, part of the training
    /// images is held out instead.
    pub fn datasets(&self, loader: &ImageDirLoader) -> Result<(CaptchaDataset, CaptchaDataset)> {
        let cfg = &self.config;

        let train_builder = CaptchaDataset::builder()
            .usage(Usage::Train)
            .sampling(cfg.batch_size, true)
            .max_iteration(cfg.max_iterations);
        let val_builder = CaptchaDataset::builder()
            .usage(Usage::Validation)
            .sampling(cfg.batch_size, true)
            .max_iteration(cfg.max_iterations);

        if loader.has_split(Usage::Validation) {
            let train    = train_builder.build()?.prepare(loader)?;
            let validate = val_builder.build()?.prepare(loader)?;
            return Ok((train, validate));
        }

        tracing::warn!(
            "No '{}' split under '{}', holding out {:.0}% of the training images",
            Usage::Validation,
            cfg.data_dir,
            (1.0 - HOLD_OUT_TRAIN_FRACTION) * 100.0
        );
        let all = loader.load_all(Usage::Train)?;
        let (train_samples, val_samples) = split_train_val(all, HOLD_OUT_TRAIN_FRACTION, cfg.seed);

        Ok((
            train_builder.build()?.with_samples(train_samples),
            val_builder.build()?.with_samples(val_samples),
        ))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use std::{fs, path::Path};

    fn write_images(dir: &Path, labels: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        for label in labels {
            GrayImage::new(IMAGE_WIDTH as u32, IMAGE_HEIGHT as u32)
                .save(dir.join(format!("{label}.png")))
                .unwrap();
        }
    }

    fn use_case(data_dir: &Path) -> TrainUseCase {
        TrainUseCase::new(TrainConfig {
            data_dir:   data_dir.display().to_string(),
            batch_size: 2,
            ..TrainConfig::default()
        })
    }

    #[test]
    fn test_model_config_matches_captcha_geometry() {
        let m = TrainConfig::default().model_config();
        assert_eq!(m.positions * m.options, CAPTCHA_LENGTH * CAPTCHA_OPTIONS);
        assert_eq!((m.image_height, m.image_width), (IMAGE_HEIGHT, IMAGE_WIDTH));
    }

    #[test]
    fn test_uses_validation_split_when_present() {
        let root = tempfile::tempdir().unwrap();
        write_images(&root.path().join("train"), &["00000", "11111", "22222"]);
        write_images(&root.path().join("validation"), &["33333"]);

        let loader = ImageDirLoader::new(root.path());
        let (train, validate) = use_case(root.path()).datasets(&loader).unwrap();
        assert_eq!(train.sample_count(), 3);
        assert_eq!(validate.sample_count(), 1);
    }

    #[test]
    fn test_holds_out_when_validation_missing() {
        let root = tempfile::tempdir().unwrap();
        let labels: Vec<String> = (0..10).map(|i| format!("{i}{i}{i}{i}{i}")).collect();
        let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        write_images(&root.path().join("train"), &refs);

        let loader = ImageDirLoader::new(root.path());
        let (train, validate) = use_case(root.path()).datasets(&loader).unwrap();
        assert_eq!(train.sample_count(), 8);
        assert_eq!(validate.sample_count(), 2);
        assert_eq!(validate.usage(), Usage::Validation);
    }

    #[test]
    fn test_max_iterations_keeps_every_sample() {
        let root   = tempfile::tempdir().unwrap();
        let labels: Vec<String> = (0..10).map(|i| format!("{i}{i}{i}{i}{i}")).collect();
        let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        write_images(&root.path().join("train"), &refs);
        write_images(&root.path().join("validation"), &refs);

        let use_case = TrainUseCase::new(TrainConfig {
            data_dir:       root.path().display().to_string(),
            batch_size:     2,
            max_iterations: Some(1),
            ..TrainConfig::default()
        });
        let loader = ImageDirLoader::new(root.path());
        let (train, validate) = use_case.datasets(&loader).unwrap();

        // The cap limits batches per epoch, not which labels exist
        assert_eq!(train.sample_count(), 10);
        assert_eq!(validate.sample_count(), 10);
        assert_eq!(train.num_iterations(), 1);
        assert_eq!(validate.num_iterations(), 1);
    }

    #[test]
    fn test_config_serialises_to_json() {
        let json = serde_json::to_string(&TrainConfig::default()).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.num_layers, 50);
        assert_eq!(back.max_iterations, None);
    }
}
