// ============================================================
// Layer 2 - Predict Use Case
// ============================================================
// Reads one image with the training-time preprocessing, then
// asks the checkpointed model for its digits.

use anyhow::Result;
use burn::prelude::*;
use std::path::{Path, PathBuf};

use crate::application::train_use_case::MODEL_NAME;
use crate::data::loader::ImageDirLoader;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::{Inferencer, Prediction};

pub struct PredictUseCase {
    ckpt_manager: CheckpointManager,
    max_gpus:     usize,
}

impl PredictUseCase {
    pub fn new(output_dir: impl Into<PathBuf>, max_gpus: usize) -> Self {
        Self {
            ckpt_manager: CheckpointManager::open(output_dir, MODEL_NAME),
            max_gpus,
        }
    }

    pub fn predict(&self, image: &Path) -> Result<Prediction> {
        // Loader root is irrelevant for a single explicit path
        let pixels = ImageDirLoader::new(".").load_pixels(image)?;

        if self.max_gpus == 0 {
            self.run::<burn::backend::NdArray>(pixels, Default::default())
        } else {
            self.run::<burn::backend::Wgpu>(pixels, Default::default())
        }
    }

    fn run<B: Backend>(&self, pixels: Vec<f32>, device: B::Device) -> Result<Prediction> {
        let inferencer = Inferencer::<B>::from_checkpoint(&self.ckpt_manager, device)?;
        inferencer.predict(pixels)
    }
}
