// ============================================================
// Layer 5 - Inferencer
// ============================================================
use anyhow::{ensure, Result};
use burn::prelude::*;
use std::fmt;

use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::CaptchaModel;

/// Predicted digits plus the softmax probability of each choice
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub digits:      Vec<usize>,
    pub confidences: Vec<f32>,
}

impl Prediction {
    /// Joint confidence: product of the per-position probabilities
    pub fn confidence(&self) -> f32 {
        self.confidences.iter().product()
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.digits {
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

pub struct Inferencer<B: Backend> {
    model:  CaptchaModel<B>,
    height: usize,
    width:  usize,
    device: B::Device,
}

impl<B: Backend> Inferencer<B> {
    /// Rebuild the architecture from the saved config, then load weights.
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, device: B::Device) -> Result<Self> {
        let cfg       = ckpt_manager.load_config()?;
        let model_cfg = cfg.model_config();
        let model     = model_cfg.init::<B>(&device)?;
        let model     = ckpt_manager.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint");
        Ok(Self::new(model, model_cfg.image_height, model_cfg.image_width, device))
    }

    pub fn new(model: CaptchaModel<B>, height: usize, width: usize, device: B::Device) -> Self {
        Self { model, height, width, device }
    }

    /// pixels: one preprocessed grayscale image, row-major, height * width values
    pub fn predict(&self, pixels: Vec<f32>) -> Result<Prediction> {
        ensure!(
            pixels.len() == self.height * self.width,
            "expected {} pixels ({}x{}), got {}",
            self.height * self.width,
            self.width,
            self.height,
            pixels.len()
        );

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [1, 1, self.height, self.width]),
            &self.device,
        );
        let output = self.model.forward(images)?;

        let mut digits      = Vec::with_capacity(output.digits.len());
        let mut confidences = Vec::with_capacity(output.digits.len());

        for logits in output.digits {
            let probs: Vec<f32> = burn::tensor::activation::softmax(logits, 1)
                .into_data()
                .convert::<f32>()
                .to_vec()
                .map_err(|e| anyhow::anyhow!("Cannot read probabilities: {e:?}"))?;

            let (best, p) = probs
                .iter()
                .copied()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });

            digits.push(best);
            confidences.push(p);
        }

        let prediction = Prediction { digits, confidences };
        tracing::debug!("Predicted '{}' conf={:.4}", prediction, prediction.confidence());
        Ok(prediction)
    }
}
