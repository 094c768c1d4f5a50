// ============================================================
// Layer 4 - CAPTCHA Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<CaptchaSample>
// into tensors on the target device.
//
// How batching works here:
//   Input:  Vec of N samples, each H*W grayscale pixels + P digits
//   Output: images [N, 1, H, W] (float), labels [N, P] (int)
//
//   All pixel buffers are concatenated in order, then reshaped:
//   [s1_p1, ..., s1_pHW, s2_p1, ..., sN_pHW] → [N, 1, H, W]
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::captcha::{CaptchaSample, CAPTCHA_LENGTH, IMAGE_HEIGHT, IMAGE_WIDTH};

// ─── CaptchaBatch ─────────────────────────────────────────────────────────────
/// A batch of CAPTCHA samples ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct CaptchaBatch<B: Backend> {
    /// Grayscale images, shape: [batch_size, 1, IMAGE_HEIGHT, IMAGE_WIDTH]
    pub images: Tensor<B, 4>,

    /// Class index per position, shape: [batch_size, CAPTCHA_LENGTH]
    pub labels: Tensor<B, 2, Int>,
}

// ─── CaptchaBatcher ───────────────────────────────────────────────────────────
/// Stateless batcher; the DataLoader supplies the device.
#[derive(Clone, Debug)]
pub struct CaptchaBatcher {
    height: usize,
    width:  usize,
}

impl CaptchaBatcher {
    pub fn new() -> Self {
        Self::with_size(IMAGE_HEIGHT, IMAGE_WIDTH)
    }

    pub fn with_size(height: usize, width: usize) -> Self {
        Self { height, width }
    }
}

impl Default for CaptchaBatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
impl<B: Backend> Batcher<B, CaptchaSample, CaptchaBatch<B>> for CaptchaBatcher {
    fn batch(&self, items: Vec<CaptchaSample>, device: &B::Device) -> CaptchaBatch<B> {
        let batch_size = items.len();

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|s| s.pixels.iter().copied())
            .collect();

        let labels: Vec<i64> = items
            .iter()
            .flat_map(|s| s.label.digits().iter().map(|&d| d as i64))
            .collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, 1, self.height, self.width]),
            device,
        );

        let labels = Tensor::<B, 2, Int>::from_data(
            TensorData::new(labels, [batch_size, CAPTCHA_LENGTH]),
            device,
        );

        CaptchaBatch { images, labels }
    }
}
