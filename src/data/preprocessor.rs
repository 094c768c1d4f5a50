// ============================================================
// Layer 4 - Image Preprocessor
// ============================================================
// Turns a decoded image of any format into the flat pixel
// buffer the backbone expects.
//
// Cleaning steps (applied in order):
//   1. Convert to 8-bit grayscale (one channel)
//   2. Resize to IMAGE_WIDTH x IMAGE_HEIGHT if the source differs
//   3. Scale every pixel from 0..=255 to 0.0..=1.0
//
// The output is row-major: pixel (x, y) lives at y * width + x,
// which matches the (1, H, W) layout the batcher reshapes into.
//
// Reference: image crate documentation (imageops::resize)

use image::{imageops::FilterType, DynamicImage, GrayImage};

use crate::domain::captcha::{IMAGE_HEIGHT, IMAGE_WIDTH};

pub struct ImagePreprocessor {
    width:  u32,
    height: u32,
}

impl ImagePreprocessor {
    /// Create a preprocessor for the standard CAPTCHA geometry
    pub fn new() -> Self {
        Self::with_size(IMAGE_WIDTH as u32, IMAGE_HEIGHT as u32)
    }

    /// Create a preprocessor targeting an arbitrary geometry
    pub fn with_size(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of f32 values produced per image
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Convert a decoded image into normalised grayscale pixels.
    pub fn process(&self, img: &DynamicImage) -> Vec<f32> {
        // ── Step 1: Grayscale ─────────────────────────────────────────────────
        let gray = img.to_luma8();

        // ── Step 2: Resize only when the geometry differs ─────────────────────
        let gray: GrayImage = if gray.width() == self.width && gray.height() == self.height {
            gray
        } else {
            tracing::debug!(
                "Resizing {}x{} → {}x{}",
                gray.width(),
                gray.height(),
                self.width,
                self.height
            );
            image::imageops::resize(&gray, self.width, self.height, FilterType::Triangle)
        };

        // ── Step 3: Normalise to [0, 1] ───────────────────────────────────────
        // GrayImage stores pixels row by row, so the raw buffer is
        // already in the order we want
        gray.into_raw()
            .into_iter()
            .map(|p| p as f32 / 255.0)
            .collect()
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}
