// ============================================================
// Layer 3 - CAPTCHA Domain Types
// ============================================================
// A CAPTCHA image shows CAPTCHA_LENGTH characters side by side.
// Each character is one of CAPTCHA_OPTIONS classes (the digits
// 0-9), so a label is a fixed-length array of small integers.
//
// Example:
//   File:   data/captcha/train/40913.png
//   Label:  [4, 0, 9, 1, 3]
//
// The label lives in the file name because that is how the
// CAPTCHA corpora are distributed: one image per file, the
// answer as the stem.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of every input image in pixels
pub const IMAGE_WIDTH: usize = 160;

/// Height of every input image in pixels
pub const IMAGE_HEIGHT: usize = 60;

/// Number of character slots (positions) in one label
pub const CAPTCHA_LENGTH: usize = 5;

/// Number of possible classes per position (digits 0-9)
pub const CAPTCHA_OPTIONS: usize = 10;

/// The ground truth of one CAPTCHA image: one class index per position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptchaLabel {
    digits: [u8; CAPTCHA_LENGTH],
}

impl CaptchaLabel {
    /// Parse a label from exactly CAPTCHA_LENGTH ASCII digits.
    pub fn parse(text: &str) -> Result<Self> {
        if text.chars().count() != CAPTCHA_LENGTH {
            bail!(
                "label '{}' has {} characters, expected {}",
                text,
                text.chars().count(),
                CAPTCHA_LENGTH
            );
        }

        let mut digits = [0u8; CAPTCHA_LENGTH];
        for (slot, c) in digits.iter_mut().zip(text.chars()) {
            match c.to_digit(10) {
                Some(d) => *slot = d as u8,
                None => bail!("label '{}' contains non-digit character '{}'", text, c),
            }
        }

        Self::from_digits(digits)
    }

    /// Extract the label from a file stem.
    /// Everything after the first '_' is ignored so that several
    /// renderings of the same answer can coexist ("01234_2.png").
    pub fn from_file_stem(stem: &str) -> Result<Self> {
        let label_part = stem.split('_').next().unwrap_or(stem);
        Self::parse(label_part)
    }

    /// Build a label from class indices, rejecting out-of-range values
    pub fn from_digits(digits: [u8; CAPTCHA_LENGTH]) -> Result<Self> {
        if let Some(bad) = digits.iter().find(|&&d| d as usize >= CAPTCHA_OPTIONS) {
            bail!("class index {} is out of range 0..{}", bad, CAPTCHA_OPTIONS);
        }
        Ok(Self { digits })
    }

    pub fn digits(&self) -> &[u8] {
        &self.digits
    }
}

impl fmt::Display for CaptchaLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.digits {
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

/// One decoded image paired with its label.
///
/// `pixels` is a single grayscale channel, row-major,
/// IMAGE_HEIGHT rows of IMAGE_WIDTH values in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaSample {
    pub pixels: Vec<f32>,
    pub label:  CaptchaLabel,
}
