// ============================================================
// Layer 4 - Image Directory Loader
// ============================================================
// Loads labelled CAPTCHA images from a directory tree using
// the image crate.
//
// Expected layout:
//   <data_dir>/
//     train/       40913.png  01234.png  01234_2.png ...
//     validation/  ...
//
// The label is taken from the file stem (see CaptchaLabel).
// Files are visited in sorted order so two runs over the same
// directory produce the same sample order.
//
// Reference: image crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use image::{DynamicImage, ImageError, ImageReader};
use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use crate::data::preprocessor::ImagePreprocessor;
use crate::domain::captcha::{CaptchaLabel, CaptchaSample};
use crate::domain::traits::SampleSource;
use crate::domain::usage::Usage;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Loads every image under <dir>/<usage>/.
/// Implements the SampleSource trait from Layer 3.
pub struct ImageDirLoader {
    dir:          PathBuf,
    preprocessor: ImagePreprocessor,
}

impl ImageDirLoader {
    /// Create a new ImageDirLoader pointed at a data root
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir:          dir.into(),
            preprocessor: ImagePreprocessor::new(),
        }
    }

    /// True if the data root has a sub-directory for this usage
    pub fn has_split(&self, usage: Usage) -> bool {
        self.dir.join(usage.dir_name()).is_dir()
    }

    /// Decode and preprocess a single file, label included.
    pub fn load_file(&self, path: &Path) -> Result<CaptchaSample> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("'{}' has no usable file name", path.display()))?;
        let label = CaptchaLabel::from_file_stem(stem)?;

        let img = load_image(path)
            .with_context(|| format!("Cannot decode '{}'", path.display()))?;

        Ok(CaptchaSample {
            pixels: self.preprocessor.process(&img),
            label,
        })
    }

    /// Decode and preprocess an unlabelled image (used at prediction time)
    pub fn load_pixels(&self, path: &Path) -> Result<Vec<f32>> {
        let img = load_image(path)
            .with_context(|| format!("Cannot decode '{}'", path.display()))?;
        Ok(self.preprocessor.process(&img))
    }
}

impl SampleSource for ImageDirLoader {
    fn load_all(&self, usage: Usage) -> Result<Vec<CaptchaSample>> {
        let dir = self.dir.join(usage.dir_name());

        // A missing split is not fatal: the caller decides whether it
        // can proceed without it (e.g. by holding out training data).
        if !dir.exists() {
            tracing::warn!(
                "Data directory '{}' does not exist, returning no samples",
                dir.display()
            );
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
        {
            let path = entry?.path();
            if is_image(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut samples = Vec::with_capacity(paths.len());
        for path in &paths {
            match self.load_file(path) {
                Ok(sample) => samples.push(sample),
                // Log a warning but continue, one bad file must not stop training
                Err(e) => tracing::warn!("Skipping '{}': {:#}", path.display(), e),
            }
        }

        tracing::info!(
            "Loaded {} of {} {} images from '{}'",
            samples.len(),
            paths.len(),
            usage,
            dir.display()
        );
        Ok(samples)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Open an image, retrying with content sniffing when the extension
/// does not match the actual encoding.
fn load_image(path: &Path) -> Result<DynamicImage, ImageError> {
    match image::open(path) {
        Ok(img) => Ok(img),
        Err(err @ (ImageError::Decoding(_) | ImageError::Unsupported(_))) => {
            tracing::debug!(
                "Standard decode failed for {} ({err}), retrying with format sniffing",
                path.display()
            );
            let reader = ImageReader::new(BufReader::new(File::open(path)?))
                .with_guessed_format()?;
            reader.decode()
        }
        Err(err) => Err(err),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::captcha::{IMAGE_HEIGHT, IMAGE_WIDTH};
    use image::{GrayImage, ImageFormat};

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) {
        GrayImage::new(w, h).save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_loads_labelled_images_in_sorted_order() {
        let root  = tempfile::tempdir().unwrap();
        let train = root.path().join("train");
        fs::create_dir_all(&train).unwrap();
        write_png(&train, "55555.png", 160, 60);
        write_png(&train, "01234_1.png", 160, 60);
        write_png(&train, "01234.png", 80, 30);

        let samples = ImageDirLoader::new(root.path()).load_all(Usage::Train).unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].label.to_string(), "01234");
        assert_eq!(samples[2].label.to_string(), "55555");
        assert!(samples.iter().all(|s| s.pixels.len() == IMAGE_WIDTH * IMAGE_HEIGHT));
    }

    #[test]
    fn test_skips_bad_names_and_non_images() {
        let root  = tempfile::tempdir().unwrap();
        let train = root.path().join("train");
        fs::create_dir_all(&train).unwrap();
        write_png(&train, "abcde.png", 160, 60);
        write_png(&train, "12345.png", 160, 60);
        fs::write(train.join("notes.txt"), "not an image").unwrap();
        fs::write(train.join("99999.png"), "garbage bytes").unwrap();

        let samples = ImageDirLoader::new(root.path()).load_all(Usage::Train).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label.to_string(), "12345");
    }

    #[test]
    fn test_missing_split_is_empty() {
        let root   = tempfile::tempdir().unwrap();
        let loader = ImageDirLoader::new(root.path());
        assert!(!loader.has_split(Usage::Validation));
        assert!(loader.load_all(Usage::Validation).unwrap().is_empty());
    }

    #[test]
    fn test_mislabelled_extension_is_sniffed() {
        // PNG bytes stored under a .jpg name
        let root  = tempfile::tempdir().unwrap();
        let train = root.path().join("train");
        fs::create_dir_all(&train).unwrap();
        GrayImage::new(160, 60)
            .save_with_format(train.join("24680.jpg"), ImageFormat::Png)
            .unwrap();

        let samples = ImageDirLoader::new(root.path()).load_all(Usage::Train).unwrap();
        assert_eq!(samples.len(), 1);
    }
}
