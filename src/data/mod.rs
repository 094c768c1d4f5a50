// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything from image files on disk to tensor batches.
//
// The pipeline flows in this order:
//
//   <data_dir>/<usage>/*.png
//       │
//       ▼
//   ImageDirLoader    → decodes files, parses labels from names
//       │
//       ▼
//   ImagePreprocessor → grayscale, resize, scale to [0, 1]
//       │
//       ▼
//   CaptchaDataset    → implements Burn's Dataset trait
//       │
//       ▼
//   CaptchaBatcher    → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Loads labelled images from a directory using the image crate
pub mod loader;

/// Converts decoded images into normalised grayscale pixels
pub mod preprocessor;

/// Implements Burn's Dataset trait for CAPTCHA samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Holds out a validation split when none exists on disk
pub mod splitter;
