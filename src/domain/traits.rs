// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// The application layer asks for samples through a trait so
// the dataset never needs to know where images come from.
// ImageDirLoader reads them from disk; tests use an in-memory
// source.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::captcha::CaptchaSample;
use crate::domain::usage::Usage;

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can produce labelled CAPTCHA samples.
///
/// Implementations:
///   - ImageDirLoader → decodes image files from <data_dir>/<usage>/
pub trait SampleSource {
    /// Load every available sample for the given usage.
    /// An absent split is an empty Vec, not an error.
    fn load_all(&self, usage: Usage) -> Result<Vec<CaptchaSample>>;
}
