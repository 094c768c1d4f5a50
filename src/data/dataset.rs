// ============================================================
// Layer 4 - CAPTCHA Dataset
// ============================================================
// Implements Burn's Dataset trait over in-memory samples.
//
// Building a dataset is a two step process:
//   1. builder() collects usage, sampling and iteration limits
//   2. prepare() pulls the samples from a SampleSource
//
// max_iteration caps how many batches one epoch may run. Every
// sample is kept; the trainer stops each pass after
// num_iterations() batches, so with random sampling a capped
// epoch still draws from the whole dataset.

use anyhow::{ensure, Result};
use burn::data::dataset::Dataset;

use crate::domain::traits::SampleSource;
use crate::domain::usage::Usage;

pub use crate::domain::captcha::CaptchaSample;

/// How batches are drawn from the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampling {
    pub batch_size: usize,
    /// Shuffle each epoch when true, sequential order otherwise
    pub random:     bool,
}

#[derive(Debug, Clone, Default)]
pub struct CaptchaDatasetBuilder {
    usage:         Usage,
    sampling:      Option<Sampling>,
    max_iteration: Option<usize>,
}

impl CaptchaDatasetBuilder {
    pub fn usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn sampling(mut self, batch_size: usize, random: bool) -> Self {
        self.sampling = Some(Sampling { batch_size, random });
        self
    }

    pub fn max_iteration(mut self, max_iteration: Option<usize>) -> Self {
        self.max_iteration = max_iteration;
        self
    }

    pub fn build(self) -> Result<CaptchaDataset> {
        let sampling = match self.sampling {
            Some(s) => s,
            None => anyhow::bail!("sampling(batch_size, random) must be set before build()"),
        };
        ensure!(sampling.batch_size > 0, "batch size must be greater than zero");
        ensure!(
            self.max_iteration != Some(0),
            "max iteration must be greater than zero when set"
        );

        Ok(CaptchaDataset {
            usage:         self.usage,
            sampling,
            max_iteration: self.max_iteration,
            samples:       Vec::new(),
        })
    }
}

pub struct CaptchaDataset {
    usage:         Usage,
    sampling:      Sampling,
    max_iteration: Option<usize>,
    samples:       Vec<CaptchaSample>,
}

impl CaptchaDataset {
    pub fn builder() -> CaptchaDatasetBuilder {
        CaptchaDatasetBuilder::default()
    }

    /// Load samples from the source.
    pub fn prepare(self, source: &impl SampleSource) -> Result<Self> {
        let samples = source.load_all(self.usage)?;
        Ok(self.with_samples(samples))
    }

    /// Replace the samples directly (used for held-out splits)
    pub fn with_samples(mut self, samples: Vec<CaptchaSample>) -> Self {
        self.samples = samples;
        if self.num_iterations() < self.samples.len().div_ceil(self.sampling.batch_size) {
            tracing::debug!(
                "{} set: {} samples, capped at {} batches per epoch",
                self.usage,
                self.samples.len(),
                self.num_iterations()
            );
        }
        self
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Number of batches one pass over this dataset produces
    pub fn num_iterations(&self) -> usize {
        let batches = self.samples.len().div_ceil(self.sampling.batch_size);
        match self.max_iteration {
            Some(max_iter) => batches.min(max_iter),
            None => batches,
        }
    }
}

impl Dataset<CaptchaSample> for CaptchaDataset {
    fn get(&self, index: usize) -> Option<CaptchaSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
