// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:          the epoch number (1, 2, 3, ...)
//   - train_loss:     mean composite loss over training batches
//   - validate_loss:  mean composite loss on the validation set
//   - acc_digit_i:    fraction of position i predicted correctly
//   - accuracy:       mean of the acc_digit_i columns
//
// Output file: <output_dir>/metrics.csv
//
// Example CSV output (5 positions):
//   epoch,train_loss,validate_loss,acc_digit_0,...,acc_digit_4,accuracy
//   1,11.512900,11.498100,0.102000,...,0.097000,0.099800
//
// Reading the numbers:
//   - A random guesser sits near ln(10) ≈ 2.30 per position,
//     i.e. ≈ 11.5 total for 5 positions, at 10% accuracy
//   - validate_loss rising while train_loss falls → overfitting
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::ml::evaluator::accuracy_name;

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Mean composite loss over all training batches
    pub train_loss: f64,

    /// Mean composite loss over the validation set
    pub validate_loss: f64,

    /// Accuracy of each position, in position order
    pub position_acc: Vec<f64>,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, validate_loss: f64, position_acc: Vec<f64>) -> Self {
        Self { epoch, train_loss, validate_loss, position_acc }
    }

    /// Mean accuracy across positions
    pub fn accuracy(&self) -> f64 {
        if self.position_acc.is_empty() {
            0.0
        } else {
            self.position_acc.iter().sum::<f64>() / self.position_acc.len() as f64
        }
    }

    /// Returns true if this epoch improved over the previous best validate_loss
    pub fn is_improvement(&self, best_validate_loss: f64) -> bool {
        self.validate_loss < best_validate_loss
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path:  PathBuf,
    positions: usize,
}

impl MetricsLogger {
    /// Create a new MetricsLogger for `positions` accuracy columns.
    /// One file per run: an existing CSV is truncated to the header.
    pub fn new(dir: impl AsRef<Path>, positions: usize) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "{}", header(positions))?;
        tracing::debug!("Started metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path, positions })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        anyhow::ensure!(
            m.position_acc.len() == self.positions,
            "metrics row has {} accuracy columns, expected {}",
            m.position_acc.len(),
            self.positions
        );

        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        let mut row = format!("{},{:.6},{:.6}", m.epoch, m.train_loss, m.validate_loss);
        for acc in &m.position_acc {
            row.push_str(&format!(",{acc:.6}"));
        }
        row.push_str(&format!(",{:.6}", m.accuracy()));
        writeln!(f, "{row}")?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, validate_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.validate_loss,
        );

        Ok(())
    }

    /// Return the path to the metrics CSV file
    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

fn header(positions: usize) -> String {
    let mut cols = vec!["epoch".to_string(), "train_loss".into(), "validate_loss".into()];
    cols.extend((0..positions).map(accuracy_name));
    cols.push("accuracy".into());
    cols.join(",")
}
