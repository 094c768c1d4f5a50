// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `predict`
// and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the CAPTCHA digit reader
    Train(TrainArgs),

    /// Read the digits of one image with a trained checkpoint
    Predict(PredictArgs),
}

/// All arguments for the `train` command
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Number of full passes through the training data
    #[arg(short = 'e', long = "epoch", default_value_t = 2)]
    pub epochs: usize,

    /// Number of images per mini-batch
    #[arg(short, long, default_value_t = 32)]
    pub batch_size: usize,

    /// Number of GPUs to use, 0 trains on the CPU
    #[arg(short = 'g', long, default_value_t = 1)]
    pub max_gpus: usize,

    /// Cap on the number of batches per epoch and split
    #[arg(short, long)]
    pub max_iterations: Option<usize>,

    /// Where checkpoints, config and metrics are written
    #[arg(short, long, default_value = "build/model")]
    pub output_dir: String,

    /// Root holding the train/ and validation/ image folders
    #[arg(short, long, default_value = "data/captcha")]
    pub data_dir: String,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    /// ResNet depth: 18, 34, 50, 101 or 152
    #[arg(long, default_value_t = 50)]
    pub num_layers: usize,

    /// Filters in the first residual stage
    #[arg(long, default_value_t = 64)]
    pub base_filters: usize,

    /// Seed for shuffling and the validation hold-out
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Boundary between Layer 1 and Layer 2,
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:       a.data_dir,
            output_dir:     a.output_dir,
            epochs:         a.epochs,
            batch_size:     a.batch_size,
            max_gpus:       a.max_gpus,
            max_iterations: a.max_iterations,
            learning_rate:  a.learning_rate,
            num_layers:     a.num_layers,
            base_filters:   a.base_filters,
            seed:           a.seed,
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Image file to read
    #[arg(short, long)]
    pub image: PathBuf,

    /// Directory the model was trained into
    #[arg(short, long, default_value = "build/model")]
    pub output_dir: String,

    /// 0 predicts on the CPU
    #[arg(short = 'g', long, default_value_t = 1)]
    pub max_gpus: usize,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults() {
        let cli = Cli::try_parse_from(["captcha-trainer", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();

        assert_eq!(cfg.epochs, 2);
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.max_gpus, 1);
        assert_eq!(cfg.max_iterations, None);
        assert_eq!(cfg.output_dir, "build/model");
    }

    #[test]
    fn test_train_short_flags() {
        let cli = Cli::try_parse_from([
            "captcha-trainer", "train", "-e", "5", "-b", "8", "-g", "0", "-m", "3", "-o", "out",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };

        assert_eq!(args.epochs, 5);
        assert_eq!(args.batch_size, 8);
        assert_eq!(args.max_gpus, 0);
        assert_eq!(args.max_iterations, Some(3));
        assert_eq!(args.output_dir, "out");
    }

    #[test]
    fn test_predict_requires_image() {
        assert!(Cli::try_parse_from(["captcha-trainer", "predict"]).is_err());
        let cli = Cli::try_parse_from(["captcha-trainer", "predict", "--image", "a.png"]).unwrap();
        assert!(matches!(cli.command, Commands::Predict(_)));
    }
}
