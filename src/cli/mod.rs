// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   - trains the digit reader on labelled images
//   2. `predict` - loads a checkpoint and reads one image
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};

use crate::application::{predict_use_case::PredictUseCase, train_use_case::TrainUseCase};

#[derive(Parser, Debug)]
#[command(
    name = "captcha-trainer",
    version,
    about = "Train a ResNet to read 5-digit CAPTCHA images, then predict with it."
)]
pub struct Cli {
    /// The subcommand to run (train or predict)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the matching use case, never compute here
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    tracing::info!("Starting training on images in: {}", args.data_dir);

    let output_dir = args.output_dir.clone();
    let result     = TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Model saved to {output_dir}");
    if let (Some(last), Some(best)) = (result.last(), result.best_epoch()) {
        println!(
            "  final: train_loss={:.4} validate_loss={:.4} accuracy={:.2}%",
            last.train_loss,
            last.validate_loss,
            last.accuracy() * 100.0
        );
        println!("  best epoch: {} (validate_loss={:.4})", best.epoch, best.validate_loss);
    }
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let use_case   = PredictUseCase::new(&args.output_dir, args.max_gpus);
    let prediction = use_case.predict(&args.image)?;

    println!("\nDigits:     {prediction}");
    println!("Confidence: {:.4}", prediction.confidence());
    Ok(())
}
