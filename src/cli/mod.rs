// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`    — trains a backbone + head, checkpointing each epoch
//   2. `evaluate` — scores the latest checkpoint on the test split
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "metric-heads",
    version = "0.1.0",
    about = "Train image classifiers with softmax, DCE, metric-learning or prototype-learning heads."
)]
pub struct Cli {
    /// The subcommand to run (train or evaluate)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Routes to the use case, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!(
        "Starting training: {} / {} head on {}",
        args.backbone, args.head, args.dataset
    );

    let checkpoint_dir = args.checkpoint_dir.clone();
    TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Checkpoints saved to '{}'.", checkpoint_dir);
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let report = EvaluateUseCase::new(args.checkpoint_dir, args.data_dir, args.embeddings_out)
        .execute()?;

    println!("\nTest images: {}", report.samples);
    println!("Test loss:   {:.4}", report.loss);
    println!("Accuracy:    {:.2}%", report.accuracy * 100.0);
    for class in &report.per_class {
        println!(
            "  class {:>2}: {:>6.2}%  ({}/{})",
            class.class, class.accuracy() * 100.0, class.correct, class.total
        );
    }
    Ok(())
}
