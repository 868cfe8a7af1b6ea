use carapace_classifier::RuntimeKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "carapace")]
#[command(author, version, about = "Crab gender classifier")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "carapace.yaml")]
    pub config: PathBuf,

    /// Model location (local directory, hf://<repo> or http(s):// URL)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Runtime: simulated or candle
    #[arg(long, global = true, value_parser = parse_runtime)]
    pub runtime: Option<RuntimeKind>,

    /// Seed for reproducible simulated predictions
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the model card (accuracy, training data, architecture)
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load the model and report progress
    Load,

    /// Load the model, then classify each image in turn
    Classify {
        /// Image files to classify
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn parse_runtime(s: &str) -> Result<RuntimeKind, String> {
    s.parse()
}
