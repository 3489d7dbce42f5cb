use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "prompt-warden", version, about = "Prompt policy evaluation engine")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Path to the policy file (overrides config file setting)
    #[arg(short, long)]
    pub policies: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a prompt against an organization's active policies
    Evaluate {
        /// Organization whose policies apply
        #[arg(short, long)]
        organization: String,

        /// User submitting the prompt
        #[arg(short, long, default_value = "anonymous")]
        user: String,

        /// The prompt text to evaluate
        prompt: String,
    },

    /// Compute embeddings for the semantic rules in the policy file
    Prepare {
        /// Recompute embeddings even when already present
        #[arg(long)]
        force: bool,
    },
}
