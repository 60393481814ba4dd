use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use recon_core::Strategy;

#[derive(Parser, Debug)]
#[command(
    name = "contract-recon",
    about = "Reconcile merchant contracts against the document service"
)]
pub struct Cli {
    /// TOML file with the same keys as the RECON_* variables, lowercased
    /// and without the prefix. Environment variables take precedence.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk the roster block by block, repairing and validating contracts.
    ///
    /// The roster at RECON_ROSTER_PATH is a CSV file with `Comercio`, `Contrato`
    /// and `Similitud` columns; export spreadsheet workbooks to CSV first.
    Run {
        /// Overrides RECON_BLOCK_SIZE and skips the startup prompt.
        #[arg(long)]
        block_size: Option<usize>,
        /// Never ask the operator between blocks.
        #[arg(long, default_value_t = false)]
        no_prompt: bool,
    },
    /// Score a local file against the reference contract.
    Compare {
        file: PathBuf,
        #[arg(long)]
        strategy: Option<Strategy>,
        /// Sample size for the bytes strategy.
        #[arg(long)]
        sample_size: Option<usize>,
    },
    /// Report whether a merchant has a contract on file.
    Check { merchant_id: String },
}
