mod batch;
mod checker;
mod cli;
mod commands;
mod config;
mod embedding;
mod error;
mod logging;
mod prompt;
mod remediator;
mod roster;
mod run_log;
mod service;
#[cfg(test)]
mod testing;
mod validator;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};
use crate::config::ConfigSource;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let source = ConfigSource::load(cli.config.as_deref())?;
    let verbose = cli.verbose || logging::env_flag() || source.verbose();
    logging::init(verbose);
    match cli.command {
        Command::Run {
            block_size,
            no_prompt,
        } => commands::run(&source, block_size, no_prompt),
        Command::Compare {
            file,
            strategy,
            sample_size,
        } => commands::compare(&source, &file, strategy, sample_size),
        Command::Check { merchant_id } => commands::check(&source, &merchant_id),
    }
}
