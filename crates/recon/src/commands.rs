use std::fs;
use std::io::{self, IsTerminal};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use recon_core::{ReferenceDocument, SimilarityEngine, Strategy};

use crate::batch::{BatchRunner, RunSummary};
use crate::checker::find_contract;
use crate::config::{ConfigSource, EngineConfig, ReconConfig, ServiceConfig, MIN_SIMILARITY};
use crate::embedding::build_embedder;
use crate::prompt::{self, AlwaysContinue, ContinuationDecider, TerminalPrompt};
use crate::roster::{CsvRosterStore, RosterStore};
use crate::run_log::RunLog;
use crate::service::{HttpContractService, ServiceEndpoints};
use crate::validator::DocumentValidator;

pub fn build_engine(config: &EngineConfig) -> Result<SimilarityEngine> {
    let reference = ReferenceDocument::load(&config.reference_file, config.reference_encoding)
        .context("failed to load reference contract")?;
    let embedder = build_embedder(config)?;
    let engine = SimilarityEngine::builder(reference)
        .maybe_embedder(embedder)
        .build();
    tracing::info!(
        reference = %config.reference_file.display(),
        strategy = %engine.strategy(),
        "similarity engine ready"
    );
    Ok(engine)
}

fn http_service(config: ServiceConfig) -> HttpContractService {
    HttpContractService::new(ServiceEndpoints {
        files_url: config.files_endpoint,
        files_token: config.files_token,
        contract_url: config.contract_endpoint,
        contract_token: config.contract_token,
    })
}

pub fn run(source: &ConfigSource, block_size: Option<usize>, no_prompt: bool) -> Result<()> {
    let config = ReconConfig::from_source(source)?;
    let interactive = io::stdin().is_terminal() && !no_prompt;
    let block_size = match block_size {
        Some(0) => return Err(anyhow!("block size must be positive")),
        Some(size) => size,
        None if interactive => prompt::prompt_block_size(config.block_size)?,
        None => config.block_size,
    };

    let engine = build_engine(&config.engine)?;
    let validator = DocumentValidator::new(&engine).with_min_similarity(config.min_similarity);
    let service = http_service(config.service);

    let mut store = CsvRosterStore::new(&config.roster_path);
    let mut roster = store.load()?;
    let mut log = RunLog::new(&config.log_path);
    let mut decider: Box<dyn ContinuationDecider> = if interactive {
        Box::new(TerminalPrompt::new(config.prompt_timeout))
    } else {
        Box::new(AlwaysContinue)
    };

    let runner = BatchRunner::new(&service, &validator, block_size);
    let summary = runner.run(&mut roster, &mut store, &mut log, decider.as_mut())?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    for line in summary.lines() {
        println!("{line}");
    }
}

pub fn compare(
    source: &ConfigSource,
    file: &Path,
    strategy: Option<Strategy>,
    sample_size: Option<usize>,
) -> Result<()> {
    let config = EngineConfig::from_source(source)?;
    let engine = build_engine(&config)?;
    let strategy = match (strategy.unwrap_or(engine.strategy()), sample_size) {
        (Strategy::RawBytes { .. }, Some(sample_size)) => Strategy::RawBytes { sample_size },
        (_, Some(_)) => return Err(anyhow!("--sample-size only applies to the bytes strategy")),
        (strategy, None) => strategy,
    };
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let score = engine.compare_with(strategy, &bytes)?;
    println!("{}\t{strategy}\t{score:.4}", file.display());
    Ok(())
}

pub fn check(source: &ConfigSource, merchant_id: &str) -> Result<()> {
    let engine_config = EngineConfig::from_source(source)?;
    let service = http_service(ServiceConfig::from_source(source)?);
    let Some(descriptor) = find_contract(&service, merchant_id)? else {
        println!("{merchant_id}: no contract on file");
        return Ok(());
    };
    println!(
        "{merchant_id}: contract on file ({})",
        descriptor.file_name().unwrap_or("unnamed file")
    );
    let engine = build_engine(&engine_config)?;
    let validator = DocumentValidator::new(&engine).with_min_similarity(
        source.parsed::<f64>(MIN_SIMILARITY)?,
    );
    let validation = validator.validate(&service, merchant_id, &descriptor);
    println!(
        "{merchant_id}: valid={} similarity={:.4}",
        validation.valid, validation.score
    );
    Ok(())
}
