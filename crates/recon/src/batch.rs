use std::ops::{AddAssign, Range};

use anyhow::{Context, Result};

use crate::checker::{check_contract, ContractCheck};
use crate::prompt::ContinuationDecider;
use crate::remediator::{RemediationState, Remediator};
use crate::roster::{ContractStatus, MerchantRecord, Roster, RosterStore};
use crate::run_log::LogSink;
use crate::service::ContractService;
use crate::validator::DocumentValidator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockCounters {
    pub repairs_attempted: usize,
    pub repairs_successful: usize,
    pub mistyped: usize,
}

impl AddAssign for BlockCounters {
    fn add_assign(&mut self, other: Self) {
        self.repairs_attempted += other.repairs_attempted;
        self.repairs_successful += other.repairs_successful;
        self.mistyped += other.mistyped;
    }
}

/// What one block did; handed to the continuation decider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockReport {
    /// 1-based block number.
    pub number: usize,
    pub rows: Range<usize>,
    pub counters: BlockCounters,
    pub log_lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunCompletion {
    Completed,
    StoppedByOperator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub blocks: usize,
    pub rows_analyzed: usize,
    pub total_rows: usize,
    pub counters: BlockCounters,
    pub completion: RunCompletion,
}

impl RunSummary {
    pub fn lines(&self) -> Vec<String> {
        let headline = match self.completion {
            RunCompletion::Completed => "All rows were processed",
            RunCompletion::StoppedByOperator => "Run incomplete, stopped by the operator",
        };
        vec![
            headline.to_string(),
            format!(
                "Blocks: {}, rows analyzed: {} of {}, repair attempts: {}, repaired: {}, mistyped: {}",
                self.blocks,
                self.rows_analyzed,
                self.total_rows,
                self.counters.repairs_attempted,
                self.counters.repairs_successful,
                self.counters.mistyped
            ),
        ]
    }
}

/// Walks the roster block by block, reconciling every row not yet confirmed.
///
/// The roster is persisted and the log appended once per block; between blocks
/// the decider may stop the run.
pub struct BatchRunner<'a, S: ?Sized> {
    service: &'a S,
    validator: &'a DocumentValidator<'a>,
    block_size: usize,
}

impl<'a, S> BatchRunner<'a, S>
where
    S: ContractService + ?Sized,
{
    pub fn new(service: &'a S, validator: &'a DocumentValidator<'a>, block_size: usize) -> Self {
        Self {
            service,
            validator,
            block_size: block_size.max(1),
        }
    }

    pub fn run<R, L, D>(
        &self,
        roster: &mut Roster,
        store: &mut R,
        log: &mut L,
        decider: &mut D,
    ) -> Result<RunSummary>
    where
        R: RosterStore + ?Sized,
        L: LogSink + ?Sized,
        D: ContinuationDecider + ?Sized,
    {
        log.start(&format!(
            "Starting contract review. Block size: {}",
            self.block_size
        ))?;
        let blocks = roster.blocks(self.block_size);
        tracing::info!(
            rows = roster.len(),
            blocks = blocks.len(),
            block_size = self.block_size,
            "starting contract review"
        );

        let mut summary = RunSummary {
            blocks: 0,
            rows_analyzed: 0,
            total_rows: roster.len(),
            counters: BlockCounters::default(),
            completion: RunCompletion::Completed,
        };
        for (index, rows) in blocks.iter().enumerate() {
            let report = self.process_block(roster, index + 1, rows.clone());
            summary.blocks += 1;
            summary.rows_analyzed += rows.len();
            summary.counters += report.counters;

            log.append(&report.log_lines)?;
            store.save(roster).context("failed to persist roster")?;
            tracing::info!(
                block = report.number,
                first_row = report.rows.start + 1,
                last_row = report.rows.end,
                attempted = report.counters.repairs_attempted,
                repaired = report.counters.repairs_successful,
                mistyped = report.counters.mistyped,
                "block persisted"
            );

            let is_last = index + 1 == blocks.len();
            if !is_last && !decider.should_continue(&report) {
                summary.completion = RunCompletion::StoppedByOperator;
                break;
            }
        }

        let lines = summary.lines();
        for line in &lines {
            tracing::info!("{line}");
        }
        log.append(&lines)?;
        Ok(summary)
    }

    pub fn process_block(&self, roster: &mut Roster, number: usize, rows: Range<usize>) -> BlockReport {
        let mut report = BlockReport {
            number,
            rows: rows.clone(),
            ..BlockReport::default()
        };
        report.log_lines.push(format!(
            "Processing block {number}, rows {} to {}",
            rows.start + 1,
            rows.end
        ));
        for index in rows {
            if let Some(record) = roster.record_mut(index) {
                self.process_row(record, &mut report);
            }
        }
        let counters = report.counters;
        if counters.repairs_attempted == 0 && counters.mistyped == 0 {
            report
                .log_lines
                .push("All merchants had their contracts in order".to_string());
        } else if counters.mistyped > 0 {
            report
                .log_lines
                .push(format!("{} mistyped cases in total", counters.mistyped));
        }
        report
    }

    fn process_row(&self, record: &mut MerchantRecord, report: &mut BlockReport) {
        let merchant_id = record.merchant_id.clone();
        if record.is_confirmed() {
            tracing::debug!(%merchant_id, "contract already confirmed");
            return;
        }
        tracing::info!(%merchant_id, "reviewing merchant");
        let mut line = format!("Merchant {merchant_id} has no contract on record... repairing...");

        match check_contract(self.service, &merchant_id) {
            ContractCheck::Absent => {
                report.counters.repairs_attempted += 1;
                let state = Remediator::new(self.service, self.validator).remediate(&merchant_id);
                if let Some((status, score)) = state.row_outcome() {
                    record.record_outcome(status, score);
                }
                match state {
                    RemediationState::Repaired { score } => {
                        report.counters.repairs_successful += 1;
                        tracing::info!(%merchant_id, score, "repaired");
                        line.push_str(" repair succeeded");
                    }
                    RemediationState::RepairFailed { stage, .. } => {
                        tracing::warn!(%merchant_id, %stage, "repair failed");
                        line.push_str(&format!(" repair failed at {stage}"));
                    }
                    _ => {}
                }
                report.log_lines.push(line);
            }
            ContractCheck::Present(descriptor) => {
                let validation = self.validator.validate(self.service, &merchant_id, &descriptor);
                if validation.valid {
                    record.record_outcome(ContractStatus::Confirmed, validation.score);
                    report.counters.mistyped += 1;
                    tracing::info!(%merchant_id, "contract was already on file");
                    report.log_lines.push(line);
                    report.log_lines.push(format!(
                        "Contract for merchant {merchant_id} was already on file... OK!"
                    ));
                } else {
                    record.record_outcome(ContractStatus::Absent, validation.score);
                    tracing::warn!(%merchant_id, "listed contract could not be validated");
                    line.push_str(&format!(
                        " could not download a valid file for merchant {merchant_id}"
                    ));
                    report.log_lines.push(line);
                }
            }
        }
    }
}
