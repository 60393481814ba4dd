use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};

pub const ID_COLUMN: &str = "Comercio";
pub const STATUS_COLUMN: &str = "Contrato";
pub const SCORE_COLUMN: &str = "Similitud";

/// Contract-status cell of a roster row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContractStatus {
    Confirmed,
    Absent,
    #[default]
    Unknown,
}

impl ContractStatus {
    pub fn from_cell(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "si" | "sí" => ContractStatus::Confirmed,
            "no" => ContractStatus::Absent,
            _ => ContractStatus::Unknown,
        }
    }

    pub fn as_cell(&self) -> &'static str {
        match self {
            ContractStatus::Confirmed => "Si",
            ContractStatus::Absent => "No",
            ContractStatus::Unknown => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MerchantRecord {
    pub merchant_id: String,
    pub status: ContractStatus,
    pub score: Option<f64>,
    /// The full original row; the three typed columns are rewritten from the
    /// fields above on save, everything else is written back untouched.
    cells: Vec<String>,
}

impl MerchantRecord {
    #[cfg(test)]
    pub fn new(merchant_id: impl Into<String>, status: ContractStatus) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            status,
            score: None,
            cells: Vec::new(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == ContractStatus::Confirmed
    }

    pub fn record_outcome(&mut self, status: ContractStatus, score: f64) {
        self.status = status;
        self.score = Some(score);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    id: usize,
    status: usize,
    score: usize,
}

/// Ordered merchant rows plus the column layout they were read with.
#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    headers: Vec<String>,
    layout: Layout,
    records: Vec<MerchantRecord>,
}

impl Roster {
    #[cfg(test)]
    pub fn from_records(records: Vec<MerchantRecord>) -> Self {
        Self {
            headers: vec![
                ID_COLUMN.to_string(),
                STATUS_COLUMN.to_string(),
                SCORE_COLUMN.to_string(),
            ],
            layout: Layout {
                id: 0,
                status: 1,
                score: 2,
            },
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn records(&self) -> &[MerchantRecord] {
        &self.records
    }

    pub fn record_mut(&mut self, index: usize) -> Option<&mut MerchantRecord> {
        self.records.get_mut(index)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Contiguous index ranges of at most `block_size` rows covering the roster.
    pub fn blocks(&self, block_size: usize) -> Vec<Range<usize>> {
        let size = block_size.max(1);
        (0..self.records.len())
            .step_by(size)
            .map(|start| start..(start + size).min(self.records.len()))
            .collect()
    }

    fn from_table(mut headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let id = column(&headers, ID_COLUMN)
            .ok_or_else(|| anyhow!("roster has no '{ID_COLUMN}' column"))?;
        let status = column_or_append(&mut headers, STATUS_COLUMN);
        let score = column_or_append(&mut headers, SCORE_COLUMN);
        let layout = Layout { id, status, score };
        let records = rows
            .into_iter()
            .map(|mut cells| {
                cells.resize(headers.len(), String::new());
                MerchantRecord {
                    merchant_id: cells[layout.id].trim().to_string(),
                    status: ContractStatus::from_cell(&cells[layout.status]),
                    score: cells[layout.score].trim().parse::<f64>().ok(),
                    cells,
                }
            })
            .collect();
        Ok(Self {
            headers,
            layout,
            records,
        })
    }

    fn to_rows(&self) -> Vec<Vec<String>> {
        self.records
            .iter()
            .map(|record| {
                let mut cells = record.cells.clone();
                cells.resize(self.headers.len(), String::new());
                cells[self.layout.id] = record.merchant_id.clone();
                cells[self.layout.status] = record.status.as_cell().to_string();
                cells[self.layout.score] = record
                    .score
                    .map(|score| score.to_string())
                    .unwrap_or_default();
                cells
            })
            .collect()
    }
}

fn column(headers: &[String], name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

fn column_or_append(headers: &mut Vec<String>, name: &str) -> usize {
    column(headers, name).unwrap_or_else(|| {
        headers.push(name.to_string());
        headers.len() - 1
    })
}

/// Durable home of the roster between blocks.
pub trait RosterStore {
    fn load(&self) -> Result<Roster>;

    fn save(&mut self, roster: &Roster) -> Result<()>;
}

pub struct CsvRosterStore {
    path: PathBuf,
}

impl CsvRosterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

}

impl RosterStore for CsvRosterStore {
    fn load(&self) -> Result<Roster> {
        reject_workbook(&self.path)?;
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("failed to open roster {}", self.path.display()))?;
        let headers = reader
            .headers()
            .map(|h| h.iter().map(|cell| cell.to_string()).collect::<Vec<_>>())
            .with_context(|| format!("missing headers in {}", self.path.display()))?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.with_context(|| format!("invalid row in {}", self.path.display()))?;
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }
        Roster::from_table(headers, rows)
            .with_context(|| format!("invalid roster {}", self.path.display()))
    }

    fn save(&mut self, roster: &Roster) -> Result<()> {
        let staging = self.path.with_extension("csv.tmp");
        {
            let mut writer = WriterBuilder::new()
                .from_path(&staging)
                .with_context(|| format!("failed to create {}", staging.display()))?;
            writer.write_record(roster.headers())?;
            for row in roster.to_rows() {
                writer.write_record(&row)?;
            }
            writer.flush()?;
        }
        fs::rename(&staging, &self.path)
            .with_context(|| format!("failed to replace roster {}", self.path.display()))?;
        Ok(())
    }
}

/// Workbooks are not read; the operator exports the sheet to CSV first.
fn reject_workbook(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);
    match extension.as_deref() {
        Some("xlsx" | "xlsm" | "xls" | "ods") => Err(anyhow!(
            "roster {} is a spreadsheet workbook; export the sheet as CSV (comma separated, UTF-8) and point RECON_ROSTER_PATH at the .csv file",
            path.display()
        )),
        _ => Ok(()),
    }
}
