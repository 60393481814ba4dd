use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Human-readable log of one reconciliation run.
///
/// `start` truncates the file; every later write appends.
pub trait LogSink {
    fn start(&mut self, header: &str) -> Result<()>;

    fn append(&mut self, lines: &[String]) -> Result<()>;
}

pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(&self, truncate: bool) -> Result<BufWriter<File>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(truncate)
            .append(!truncate)
            .open(&self.path)
            .with_context(|| format!("failed to open run log {}", self.path.display()))?;
        Ok(BufWriter::new(file))
    }
}

impl LogSink for RunLog {
    fn start(&mut self, header: &str) -> Result<()> {
        let mut writer = self.open(true)?;
        writeln!(writer, "{header}")?;
        writer.flush()?;
        Ok(())
    }

    fn append(&mut self, lines: &[String]) -> Result<()> {
        let mut writer = self.open(false)?;
        for line in lines {
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn start_truncates_and_append_accumulates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "previous run\n").unwrap();

        let mut log = RunLog::new(&path);
        log.start("starting review, block size 50").unwrap();
        log.append(&["block 1".to_string()]).unwrap();
        log.append(&["block 2".to_string(), "done".to_string()]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "starting review, block size 50\nblock 1\nblock 2\ndone\n");
    }
}
