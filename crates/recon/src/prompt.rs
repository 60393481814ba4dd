use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::batch::BlockReport;

/// Decides, between blocks, whether the run goes on.
pub trait ContinuationDecider {
    fn should_continue(&mut self, completed: &BlockReport) -> bool;
}

/// Unattended runs: every block is processed.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysContinue;

impl ContinuationDecider for AlwaysContinue {
    fn should_continue(&mut self, _completed: &BlockReport) -> bool {
        true
    }
}

/// Asks the operator on the terminal, waiting at most `timeout`.
///
/// Silence until the deadline means continue; any answer other than an
/// affirmative one stops the run. Stdin is read on a helper thread so the
/// wait stays bounded.
pub struct TerminalPrompt {
    timeout: Duration,
    lines: Option<Receiver<String>>,
}

impl TerminalPrompt {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            lines: None,
        }
    }

    #[cfg(test)]
    pub fn from_receiver(lines: Receiver<String>, timeout: Duration) -> Self {
        Self {
            timeout,
            lines: Some(lines),
        }
    }

    fn lines(&mut self) -> &Receiver<String> {
        self.lines.get_or_insert_with(spawn_stdin_reader)
    }
}

impl ContinuationDecider for TerminalPrompt {
    fn should_continue(&mut self, completed: &BlockReport) -> bool {
        let timeout = self.timeout;
        eprint!(
            "Block {} done. Continue with the next block? (s/n, continuing in {}s): ",
            completed.number,
            timeout.as_secs()
        );
        let _ = io::stderr().flush();
        match self.lines().recv_timeout(timeout) {
            Ok(answer) => {
                let proceed = is_affirmative(&answer);
                if !proceed {
                    tracing::info!(answer = answer.trim(), "operator stopped the run");
                }
                proceed
            }
            Err(RecvTimeoutError::Timeout) => {
                eprintln!();
                tracing::info!("no answer before the deadline, continuing");
                true
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("stdin closed, continuing");
                true
            }
        }
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "s" | "si" | "sí" | "y" | "yes"
    )
}

/// Startup prompt for a block-size override; an empty answer keeps `default`.
pub fn prompt_block_size(default: usize) -> Result<usize> {
    eprint!("Block size to process (default: {default}): ");
    io::stderr().flush()?;
    read_block_size(io::stdin().lock(), default)
}

pub fn read_block_size(mut input: impl BufRead, default: usize) -> Result<usize> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("failed to read block size")?;
    let answer = line.trim();
    if answer.is_empty() {
        return Ok(default);
    }
    match answer.parse::<usize>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(anyhow!("invalid block size '{answer}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BlockReport;

    fn report() -> BlockReport {
        BlockReport {
            number: 1,
            rows: 0..10,
            ..BlockReport::default()
        }
    }

    #[test]
    fn affirmative_answers() {
        assert!(is_affirmative("s"));
        assert!(is_affirmative(" Si \n"));
        assert!(is_affirmative("YES"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("sure"));
    }

    #[test]
    fn silence_means_continue() {
        let (_sender, receiver) = mpsc::channel::<String>();
        let mut prompt = TerminalPrompt::from_receiver(receiver, Duration::from_millis(10));
        assert!(prompt.should_continue(&report()));
    }

    #[test]
    fn explicit_answers_are_honored() {
        let (sender, receiver) = mpsc::channel::<String>();
        let mut prompt = TerminalPrompt::from_receiver(receiver, Duration::from_millis(200));
        sender.send("s".to_string()).unwrap();
        assert!(prompt.should_continue(&report()));
        sender.send("n".to_string()).unwrap();
        assert!(!prompt.should_continue(&report()));
        sender.send(String::new()).unwrap();
        assert!(!prompt.should_continue(&report()));
    }

    #[test]
    fn block_size_prompt_defaults_on_empty_answer() {
        assert_eq!(read_block_size(&b"\n"[..], 50).unwrap(), 50);
        assert_eq!(read_block_size(&b" 25 \n"[..], 50).unwrap(), 25);
        assert!(read_block_size(&b"0\n"[..], 50).is_err());
        assert!(read_block_size(&b"many\n"[..], 50).is_err());
    }
}
