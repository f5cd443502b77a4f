//! Sector committer trait and implementations
//!
//! The default implementation shells out to `lotus-miner`; the dry-run
//! implementation only logs the command it would have run.

use serde::Serialize;
use std::path::PathBuf;
use std::process::{Command, Output};
use thiserror::Error;
use tracing::{info, warn};

pub const MINER_PATH_ENV: &str = "LOTUS_MINER_PATH";
pub const COMMIT_ARGS: [&str; 4] = ["sectors", "batching", "commit", "--publish-now"];

#[derive(Error, Debug)]
pub enum CommitError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Commit command exited with status {code:?}: {stderr}")]
    Failed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

/// What happened when the commit command ran (or would have run)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    pub command_line: String,
    pub dry_run: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Publishes the pending commit batch
pub trait SectorCommitter {
    fn commit(&self) -> Result<CommitOutcome, CommitError>;
}

/// Runs `lotus-miner sectors batching commit --publish-now`
#[derive(Debug, Clone)]
pub struct LotusMinerCommitter {
    miner_bin: String,
    miner_path: PathBuf,
}

impl LotusMinerCommitter {
    pub fn new(miner_bin: impl Into<String>, miner_path: impl Into<PathBuf>) -> Self {
        Self {
            miner_bin: miner_bin.into(),
            miner_path: miner_path.into(),
        }
    }

    /// LOTUS_MINER_PATH is set on the child only.
    fn command(&self) -> Command {
        let mut command = Command::new(&self.miner_bin);
        command
            .args(COMMIT_ARGS)
            .env(MINER_PATH_ENV, &self.miner_path);
        command
    }

    pub fn command_line(&self) -> String {
        command_line_string(&self.command())
    }
}

impl SectorCommitter for LotusMinerCommitter {
    fn commit(&self) -> Result<CommitOutcome, CommitError> {
        let mut command = self.command();
        let command_line = command_line_string(&command);
        info!(command = %command_line, "Running commit command");

        let output = command.output().map_err(|source| CommitError::Spawn {
            program: self.miner_bin.clone(),
            source,
        })?;

        let outcome = outcome_from_output(command_line, &output);
        if !output.status.success() {
            warn!(
                exit_code = ?outcome.exit_code,
                stderr = %outcome.stderr.trim(),
                "Commit command failed"
            );
            return Err(CommitError::Failed {
                code: outcome.exit_code,
                stdout: outcome.stdout,
                stderr: outcome.stderr,
            });
        }

        info!(
            exit_code = ?outcome.exit_code,
            stdout = %outcome.stdout.trim(),
            "Commit command finished"
        );
        Ok(outcome)
    }
}

/// Logs the command instead of running it
#[derive(Debug, Clone)]
pub struct DryRunCommitter {
    command_line: String,
}

impl DryRunCommitter {
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
        }
    }

    pub fn for_miner(miner: &LotusMinerCommitter) -> Self {
        Self::new(miner.command_line())
    }
}

impl SectorCommitter for DryRunCommitter {
    fn commit(&self) -> Result<CommitOutcome, CommitError> {
        info!(command = %self.command_line, "Dry-run: skipping commit command");
        Ok(CommitOutcome {
            command_line: self.command_line.clone(),
            dry_run: true,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

fn outcome_from_output(command_line: String, output: &Output) -> CommitOutcome {
    CommitOutcome {
        command_line,
        dry_run: false,
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

fn command_line_string(cmd: &Command) -> String {
    let mut s = String::new();
    for (key, value) in cmd.get_envs() {
        if let Some(value) = value {
            s.push_str(&key.to_string_lossy());
            s.push('=');
            s.push_str(&shell_escape(&value.to_string_lossy()));
            s.push(' ');
        }
    }
    s.push_str(&shell_escape(&cmd.get_program().to_string_lossy()));
    for a in cmd.get_args() {
        s.push(' ');
        s.push_str(&shell_escape(&a.to_string_lossy()));
    }
    s
}

fn shell_escape(s: &str) -> String {
    if !s.is_empty()
        && !s
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '$' | '`' | '\\'))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}
