//! Append-only run log kept next to the miner for operators

use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Error, Debug)]
#[error("Failed to write run log {path}: {source}")]
pub struct RunLogError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `"<local time> - <message>"` and mirrors it to tracing.
    pub fn append(&self, message: &str) -> Result<(), RunLogError> {
        info!(log_path = %self.path.display(), "{}", message);
        self.append_at(Local::now(), message)
    }

    fn append_at(&self, at: DateTime<Local>, message: &str) -> Result<(), RunLogError> {
        let line = format_line(at, message);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.error(source))?;
        file.write_all(line.as_bytes())
            .map_err(|source| self.error(source))
    }

    fn error(&self, source: std::io::Error) -> RunLogError {
        RunLogError {
            path: self.path.clone(),
            source,
        }
    }
}

fn format_line(at: DateTime<Local>, message: &str) -> String {
    format!("{} - {}\n", at.format(TIMESTAMP_FORMAT), message)
}
