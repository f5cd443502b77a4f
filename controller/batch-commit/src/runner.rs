//! One controller pass: base fee check, pending commit check, commit

use crate::commit::{CommitOutcome, SectorCommitter};
use crate::config::Settings;
use crate::decision::Decision;
use crate::extract;
use crate::prometheus::{MetricQuery, PrometheusClient};
use crate::run_log::RunLog;
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

pub const STARTING_BANNER: &str =
    "----------------------------- Starting -----------------------------------";
pub const COMPLETED_BANNER: &str =
    "----------------------------- Completed -----------------------------------";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub decision: Decision,
    pub outcome: Option<CommitOutcome>,
}

pub struct BatchCommitRunner<C: SectorCommitter> {
    client: PrometheusClient,
    settings: Settings,
    committer: C,
    run_log: RunLog,
}

impl<C: SectorCommitter> BatchCommitRunner<C> {
    pub fn new(client: PrometheusClient, settings: Settings, committer: C) -> Self {
        let run_log = RunLog::new(&settings.log_path);
        Self {
            client,
            settings,
            committer,
            run_log,
        }
    }

    pub fn committer(&self) -> &C {
        &self.committer
    }

    /// Runs one pass. Failures are written to the run log before returning.
    /// Once a decision is reached (and possibly acted on), run log write
    /// errors only produce a warning.
    pub fn run(&self) -> Result<RunReport> {
        self.log(STARTING_BANNER)?;

        match self.evaluate_and_commit() {
            Ok(report) => {
                self.log_best_effort(COMPLETED_BANNER);
                Ok(report)
            }
            Err(e) => {
                if let Err(log_err) = self.run_log.append(&format!("Run failed: {:#}", e)) {
                    warn!(error = %log_err, "Could not record failure in run log");
                }
                Err(e)
            }
        }
    }

    fn evaluate_and_commit(&self) -> Result<RunReport> {
        let thresholds = self.settings.thresholds();
        self.log(&format!(
            "Configured basefee threshold: {}",
            thresholds.basefee_ceiling
        ))?;

        let response = self
            .client
            .fetch(MetricQuery::BaseFee)
            .context("Failed to fetch base fee")?;
        let base_fee = extract::base_fee(&response, &self.settings.lotus_instance)
            .with_context(|| {
                format!(
                    "No base fee for Lotus instance '{}'",
                    self.settings.lotus_instance
                )
            })?;
        self.log(&format!("Current basefee: {}", base_fee))?;

        if !thresholds.base_fee_acceptable(base_fee) {
            self.log("Basefee too high to commit")?;
            return Ok(RunReport {
                decision: Decision::BaseFeeTooHigh { base_fee },
                outcome: None,
            });
        }

        let response = self
            .client
            .fetch(MetricQuery::SectorStatus)
            .context("Failed to fetch sector status")?;
        let pending = extract::pending_commits(&response, &self.settings.miner_id)
            .with_context(|| {
                format!(
                    "No pending commit count for miner '{}'",
                    self.settings.miner_id
                )
            })?;
        self.log(&format!(
            "Number of sectors waiting to be committed: {}",
            pending
        ))?;
        self.log(&format!(
            "Configured sectors commits threshold: {}",
            thresholds.commit_floor
        ))?;

        let decision = thresholds.decide_commits(base_fee, pending);
        if !decision.should_commit() {
            self.log("Not enough sectors to be committed")?;
            return Ok(RunReport {
                decision,
                outcome: None,
            });
        }

        self.log("Committing sectors...")?;
        let outcome = self
            .committer
            .commit()
            .context("Failed to commit sectors")?;
        if outcome.dry_run {
            self.log_best_effort(&format!("Dry-run, not executed: {}", outcome.command_line));
        }

        info!(base_fee, pending, dry_run = outcome.dry_run, "Commit batch published");
        Ok(RunReport {
            decision,
            outcome: Some(outcome),
        })
    }

    fn log(&self, message: &str) -> Result<()> {
        self.run_log.append(message)?;
        Ok(())
    }

    fn log_best_effort(&self, message: &str) {
        if let Err(e) = self.run_log.append(message) {
            warn!(error = %e, "Could not write run log");
        }
    }
}
