//! Lotus batch commit controller - publishes pending sector commits when cheap
//!
//! Reads the network base fee and the miner's pending commit count from
//! Prometheus, and runs `lotus-miner sectors batching commit --publish-now`
//! when the fee is below the configured ceiling and enough sectors wait.

pub mod commit;
pub mod config;
pub mod decision;
pub mod extract;
pub mod prometheus;
pub mod run_log;
pub mod runner;

pub use commit::{DryRunCommitter, LotusMinerCommitter, SectorCommitter};
pub use config::{Cli, Command, Settings};
pub use decision::{Decision, Thresholds};
pub use prometheus::{MetricQuery, PrometheusClient};
pub use run_log::RunLog;
pub use runner::{BatchCommitRunner, RunReport};
