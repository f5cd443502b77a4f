//! Configuration for the batch commit controller
//!
//! Process-level switches come from the command line or environment; the
//! thresholds and endpoints live in an INI file shared with the ops tooling.

use crate::decision::Thresholds;
use clap::{Parser, Subcommand};
use config_loader::{ConfigError, IniDocument};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/usr/local/bin/batch_commit.conf";

const LOTUS: &str = "lotus";
const PROMETHEUS: &str = "prometheus";
const LOG: &str = "log";

/// Command-line options for the batch commit controller
#[derive(Debug, Clone, Parser)]
#[command(name = "lotus-batch-commit", version)]
#[command(about = "Publishes pending sector commits when the network base fee is low")]
pub struct Cli {
    /// Path to the INI configuration file
    #[arg(
        long,
        env = "BATCH_COMMIT_CONFIG",
        default_value = DEFAULT_CONFIG_PATH,
        global = true
    )]
    pub config: PathBuf,

    /// Dry-run mode (log the commit command, do not run it)
    #[arg(long, env = "DRY_RUN", global = true)]
    pub dry_run: bool,

    /// Output logs in JSON format
    #[arg(long, env = "LOG_JSON", global = true)]
    pub log_json: bool,

    /// lotus-miner executable to invoke
    #[arg(long, env = "LOTUS_MINER_BIN", default_value = "lotus-miner", global = true)]
    pub miner_bin: String,

    /// Timeout for each metrics query (e.g. "30s", "2m")
    #[arg(
        long,
        env = "HTTP_TIMEOUT",
        default_value = "30s",
        value_parser = humantime::parse_duration,
        global = true
    )]
    pub http_timeout: Duration,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Check thresholds and commit if both pass (default)
    Run,
    /// Load and validate the configuration file, then exit
    CheckConfig,
}

impl Cli {
    /// Parse options from command-line args and environment variables
    pub fn parse_config() -> Self {
        Cli::parse()
    }

    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}

/// Settings read from the INI file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Exported as LOTUS_MINER_PATH for lotus-miner
    pub miner_path: PathBuf,
    pub miner_id: String,
    pub basefee_threshold: u64,
    pub commit_threshold: u64,
    /// Prometheus instant query endpoint, e.g. http://host:9090/api/v1/query
    pub base_url: String,
    /// `instance` label of the Lotus daemon exporting the base fee
    pub lotus_instance: String,
    pub log_path: PathBuf,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let document = IniDocument::load(path)?;
        Self::from_document(&document)
    }

    pub fn from_document(doc: &IniDocument) -> Result<Self, ConfigError> {
        let base_url = non_empty(doc, PROMETHEUS, "BaseURL")?;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(invalid(
                PROMETHEUS,
                "BaseURL",
                &base_url,
                "must start with http:// or https://",
            ));
        }

        Ok(Self {
            miner_path: PathBuf::from(non_empty(doc, LOTUS, "MinerPath")?),
            miner_id: non_empty(doc, LOTUS, "MinerID")?,
            basefee_threshold: doc.require_parsed(LOTUS, "BasefeeThreshold")?,
            commit_threshold: doc.require_parsed(LOTUS, "CommitThreshold")?,
            base_url,
            lotus_instance: non_empty(doc, PROMETHEUS, "LotusInstance")?,
            log_path: PathBuf::from(non_empty(doc, LOG, "LogPath")?),
        })
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            basefee_ceiling: self.basefee_threshold,
            commit_floor: self.commit_threshold,
        }
    }
}

fn non_empty(doc: &IniDocument, section: &str, key: &str) -> Result<String, ConfigError> {
    let value = doc.require(section, key)?;
    if value.is_empty() {
        return Err(invalid(section, key, &value, "must not be empty"));
    }
    Ok(value)
}

fn invalid(section: &str, key: &str, value: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "\
[lotus]
MinerPath = /home/lotus/.lotusminer
MinerID = f01234
BasefeeThreshold = 200000000
CommitThreshold = 10

[prometheus]
BaseURL = http://prometheus:9090/api/v1/query
LotusInstance = lotus:1234

[log]
LogPath = /var/log/batch_commit.log
";

    fn settings_from(content: &str) -> Result<Settings, ConfigError> {
        Settings::from_document(&IniDocument::parse(content).unwrap())
    }

    #[test]
    fn test_settings_from_valid_document() {
        let settings = settings_from(VALID).unwrap();

        assert_eq!(settings.miner_path, PathBuf::from("/home/lotus/.lotusminer"));
        assert_eq!(settings.miner_id, "f01234");
        assert_eq!(settings.basefee_threshold, 200_000_000);
        assert_eq!(settings.commit_threshold, 10);
        assert_eq!(settings.base_url, "http://prometheus:9090/api/v1/query");
        assert_eq!(settings.lotus_instance, "lotus:1234");
        assert_eq!(settings.log_path, PathBuf::from("/var/log/batch_commit.log"));
    }

    #[test]
    fn test_thresholds_follow_settings() {
        let thresholds = settings_from(VALID).unwrap().thresholds();
        assert_eq!(thresholds.basefee_ceiling, 200_000_000);
        assert_eq!(thresholds.commit_floor, 10);
    }

    #[test]
    fn test_missing_log_section() {
        let content = VALID.replace("[log]\nLogPath = /var/log/batch_commit.log\n", "");
        let err = settings_from(&content).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSection { ref section } if section == "log"));
    }

    #[test]
    fn test_non_numeric_threshold_rejected() {
        let content = VALID.replace("CommitThreshold = 10", "CommitThreshold = ten");
        let err = settings_from(&content).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CommitThreshold"));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let content = VALID.replace("BasefeeThreshold = 200000000", "BasefeeThreshold = -1");
        assert!(settings_from(&content).is_err());
    }

    #[test]
    fn test_base_url_requires_http_scheme() {
        let content = VALID.replace(
            "BaseURL = http://prometheus:9090/api/v1/query",
            "BaseURL = prometheus:9090/api/v1/query",
        );
        let err = settings_from(&content).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BaseURL"));
    }

    #[test]
    fn test_empty_miner_id_rejected() {
        let content = VALID.replace("MinerID = f01234", "MinerID =");
        let err = settings_from(&content).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MinerID"));
    }

    #[test]
    fn test_settings_interpolate_references() {
        let content = VALID
            .replace("[lotus]\n", "[DEFAULT]\nroot = /srv/lotus\n\n[lotus]\n")
            .replace("MinerPath = /home/lotus/.lotusminer", "MinerPath = %(root)s/miner")
            .replace(
                "BaseURL = http://prometheus:9090/api/v1/query",
                "BaseURL = http://prometheus:9090/api/v1/query?timeout=5%%",
            );
        let settings = settings_from(&content).unwrap();

        assert_eq!(settings.miner_path, PathBuf::from("/srv/lotus/miner"));
        assert_eq!(
            settings.base_url,
            "http://prometheus:9090/api/v1/query?timeout=5%"
        );
    }

    #[test]
    fn test_cli_defaults() {
        for var in [
            "BATCH_COMMIT_CONFIG",
            "DRY_RUN",
            "LOG_JSON",
            "LOTUS_MINER_BIN",
            "HTTP_TIMEOUT",
        ] {
            std::env::remove_var(var);
        }
        let cli = Cli::try_parse_from(["lotus-batch-commit"]).unwrap();

        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!cli.dry_run);
        assert_eq!(cli.miner_bin, "lotus-miner");
        assert_eq!(cli.http_timeout, Duration::from_secs(30));
        assert_eq!(cli.command(), Command::Run);
    }

    #[test]
    fn test_cli_check_config_with_options() {
        let cli = Cli::try_parse_from([
            "lotus-batch-commit",
            "check-config",
            "--config",
            "/etc/bc.conf",
            "--http-timeout",
            "2m",
        ])
        .unwrap();

        assert_eq!(cli.command(), Command::CheckConfig);
        assert_eq!(cli.config, PathBuf::from("/etc/bc.conf"));
        assert_eq!(cli.http_timeout, Duration::from_secs(120));
    }
}
