//! Batch commit controller binary - run once per cron/timer tick

use anyhow::Context;
use batch_commit::{
    BatchCommitRunner, Cli, Command, DryRunCommitter, LotusMinerCommitter, PrometheusClient,
    SectorCommitter, Settings,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = if log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_config();
    init_tracing(cli.log_json);

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("Invalid configuration in {}", cli.config.display()))?;

    match cli.command() {
        Command::CheckConfig => {
            println!("✓ Valid config: {}", cli.config.display());
            println!("  Miner: {} ({})", settings.miner_id, settings.miner_path.display());
            println!("  Basefee threshold: {}", settings.basefee_threshold);
            println!("  Commit threshold: {}", settings.commit_threshold);
            println!(
                "  Prometheus: {} (instance {})",
                settings.base_url, settings.lotus_instance
            );
            println!("  Log: {}", settings.log_path.display());
            Ok(())
        }
        Command::Run => {
            info!("Starting Lotus batch commit controller");
            info!("Configuration:");
            info!("  Config file: {}", cli.config.display());
            info!("  Miner: {}", settings.miner_id);
            info!("  Prometheus: {}", settings.base_url);
            info!("  Dry-run: {}", cli.dry_run);

            let client = PrometheusClient::new(settings.base_url.clone(), cli.http_timeout)?;
            let miner = LotusMinerCommitter::new(cli.miner_bin.clone(), settings.miner_path.clone());

            if cli.dry_run {
                run(client, settings, DryRunCommitter::for_miner(&miner))
            } else {
                run(client, settings, miner)
            }
        }
    }
}

fn run<C: SectorCommitter>(
    client: PrometheusClient,
    settings: Settings,
    committer: C,
) -> anyhow::Result<()> {
    let runner = BatchCommitRunner::new(client, settings, committer);

    match runner.run() {
        Ok(report) => {
            info!(decision = ?report.decision, "Batch commit run finished");
            println!("{}", serde_json::to_string(&report)?);
            Ok(())
        }
        Err(e) => {
            error!("Batch commit run failed: {:#}", e);
            Err(e)
        }
    }
}
