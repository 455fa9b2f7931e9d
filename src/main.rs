use anyhow::{bail, Context, Result};
use config_manager::SystemConfig;
use job_orchestrator::{ManualTradeAnalyzer, WalletAnalyzer};
use std::path::Path;
use tracing::info;

mod report;
mod snapshot;

use snapshot::{SnapshotCandleSource, SnapshotPriceSource, SnapshotSwapSource};

const USAGE: &str = "usage: sol_tracker wallet <ADDRESS> | sol_tracker manual";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sol_tracker=debug".into()),
        )
        .init();

    let config = SystemConfig::load()?;
    info!("Configuration loaded successfully");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("wallet") => {
            let wallet = args.get(1).context(USAGE)?;
            run_wallet(&config, wallet).await
        }
        Some("manual") => run_manual(&config).await,
        _ => bail!(USAGE),
    }
}

async fn run_wallet(config: &SystemConfig, wallet: &str) -> Result<()> {
    let snapshot = &config.snapshot;
    let analyzer = WalletAnalyzer::new(
        SnapshotSwapSource::new(&snapshot.swaps_path),
        SnapshotPriceSource::load(&snapshot.prices_path).await?,
        SnapshotCandleSource::new(&snapshot.candles_dir),
        &config.analysis,
    );

    let report = analyzer.analyze_wallet(wallet).await?;
    report::log_wallet_report(&report, config.analysis.recent_trades);

    if let Some(path) = &snapshot.report_csv_path {
        report::export_positions_csv(&report, Path::new(path))?;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_manual(config: &SystemConfig) -> Result<()> {
    let trades = snapshot::load_manual_trades(&config.snapshot.manual_trades_path).await?;

    let analyzer = ManualTradeAnalyzer::new(
        SnapshotCandleSource::new(&config.snapshot.candles_dir),
        &config.analysis,
    );
    let trades = analyzer.analyze_all(trades).await;
    report::log_manual_trades(&trades);

    println!("{}", serde_json::to_string_pretty(&trades)?);
    Ok(())
}
