use anyhow::{Context, Result};
use csv::Writer;
use job_orchestrator::WalletReport;
use pnl_core::{ManualTrade, ManualTradeSummary, PositionAnalysis, PositionBadge, PositionStatus};
use std::io::Write;
use std::path::Path;
use tracing::info;

const CSV_HEADERS: [&str; 18] = [
    "mint",
    "symbol",
    "status",
    "badge",
    "buys",
    "sells",
    "total_invested",
    "avg_buy_price",
    "avg_sell_price",
    "realized_pnl",
    "realized_pnl_percent",
    "tokens_held",
    "unrealized_pnl",
    "unrealized_pnl_percent",
    "max_gain_possible",
    "max_drawdown",
    "missed_gains",
    "missed_gains_percent",
];

fn badge_label(badge: PositionBadge) -> &'static str {
    match badge {
        PositionBadge::Roundtrip => "ROUNDTRIP",
        PositionBadge::Holding => "HOLDING",
        PositionBadge::Closed => "CLOSED",
    }
}

fn status_label(status: PositionStatus) -> &'static str {
    match status {
        PositionStatus::Holding => "HOLDING",
        PositionStatus::Closed => "CLOSED",
    }
}

fn csv_row(analysis: &PositionAnalysis) -> Vec<String> {
    let position = &analysis.position;
    vec![
        position.mint.clone(),
        position.symbol.clone().unwrap_or_default(),
        status_label(analysis.status).to_string(),
        badge_label(analysis.badge()).to_string(),
        position.buys.len().to_string(),
        position.sells.len().to_string(),
        analysis.total_buy_amount.to_string(),
        analysis.avg_buy_price.to_string(),
        analysis.avg_sell_price.to_string(),
        analysis.realized_pnl.to_string(),
        format!("{:.2}", analysis.realized_pnl_percent),
        analysis.tokens_held.to_string(),
        analysis.unrealized_pnl.to_string(),
        format!("{:.2}", analysis.unrealized_pnl_percent),
        format!("{:.2}", analysis.max_gain_possible),
        format!("{:.2}", analysis.max_drawdown),
        analysis.missed_gains.to_string(),
        format!("{:.2}", analysis.missed_gains_percent),
    ]
}

/// Write one CSV row per position
pub fn write_positions_csv<W: Write>(report: &WalletReport, writer: W) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);

    wtr.write_record(CSV_HEADERS)
        .context("CSV header error")?;

    for analysis in &report.positions {
        wtr.write_record(csv_row(analysis))
            .with_context(|| format!("CSV row error for {}", analysis.position.mint))?;
    }

    wtr.flush().context("CSV flush error")?;
    Ok(())
}

pub fn export_positions_csv(report: &WalletReport, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Cannot create {}", path.display()))?;
    write_positions_csv(report, file)?;
    info!(
        "Wrote {} positions to {}",
        report.positions.len(),
        path.display()
    );
    Ok(())
}

/// Log a readable digest of the report
pub fn log_wallet_report(report: &WalletReport, recent_trades: usize) {
    let summary = &report.summary;
    info!(
        "{} positions | invested {} | realized {} | unrealized {} | missed {} | roundtrips {}",
        summary.count,
        summary.total_invested.round_dp(4),
        summary.total_realized.round_dp(4),
        summary.total_unrealized.round_dp(4),
        summary.total_missed.round_dp(4),
        summary.roundtrip_count
    );

    for analysis in &report.positions {
        let position = &analysis.position;
        info!(
            "[{}] {} pnl {} ({:.2}%) missed {:.2}%{}",
            badge_label(analysis.badge()),
            position.display_name(),
            analysis.total_pnl().round_dp(4),
            analysis.headline_pnl_percent(),
            analysis.missed_gains_percent,
            if analysis.has_notable_missed_gain() { " !" } else { "" }
        );

        for trade in position.recent_trades(recent_trades) {
            info!(
                "    {:?} {} @ {} ({})",
                trade.direction,
                trade.token_amount.round_dp(4),
                trade.price_per_token,
                trade.timestamp.format("%Y-%m-%d %H:%M")
            );
        }
    }
}

pub fn log_manual_trades(trades: &[ManualTrade]) {
    let summary = ManualTradeSummary::from_trades(trades);
    info!(
        "{} manual trades ({} open), {} invested",
        summary.total, summary.open, summary.invested
    );

    for trade in trades {
        match &trade.analysis {
            Some(analysis) => info!(
                "{} {:?}: pnl {:?}% max gain {:.2}% drawdown {:.2}% captured {:?}%",
                trade.token_symbol,
                trade.status(),
                analysis.pnl_percent.map(|p| p.round_dp(2)),
                analysis.max_gain_percent,
                analysis.max_drawdown_percent,
                analysis.captured_percent.map(|p| p.round_dp(2))
            ),
            None => info!("{} {:?}: insufficient price data", trade.token_symbol, trade.status()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnl_core::{aggregate_positions, PortfolioSummary, PriceReconciler, Trade, TradeDirection};
    use rust_decimal_macros::dec;

    fn report() -> WalletReport {
        let trade = Trade {
            signature: "sig".to_string(),
            timestamp: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            direction: TradeDirection::Buy,
            token_mint: "MemeMint1111".to_string(),
            token_amount: dec!(1000),
            stable_amount: dec!(100),
            price_per_token: dec!(0.1),
            stable_mint: pnl_core::USDC_MINT.to_string(),
        };
        let book = aggregate_positions(vec![trade]);
        let reconciler = PriceReconciler::default();
        let positions: Vec<_> = book.iter().map(|p| reconciler.reconcile(p, &[])).collect();

        WalletReport {
            wallet: "wallet".to_string(),
            summary: PortfolioSummary {
                count: 1,
                ..Default::default()
            },
            positions,
            swaps_fetched: 1,
            trades_classified: 1,
            generated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_csv_export() {
        let mut buffer = Vec::new();
        write_positions_csv(&report(), &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("mint,symbol,status,badge"));
        assert!(lines[1].starts_with("MemeMint1111,,HOLDING,HOLDING,1,0,100,"));
    }
}
