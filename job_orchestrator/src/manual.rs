use config_manager::AnalysisConfig;
use pnl_core::{CandleSource, ManualTrade, PriceReconciler, ReconcileThresholds};
use tracing::{debug, info, warn};

/// Attaches candle-based analysis to manually logged trades
pub struct ManualTradeAnalyzer<C> {
    candles: C,
    reconciler: PriceReconciler,
    candle_limit: usize,
}

impl<C: CandleSource> ManualTradeAnalyzer<C> {
    pub fn new(candles: C, config: &AnalysisConfig) -> Self {
        Self {
            candles,
            reconciler: PriceReconciler::new(ReconcileThresholds::from(config)),
            candle_limit: config.manual_candle_limit,
        }
    }

    /// Returns the trade with its analysis replaced. The analysis is None
    /// when the pool is unknown, the fetch fails or no candle falls inside
    /// the holding window.
    pub async fn analyze(&self, mut trade: ManualTrade) -> ManualTrade {
        if trade.pool_address.trim().is_empty() {
            debug!("Manual trade {} has no pool, skipping analysis", trade.id);
            trade.analysis = None;
            return trade;
        }

        let candles = match self
            .candles
            .ohlcv(&trade.pool_address, self.candle_limit)
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                warn!(
                    "Candle fetch failed for manual trade {} ({}): {}",
                    trade.id, trade.token_symbol, e
                );
                Vec::new()
            }
        };

        trade.analysis = self.reconciler.analyze_manual_trade(&trade, &candles);
        if trade.analysis.is_none() {
            debug!(
                "Insufficient price data for manual trade {} ({})",
                trade.id, trade.token_symbol
            );
        }

        trade
    }

    /// Analyze a trade log in order
    pub async fn analyze_all(&self, trades: Vec<ManualTrade>) -> Vec<ManualTrade> {
        let total = trades.len();
        let mut analyzed = Vec::with_capacity(total);

        for trade in trades {
            analyzed.push(self.analyze(trade).await);
        }

        let with_data = analyzed.iter().filter(|t| t.analysis.is_some()).count();
        info!("Analyzed {}/{} manual trades", with_data, total);

        analyzed
    }
}
