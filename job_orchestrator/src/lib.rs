use chrono::{DateTime, Utc};
use config_manager::AnalysisConfig;
use futures::stream::{self, StreamExt};
use pnl_core::{
    aggregate_positions, classify_swaps, sort_positions, summarize_portfolio, CandleSource,
    PortfolioSummary, Position, PositionAnalysis, PriceReconciler, PriceSource,
    ReconcileThresholds, SortKey, SwapSource,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod manual;
pub use manual::ManualTradeAnalyzer;

#[derive(Error, Debug, Clone)]
pub enum OrchestratorError {
    #[error("P&L calculation error: {0}")]
    PnL(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid wallet address: {0}")]
    InvalidWallet(String),
}

impl From<pnl_core::PnLError> for OrchestratorError {
    fn from(err: pnl_core::PnLError) -> Self {
        OrchestratorError::PnL(err.to_string())
    }
}

impl From<config_manager::ConfigurationError> for OrchestratorError {
    fn from(err: config_manager::ConfigurationError) -> Self {
        OrchestratorError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Result of one wallet analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletReport {
    pub wallet: String,
    /// Reconciled positions in the configured sort order
    pub positions: Vec<PositionAnalysis>,
    pub summary: PortfolioSummary,
    pub swaps_fetched: usize,
    pub trades_classified: usize,
    pub generated_at: DateTime<Utc>,
}

/// Runs the wallet pipeline: fetch swaps, classify, group, price, reconcile
/// and summarize.
pub struct WalletAnalyzer<S, P, C> {
    swaps: S,
    prices: P,
    candles: C,
    reconciler: PriceReconciler,
    swap_fetch_limit: usize,
    candle_limit: usize,
    concurrency: usize,
    sort_key: SortKey,
}

impl<S, P, C> WalletAnalyzer<S, P, C>
where
    S: SwapSource,
    P: PriceSource,
    C: CandleSource,
{
    pub fn new(swaps: S, prices: P, candles: C, config: &AnalysisConfig) -> Self {
        let sort_key = config.sort_by.parse::<SortKey>().unwrap_or_else(|e| {
            warn!("{}, sorting by {}", e, SortKey::default());
            SortKey::default()
        });

        Self {
            swaps,
            prices,
            candles,
            reconciler: PriceReconciler::new(ReconcileThresholds::from(config)),
            swap_fetch_limit: config.swap_fetch_limit,
            candle_limit: config.position_candle_limit,
            concurrency: config.price_concurrency.max(1),
            sort_key,
        }
    }

    /// Override the report ordering
    pub fn with_sort_key(mut self, sort_key: SortKey) -> Self {
        self.sort_key = sort_key;
        self
    }

    /// Analyze every position in a wallet. A swap fetch failure aborts the
    /// run; price and candle failures only degrade the affected position.
    pub async fn analyze_wallet(&self, wallet: &str) -> Result<WalletReport> {
        let wallet = wallet.trim();
        if wallet.is_empty() {
            return Err(OrchestratorError::InvalidWallet(
                "wallet address cannot be empty".to_string(),
            ));
        }

        info!("Starting wallet analysis for {}", wallet);

        let events = self
            .swaps
            .fetch_swaps(wallet, self.swap_fetch_limit)
            .await?;
        let swaps_fetched = events.len();

        let trades = classify_swaps(&events, wallet);
        let trades_classified = trades.len();

        let book = aggregate_positions(trades);
        info!(
            "Wallet {}: {} swaps, {} trades, {} positions",
            wallet,
            swaps_fetched,
            trades_classified,
            book.len()
        );

        let mut positions: Vec<PositionAnalysis> = stream::iter(book.into_positions())
            .map(|position| self.reconcile_position(position))
            .buffered(self.concurrency)
            .collect()
            .await;

        sort_positions(&mut positions, self.sort_key);
        let summary = summarize_portfolio(&positions);

        info!(
            "Wallet {} analyzed: invested={}, realized={}, unrealized={}, roundtrips={}",
            wallet,
            summary.total_invested,
            summary.total_realized,
            summary.total_unrealized,
            summary.roundtrip_count
        );

        Ok(WalletReport {
            wallet: wallet.to_string(),
            positions,
            summary,
            swaps_fetched,
            trades_classified,
            generated_at: Utc::now(),
        })
    }

    async fn reconcile_position(&self, position: Position) -> PositionAnalysis {
        let position = match self.prices.current_price(&position.mint).await {
            Ok(Some(info)) => position.with_price_info(info),
            Ok(None) => {
                debug!("No price data for {}", position.mint);
                position
            }
            Err(e) => {
                warn!("Price lookup failed for {}: {}", position.mint, e);
                position
            }
        };

        let candles = match position.pair_address.as_deref() {
            Some(pair) => match self.candles.ohlcv(pair, self.candle_limit).await {
                Ok(candles) => candles,
                Err(e) => {
                    warn!(
                        "Candle fetch failed for {} (pool {}): {}",
                        position.mint, pair, e
                    );
                    Vec::new()
                }
            },
            None => {
                debug!("No pool known for {}, skipping candles", position.mint);
                Vec::new()
            }
        };

        self.reconciler.reconcile(&position, &candles)
    }
}
