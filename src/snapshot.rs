//! File-backed sources for running the pipeline offline against saved
//! provider responses.

use async_trait::async_trait;
use pnl_core::{
    parse_trade_timestamp, CandleSource, ManualTrade, OhlcvCandle, PnLError, PriceSource,
    RawSwapEvent, Result, SwapSource, TokenPriceInfo,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Saved enhanced-transactions response: a JSON array of swaps, newest first
pub struct SnapshotSwapSource {
    path: PathBuf,
}

impl SnapshotSwapSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SwapSource for SnapshotSwapSource {
    async fn fetch_swaps(&self, wallet: &str, limit: usize) -> Result<Vec<RawSwapEvent>> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| PnLError::SwapFetch(format!("{}: {}", self.path.display(), e)))?;

        let mut events: Vec<RawSwapEvent> = serde_json::from_str(&body)
            .map_err(|e| PnLError::SwapFetch(format!("{}: {}", self.path.display(), e)))?;
        events.truncate(limit);

        debug!(
            "Loaded {} swaps for {} from {}",
            events.len(),
            wallet,
            self.path.display()
        );
        Ok(events)
    }
}

/// Saved token snapshots keyed by mint
pub struct SnapshotPriceSource {
    prices: HashMap<String, TokenPriceInfo>,
}

impl SnapshotPriceSource {
    pub fn new(prices: HashMap<String, TokenPriceInfo>) -> Self {
        Self { prices }
    }

    /// Load a `{ "<mint>": { price, symbol, ... } }` file. A missing file is
    /// treated as no price data at all.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let body = match tokio::fs::read_to_string(path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Price snapshot {} not found, prices unavailable", path.display());
                return Ok(Self::new(HashMap::new()));
            }
            Err(e) => return Err(PnLError::PriceFetch(format!("{}: {}", path.display(), e))),
        };

        let prices: HashMap<String, TokenPriceInfo> = serde_json::from_str(&body)
            .map_err(|e| PnLError::PriceFetch(format!("{}: {}", path.display(), e)))?;

        debug!("Loaded {} price snapshots from {}", prices.len(), path.display());
        Ok(Self::new(prices))
    }
}

#[async_trait]
impl PriceSource for SnapshotPriceSource {
    async fn current_price(&self, mint: &str) -> Result<Option<TokenPriceInfo>> {
        Ok(self.prices.get(mint).cloned())
    }
}

#[derive(Debug, Deserialize)]
struct OhlcvResponse {
    data: OhlcvData,
}

#[derive(Debug, Deserialize)]
struct OhlcvData {
    attributes: OhlcvAttributes,
}

#[derive(Debug, Deserialize)]
struct OhlcvAttributes {
    #[serde(default)]
    ohlcv_list: Vec<Vec<f64>>,
}

/// Parse an hourly OHLCV response into ascending candles, keeping the newest
/// `limit`. Malformed rows are skipped.
pub fn parse_ohlcv_response(body: &str, limit: usize) -> Result<Vec<OhlcvCandle>> {
    let response: OhlcvResponse =
        serde_json::from_str(body).map_err(|e| PnLError::CandleFetch(e.to_string()))?;

    let rows = response.data.attributes.ohlcv_list;
    let total = rows.len();
    let mut candles: Vec<OhlcvCandle> = rows
        .iter()
        .filter_map(|row| OhlcvCandle::from_row(row))
        .collect();

    if candles.len() < total {
        debug!("Skipped {} malformed OHLCV rows", total - candles.len());
    }

    candles.sort_by_key(|c| c.timestamp);
    if candles.len() > limit {
        candles.drain(..candles.len() - limit);
    }

    Ok(candles)
}

/// Directory of `<pair_address>.json` OHLCV responses
pub struct SnapshotCandleSource {
    dir: PathBuf,
}

impl SnapshotCandleSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl CandleSource for SnapshotCandleSource {
    async fn ohlcv(&self, pair_address: &str, limit: usize) -> Result<Vec<OhlcvCandle>> {
        let path = self.dir.join(format!("{}.json", pair_address));
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No candle snapshot for pool {}", pair_address);
                return Ok(Vec::new());
            }
            Err(e) => return Err(PnLError::CandleFetch(format!("{}: {}", path.display(), e))),
        };

        parse_ohlcv_response(&body, limit)
    }
}

/// A manual trade as typed into the trade log
#[derive(Debug, Clone, Deserialize)]
pub struct ManualTradeEntry {
    pub token_address: String,
    pub token_symbol: String,
    #[serde(default)]
    pub token_name: Option<String>,
    pub pool_address: String,
    #[serde(default)]
    pub dex_id: Option<String>,
    pub buy_price: Decimal,
    pub buy_amount: Decimal,
    #[serde(default)]
    pub buy_market_cap: Option<Decimal>,
    pub buy_time: String,
    #[serde(default)]
    pub sell_price: Option<Decimal>,
    #[serde(default)]
    pub sell_time: Option<String>,
    #[serde(default)]
    pub notes: String,
}

impl ManualTradeEntry {
    pub fn into_trade(self) -> Result<ManualTrade> {
        let buy_timestamp = parse_trade_timestamp(&self.buy_time)?;
        let sell_timestamp = match self.sell_time.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => Some(parse_trade_timestamp(t)?),
            _ => None,
        };

        let mut trade = ManualTrade::new(
            self.token_address,
            self.token_symbol,
            self.pool_address,
            self.buy_price,
            self.buy_amount,
            buy_timestamp,
        )?
        .with_notes(self.notes);

        if let Some(name) = self.token_name {
            trade = trade.with_token_name(name);
        }
        if let Some(dex_id) = self.dex_id {
            trade = trade.with_dex(dex_id, "solana");
        }
        if let Some(market_cap) = self.buy_market_cap {
            trade = trade.with_market_cap(market_cap);
        }
        if let Some(price) = self.sell_price {
            trade = trade.with_sell(price, sell_timestamp);
        }

        Ok(trade)
    }
}

/// Load a JSON array of trade log entries
pub async fn load_manual_trades(path: impl AsRef<Path>) -> Result<Vec<ManualTrade>> {
    let path = path.as_ref();
    let body = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PnLError::InvalidTrade(format!("{}: {}", path.display(), e)))?;

    let entries: Vec<ManualTradeEntry> = serde_json::from_str(&body)
        .map_err(|e| PnLError::InvalidTrade(format!("{}: {}", path.display(), e)))?;

    entries.into_iter().map(ManualTradeEntry::into_trade).collect()
}
