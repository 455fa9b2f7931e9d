pub mod manual_trade;
pub mod math;
pub mod portfolio;
pub mod position;
pub mod reconciler;
pub mod sources;
pub mod swap_classifier;
pub mod swap_event;

pub use manual_trade::{
    parse_trade_timestamp, ManualTrade, ManualTradeStatus, ManualTradeSummary, TradeAnalysis,
};
pub use portfolio::{sort_positions, summarize_portfolio, PortfolioSummary, SortKey};
pub use position::{aggregate_positions, Position, PositionBook};
pub use reconciler::{
    PositionAnalysis, PositionBadge, PositionStatus, PriceReconciler, ReconcileThresholds,
    DUST_THRESHOLD, ROUNDTRIP_MULTIPLIER,
};
pub use sources::{CandleSource, PriceSource, SwapSource};
pub use swap_classifier::{classify_swap, classify_swaps, is_stable_mint};
pub use swap_event::{RawSwapEvent, SwapLeg};

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wrapped SOL mint; native SOL legs are reported under this mint
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

/// Recognized stablecoins (SOL is checked separately)
pub const STABLECOIN_MINTS: [&str; 2] = [USDC_MINT, USDT_MINT];

/// Decimals used for native SOL amounts (lamports)
pub const NATIVE_DECIMALS: u32 = 9;

#[derive(Error, Debug)]
pub enum PnLError {
    #[error("Swap fetching error: {0}")]
    SwapFetch(String),
    #[error("Price fetching error: {0}")]
    PriceFetch(String),
    #[error("Candle fetching error: {0}")]
    CandleFetch(String),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Invalid manual trade: {0}")]
    InvalidTrade(String),
}

pub type Result<T> = std::result::Result<T, PnLError>;

/// Direction of a trade relative to the non-stable token
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    Buy,
    Sell,
}

/// A directional swap between a stable asset and a token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    /// Transaction signature
    pub signature: String,

    /// Block time of the swap
    pub timestamp: DateTime<Utc>,

    pub direction: TradeDirection,

    /// Mint of the non-stable token
    pub token_mint: String,

    /// Human-readable token quantity
    pub token_amount: Decimal,

    /// Stable asset spent (buy) or received (sell)
    pub stable_amount: Decimal,

    /// stable_amount / token_amount, zero when no tokens moved
    pub price_per_token: Decimal,

    /// Mint of the stable leg
    pub stable_mint: String,
}

impl Trade {
    pub fn is_buy(&self) -> bool {
        self.direction == TradeDirection::Buy
    }
}

/// One hourly OHLCV bar from a candle provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OhlcvCandle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Option<Decimal>,
}

impl OhlcvCandle {
    /// Build a candle from a provider row `[unix_seconds, open, high, low, close, volume?]`.
    /// Returns None for short rows or values that do not fit a Decimal.
    pub fn from_row(row: &[f64]) -> Option<Self> {
        if row.len() < 5 {
            return None;
        }

        let timestamp = DateTime::from_timestamp(row[0] as i64, 0)?;

        Some(Self {
            timestamp,
            open: Decimal::from_f64(row[1])?,
            high: Decimal::from_f64(row[2])?,
            low: Decimal::from_f64(row[3])?,
            close: Decimal::from_f64(row[4])?,
            volume: row.get(5).and_then(|v| Decimal::from_f64(*v)),
        })
    }
}

/// Current market snapshot for a token as reported by a price provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenPriceInfo {
    pub price: Decimal,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub market_cap: Option<Decimal>,
    #[serde(default)]
    pub price_change_24h: Option<Decimal>,
    #[serde(default)]
    pub pair_address: Option<String>,
}

/// Shorten a mint or wallet address for display, e.g. `So11...1112`
pub fn shorten_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 8 {
        return address.to_string();
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
