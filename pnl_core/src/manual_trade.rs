use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::math::{percent_change, percent_of};
use crate::reconciler::PriceReconciler;
use crate::{OhlcvCandle, PnLError, Result};

/// A trade logged by hand: one buy and an optional sell
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManualTrade {
    pub id: Uuid,
    pub token_address: String,
    pub token_symbol: String,
    pub token_name: Option<String>,

    /// Pool used to look up candles
    pub pool_address: String,
    pub dex_id: Option<String>,
    pub chain_id: String,

    /// USD price per token at entry
    pub buy_price: Decimal,
    /// USD spent
    pub buy_amount: Decimal,
    pub buy_market_cap: Option<Decimal>,
    pub buy_timestamp: DateTime<Utc>,

    pub sell_price: Option<Decimal>,
    pub sell_timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,

    /// Result of the last candle analysis, if any
    #[serde(default)]
    pub analysis: Option<TradeAnalysis>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ManualTradeStatus {
    Open,
    Closed,
}

/// Price action observed between a manual trade's entry and exit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeAnalysis {
    /// Lowest low in the window
    pub min_price: Decimal,
    /// Highest high in the window
    pub max_price: Decimal,
    /// Realized return, only when a sell price was logged
    pub pnl_percent: Option<Decimal>,
    pub max_gain_percent: Decimal,
    pub max_drawdown_percent: Decimal,
    /// Share of the available upside that was actually captured. Can be
    /// negative, or above 100 when the sell beat the recorded high.
    pub captured_percent: Option<Decimal>,
    pub candle_count: usize,
}

impl ManualTrade {
    pub fn new(
        token_address: impl Into<String>,
        token_symbol: impl Into<String>,
        pool_address: impl Into<String>,
        buy_price: Decimal,
        buy_amount: Decimal,
        buy_timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        if buy_price <= Decimal::ZERO {
            return Err(PnLError::InvalidTrade(format!(
                "buy price must be positive, got {}",
                buy_price
            )));
        }
        if buy_amount < Decimal::ZERO {
            return Err(PnLError::InvalidTrade(format!(
                "buy amount cannot be negative, got {}",
                buy_amount
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            token_address: token_address.into(),
            token_symbol: token_symbol.into(),
            token_name: None,
            pool_address: pool_address.into(),
            dex_id: None,
            chain_id: "solana".to_string(),
            buy_price,
            buy_amount,
            buy_market_cap: None,
            buy_timestamp,
            sell_price: None,
            sell_timestamp: None,
            notes: String::new(),
            created_at: Utc::now(),
            analysis: None,
        })
    }

    /// Record the exit. A non-positive price is not a sell and leaves the
    /// trade open.
    pub fn with_sell(mut self, price: Decimal, timestamp: Option<DateTime<Utc>>) -> Self {
        if price <= Decimal::ZERO {
            debug!("Ignoring non-positive sell price {} for {}", price, self.token_symbol);
            return self;
        }
        self.sell_price = Some(price);
        self.sell_timestamp = timestamp;
        self
    }

    pub fn with_token_name(mut self, name: impl Into<String>) -> Self {
        self.token_name = Some(name.into());
        self
    }

    pub fn with_market_cap(mut self, market_cap: Decimal) -> Self {
        self.buy_market_cap = Some(market_cap);
        self
    }

    pub fn with_dex(mut self, dex_id: impl Into<String>, chain_id: impl Into<String>) -> Self {
        self.dex_id = Some(dex_id.into());
        self.chain_id = chain_id.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Logged sell price, if it is positive
    pub fn exit_price(&self) -> Option<Decimal> {
        self.sell_price.filter(|price| *price > Decimal::ZERO)
    }

    /// Open until a positive sell price is logged
    pub fn status(&self) -> ManualTradeStatus {
        if self.exit_price().is_some() {
            ManualTradeStatus::Closed
        } else {
            ManualTradeStatus::Open
        }
    }

    /// Realized return when sold, otherwise the return at `current_price`
    pub fn live_pnl_percent(&self, current_price: Option<Decimal>) -> Option<Decimal> {
        self.exit_price()
            .or(current_price)
            .map(|exit| percent_change(exit, self.buy_price))
    }
}

impl PriceReconciler {
    /// Analyze a manual trade against candles, closing the window at the sell
    /// time or now. Returns None when no candle falls in the window.
    pub fn analyze_manual_trade(
        &self,
        trade: &ManualTrade,
        candles: &[OhlcvCandle],
    ) -> Option<TradeAnalysis> {
        self.analyze_manual_trade_at(trade, candles, Utc::now())
    }

    /// Same as [`PriceReconciler::analyze_manual_trade`] with an explicit
    /// clock for open trades.
    pub fn analyze_manual_trade_at(
        &self,
        trade: &ManualTrade,
        candles: &[OhlcvCandle],
        now: DateTime<Utc>,
    ) -> Option<TradeAnalysis> {
        let window_start = trade.buy_timestamp;
        let window_end = trade.sell_timestamp.unwrap_or(now);

        let mut window = candles
            .iter()
            .filter(|c| c.timestamp >= window_start && c.timestamp <= window_end);

        let first = match window.next() {
            Some(candle) => candle,
            None => {
                debug!(
                    "No candles for {} between {} and {} (of {} supplied)",
                    trade.token_symbol,
                    window_start,
                    window_end,
                    candles.len()
                );
                return None;
            }
        };

        let (min_price, max_price, candle_count) = window.fold(
            (first.low, first.high, 1usize),
            |(min, max, count), c| (min.min(c.low), max.max(c.high), count + 1),
        );

        let pnl_percent = trade
            .exit_price()
            .map(|sell| percent_change(sell, trade.buy_price));
        let max_gain_percent = percent_change(max_price, trade.buy_price);
        let max_drawdown_percent = percent_change(min_price, trade.buy_price);

        let captured_percent = match pnl_percent {
            Some(pnl) if max_gain_percent > Decimal::ZERO => Some(percent_of(pnl, max_gain_percent)),
            _ => None,
        };

        debug!(
            "Manual trade {} ({}): {} candles, max_gain={}%, captured={:?}",
            trade.id, trade.token_symbol, candle_count, max_gain_percent, captured_percent
        );

        Some(TradeAnalysis {
            min_price,
            max_price,
            pnl_percent,
            max_gain_percent,
            max_drawdown_percent,
            captured_percent,
            candle_count,
        })
    }
}

/// Totals across a user's manual trade log
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ManualTradeSummary {
    pub total: usize,
    pub open: usize,
    /// USD spent across all entries
    pub invested: Decimal,
}

impl ManualTradeSummary {
    pub fn from_trades(trades: &[ManualTrade]) -> Self {
        Self {
            total: trades.len(),
            open: trades
                .iter()
                .filter(|t| t.status() == ManualTradeStatus::Open)
                .count(),
            invested: trades.iter().map(|t| t.buy_amount).sum(),
        }
    }
}

/// Parse a user-entered timestamp. Accepts RFC 3339, a local form value
/// (`2024-01-15T10:30` or with seconds) and a bare date. Values without an
/// offset are taken as UTC.
pub fn parse_trade_timestamp(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let naive = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| PnLError::InvalidTimestamp(input.to_string()))?;
        return Ok(Utc.from_utc_datetime(&naive));
    }

    Err(PnLError::InvalidTimestamp(input.to_string()))
}
