use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::{shorten_address, TokenPriceInfo, Trade, TradeDirection};

/// All trades for one token mint within a wallet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    /// Token mint address
    pub mint: String,

    /// Token symbol (if known)
    pub symbol: Option<String>,

    /// Token name (if known)
    pub name: Option<String>,

    /// Buys in the order they were observed
    pub buys: Vec<Trade>,

    /// Sells in the order they were observed
    pub sells: Vec<Trade>,

    /// Latest USD price from the price provider
    pub current_price: Option<Decimal>,

    /// Most liquid pool, used to look up candles
    pub pair_address: Option<String>,

    pub market_cap: Option<Decimal>,

    pub price_change_24h: Option<Decimal>,
}

impl Position {
    pub fn new(mint: impl Into<String>) -> Self {
        Self {
            mint: mint.into(),
            symbol: None,
            name: None,
            buys: Vec::new(),
            sells: Vec::new(),
            current_price: None,
            pair_address: None,
            market_cap: None,
            price_change_24h: None,
        }
    }

    /// Attach the market snapshot returned by a price provider
    pub fn with_price_info(mut self, info: TokenPriceInfo) -> Self {
        self.symbol = Some(info.symbol);
        self.name = Some(info.name);
        self.current_price = Some(info.price);
        self.market_cap = info.market_cap;
        self.price_change_24h = info.price_change_24h;
        self.pair_address = info.pair_address;
        self
    }

    pub fn trade_count(&self) -> usize {
        self.buys.len() + self.sells.len()
    }

    /// Symbol when known, otherwise the shortened mint
    pub fn display_name(&self) -> String {
        match &self.symbol {
            Some(symbol) if !symbol.is_empty() => symbol.clone(),
            _ => shorten_address(&self.mint),
        }
    }

    /// Buys and sells merged, newest first, at most `limit` entries
    pub fn recent_trades(&self, limit: usize) -> Vec<&Trade> {
        let mut trades: Vec<&Trade> = self.buys.iter().chain(self.sells.iter()).collect();
        trades.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        trades.truncate(limit);
        trades
    }

    fn push(&mut self, trade: Trade) {
        match trade.direction {
            TradeDirection::Buy => self.buys.push(trade),
            TradeDirection::Sell => self.sells.push(trade),
        }
    }
}

/// Positions keyed by mint, kept in order of each mint's first trade
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: Vec<Position>,
    index: HashMap<String, usize>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_trade(&mut self, trade: Trade) {
        let slot = match self.index.get(&trade.token_mint) {
            Some(&slot) => slot,
            None => {
                let slot = self.positions.len();
                self.positions.push(Position::new(trade.token_mint.clone()));
                self.index.insert(trade.token_mint.clone(), slot);
                slot
            }
        };

        self.positions[slot].push(trade);
    }

    pub fn get(&self, mint: &str) -> Option<&Position> {
        self.index.get(mint).map(|&slot| &self.positions[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn into_positions(self) -> Vec<Position> {
        self.positions
    }
}

/// Partition trades into per-mint positions. Pure grouping: no pricing,
/// no sorting.
pub fn aggregate_positions(trades: impl IntoIterator<Item = Trade>) -> PositionBook {
    let mut book = PositionBook::new();
    let mut trade_count = 0usize;

    for trade in trades {
        trade_count += 1;
        book.insert_trade(trade);
    }

    debug!(
        "Grouped {} trades into {} positions",
        trade_count,
        book.len()
    );

    book
}
