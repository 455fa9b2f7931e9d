use async_trait::async_trait;

use crate::swap_event::RawSwapEvent;
use crate::{OhlcvCandle, Result, TokenPriceInfo};

/// Trait for fetching a wallet's swap history
#[async_trait]
pub trait SwapSource: Send + Sync {
    /// Fetch up to `limit` enhanced swap transactions, newest first
    async fn fetch_swaps(&self, wallet: &str, limit: usize) -> Result<Vec<RawSwapEvent>>;
}

/// Trait for fetching the current market snapshot of a token
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// `Ok(None)` when the provider does not know the token
    async fn current_price(&self, mint: &str) -> Result<Option<TokenPriceInfo>>;
}

/// Trait for fetching hourly OHLCV candles for a pool
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Up to `limit` candles in ascending time order
    async fn ohlcv(&self, pair_address: &str, limit: usize) -> Result<Vec<OhlcvCandle>>;
}
