use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::math::{guarded_div, percent_change, percent_of};
use crate::position::Position;
use crate::{OhlcvCandle, Trade};

/// A held position whose post-buy high exceeded this multiple of the average
/// buy price, and which now trades below cost, is flagged as a roundtrip.
pub const ROUNDTRIP_MULTIPLIER: Decimal = Decimal::from_parts(15, 0, 0, false, 1);

/// Balances at or below this many tokens count as closed.
pub const DUST_THRESHOLD: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Missed-gain percentage above which a closed trade is worth highlighting
const NOTABLE_MISSED_PERCENT: Decimal = Decimal::TEN;

/// Policy knobs for position reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileThresholds {
    pub roundtrip_multiplier: Decimal,
    pub dust_threshold: Decimal,
}

impl Default for ReconcileThresholds {
    fn default() -> Self {
        Self {
            roundtrip_multiplier: ROUNDTRIP_MULTIPLIER,
            dust_threshold: DUST_THRESHOLD,
        }
    }
}

impl From<&config_manager::AnalysisConfig> for ReconcileThresholds {
    fn from(config: &config_manager::AnalysisConfig) -> Self {
        let roundtrip_multiplier = Decimal::from_f64(config.roundtrip_multiplier)
            .unwrap_or_else(|| {
                warn!(
                    "Unusable roundtrip_multiplier {}, using {}",
                    config.roundtrip_multiplier, ROUNDTRIP_MULTIPLIER
                );
                ROUNDTRIP_MULTIPLIER
            });
        let dust_threshold = Decimal::from_f64(config.dust_threshold).unwrap_or_else(|| {
            warn!(
                "Unusable dust_threshold {}, using {}",
                config.dust_threshold, DUST_THRESHOLD
            );
            DUST_THRESHOLD
        });

        Self {
            roundtrip_multiplier,
            dust_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Holding,
    Closed,
}

/// Single headline label for a position; roundtrip outranks holding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PositionBadge {
    Roundtrip,
    Holding,
    Closed,
}

/// A position joined with its price history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionAnalysis {
    #[serde(flatten)]
    pub position: Position,

    /// Stable spent across all buys
    pub total_buy_amount: Decimal,
    pub total_buy_tokens: Decimal,
    pub avg_buy_price: Decimal,

    /// Stable received across all sells
    pub total_sell_amount: Decimal,
    pub total_sell_tokens: Decimal,
    pub avg_sell_price: Decimal,

    pub realized_pnl: Decimal,
    pub realized_pnl_percent: Decimal,

    /// May be negative when more was sold than bought in the observed window
    pub tokens_held: Decimal,
    pub unrealized_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_percent: Decimal,

    /// Excursion extrema from the candle scan
    pub max_price_after_buy: Decimal,
    /// Zero when no price data was available
    pub min_price_after_buy: Decimal,
    pub max_price_after_sell: Decimal,

    /// Percent move from the average buy price to the post-buy high
    pub max_gain_possible: Decimal,
    /// Percent move from the average buy price to the post-buy low
    pub max_drawdown: Decimal,

    pub missed_gains: Decimal,
    pub missed_gains_percent: Decimal,

    pub is_roundtrip: bool,
    pub status: PositionStatus,
}

impl PositionAnalysis {
    pub fn total_pnl(&self) -> Decimal {
        self.realized_pnl.saturating_add(self.unrealized_pnl)
    }

    /// Unrealized % for open positions, realized % for closed ones
    pub fn headline_pnl_percent(&self) -> Decimal {
        match self.status {
            PositionStatus::Holding => self.unrealized_pnl_percent,
            PositionStatus::Closed => self.realized_pnl_percent,
        }
    }

    pub fn badge(&self) -> PositionBadge {
        if self.is_roundtrip {
            PositionBadge::Roundtrip
        } else {
            match self.status {
                PositionStatus::Holding => PositionBadge::Holding,
                PositionStatus::Closed => PositionBadge::Closed,
            }
        }
    }

    pub fn has_notable_missed_gain(&self) -> bool {
        self.missed_gains_percent > NOTABLE_MISSED_PERCENT
    }
}

/// Running extrema over the candles that follow a position's entry and exit
#[derive(Debug, Clone)]
struct Excursion {
    max_after_buy: Decimal,
    /// None until a price is observed
    min_after_buy: Option<Decimal>,
    max_after_sell: Decimal,
}

impl Excursion {
    /// Seed every extreme with the live price. A missing or zero live price
    /// leaves the minimum unset so that candle lows can take over.
    fn seeded(current_price: Option<Decimal>) -> Self {
        let seed = current_price.unwrap_or(Decimal::ZERO);
        Self {
            max_after_buy: seed,
            min_after_buy: current_price.filter(|p| !p.is_zero()),
            max_after_sell: seed,
        }
    }

    fn scan(
        mut self,
        candles: &[OhlcvCandle],
        first_buy: Option<DateTime<Utc>>,
        last_sell: Option<DateTime<Utc>>,
    ) -> Self {
        for candle in candles {
            let after_buy = first_buy.map_or(true, |t| candle.timestamp > t);
            if after_buy {
                self.max_after_buy = self.max_after_buy.max(candle.high);
                self.min_after_buy = Some(match self.min_after_buy {
                    Some(min) => min.min(candle.low),
                    None => candle.low,
                });
            }

            if let Some(sold_at) = last_sell {
                if candle.timestamp > sold_at {
                    self.max_after_sell = self.max_after_sell.max(candle.high);
                }
            }
        }

        self
    }
}

fn totals(trades: &[Trade]) -> (Decimal, Decimal) {
    trades.iter().fold((Decimal::ZERO, Decimal::ZERO), |(stable, tokens), t| {
        (
            stable.saturating_add(t.stable_amount),
            tokens.saturating_add(t.token_amount),
        )
    })
}

/// Joins positions (or single manual trades) with an external candle series
#[derive(Debug, Clone, Default)]
pub struct PriceReconciler {
    thresholds: ReconcileThresholds,
}

impl PriceReconciler {
    pub fn new(thresholds: ReconcileThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ReconcileThresholds {
        &self.thresholds
    }

    /// Compute cost basis, P&L, excursion and missed-gain metrics for one
    /// position. Pure: identical inputs give identical output.
    pub fn reconcile(&self, position: &Position, candles: &[OhlcvCandle]) -> PositionAnalysis {
        let (total_buy_amount, total_buy_tokens) = totals(&position.buys);
        let avg_buy_price = guarded_div(total_buy_amount, total_buy_tokens);

        let (total_sell_amount, total_sell_tokens) = totals(&position.sells);
        let avg_sell_price = guarded_div(total_sell_amount, total_sell_tokens);

        let realized_pnl =
            total_sell_amount.saturating_sub(total_sell_tokens.saturating_mul(avg_buy_price));
        let realized_pnl_percent = if total_sell_tokens > Decimal::ZERO {
            percent_change(avg_sell_price, avg_buy_price)
        } else {
            Decimal::ZERO
        };

        let live_price = position.current_price.unwrap_or(Decimal::ZERO);
        let tokens_held = total_buy_tokens.saturating_sub(total_sell_tokens);
        let unrealized_value = tokens_held.saturating_mul(live_price);
        let cost_basis = tokens_held.saturating_mul(avg_buy_price);
        let unrealized_pnl = unrealized_value.saturating_sub(cost_basis);
        let unrealized_pnl_percent = percent_of(unrealized_pnl, cost_basis);

        let first_buy = position.buys.iter().map(|t| t.timestamp).min();
        let last_sell = position.sells.iter().map(|t| t.timestamp).max();

        let excursion =
            Excursion::seeded(position.current_price).scan(candles, first_buy, last_sell);

        let max_gain_possible = percent_change(excursion.max_after_buy, avg_buy_price);
        let max_drawdown = match excursion.min_after_buy {
            Some(min) => percent_change(min, avg_buy_price),
            None => Decimal::ZERO,
        };

        let (missed_gains, missed_gains_percent) =
            if !position.sells.is_empty() && avg_sell_price > Decimal::ZERO {
                let gap = excursion.max_after_sell.saturating_sub(avg_sell_price);
                (
                    gap.saturating_mul(total_sell_tokens),
                    percent_change(excursion.max_after_sell, avg_sell_price),
                )
            } else {
                (Decimal::ZERO, Decimal::ZERO)
            };

        let is_roundtrip = tokens_held > Decimal::ZERO
            && excursion.max_after_buy
                > avg_buy_price.saturating_mul(self.thresholds.roundtrip_multiplier)
            && live_price < avg_buy_price;

        let status = if tokens_held > self.thresholds.dust_threshold {
            PositionStatus::Holding
        } else {
            PositionStatus::Closed
        };

        debug!(
            "Reconciled {} against {} candles: realized={} unrealized={} missed={} status={:?} roundtrip={}",
            position.mint,
            candles.len(),
            realized_pnl,
            unrealized_pnl,
            missed_gains,
            status,
            is_roundtrip
        );

        PositionAnalysis {
            position: position.clone(),
            total_buy_amount,
            total_buy_tokens,
            avg_buy_price,
            total_sell_amount,
            total_sell_tokens,
            avg_sell_price,
            realized_pnl,
            realized_pnl_percent,
            tokens_held,
            unrealized_value,
            unrealized_pnl,
            unrealized_pnl_percent,
            max_price_after_buy: excursion.max_after_buy,
            min_price_after_buy: excursion.min_after_buy.unwrap_or(Decimal::ZERO),
            max_price_after_sell: excursion.max_after_sell,
            max_gain_possible,
            max_drawdown,
            missed_gains,
            missed_gains_percent,
            is_roundtrip,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TradeDirection, SOL_MINT};
    use rust_decimal_macros::dec;

    const MINT: &str = "MemeMint1111";

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn trade(direction: TradeDirection, stable: Decimal, tokens: Decimal, at: i64) -> Trade {
        Trade {
            signature: format!("{:?}-{}", direction, at),
            timestamp: ts(at),
            direction,
            token_mint: MINT.to_string(),
            token_amount: tokens,
            stable_amount: stable,
            price_per_token: guarded_div(stable, tokens),
            stable_mint: SOL_MINT.to_string(),
        }
    }

    fn candle(at: i64, high: Decimal, low: Decimal) -> OhlcvCandle {
        OhlcvCandle {
            timestamp: ts(at),
            open: low,
            high,
            low,
            close: high,
            volume: None,
        }
    }

    fn position(buys: Vec<Trade>, sells: Vec<Trade>, current_price: Option<Decimal>) -> Position {
        let mut position = Position::new(MINT);
        position.buys = buys;
        position.sells = sells;
        position.current_price = current_price;
        position
    }

    #[test]
    fn test_closed_round_trade_without_candles() {
        let position = position(
            vec![trade(TradeDirection::Buy, dec!(100), dec!(1000), 1_000)],
            vec![trade(TradeDirection::Sell, dec!(150), dec!(1000), 2_000)],
            None,
        );

        let analysis = PriceReconciler::default().reconcile(&position, &[]);

        assert_eq!(analysis.avg_buy_price, dec!(0.1));
        assert_eq!(analysis.avg_sell_price, dec!(0.15));
        assert_eq!(analysis.realized_pnl, dec!(50));
        assert_eq!(analysis.realized_pnl_percent, dec!(50));
        assert_eq!(analysis.tokens_held, Decimal::ZERO);
        assert_eq!(analysis.unrealized_pnl, Decimal::ZERO);
        assert_eq!(analysis.status, PositionStatus::Closed);
        assert!(!analysis.is_roundtrip);
    }

    #[test]
    fn test_holding_with_post_buy_high() {
        let position = position(
            vec![trade(TradeDirection::Buy, dec!(100), dec!(1000), 1_000)],
            vec![],
            Some(dec!(0.2)),
        );
        let candles = vec![candle(4_600, dec!(0.3), dec!(0.15))];

        let analysis = PriceReconciler::default().reconcile(&position, &candles);

        assert_eq!(analysis.unrealized_value, dec!(200));
        assert_eq!(analysis.unrealized_pnl, dec!(100));
        assert_eq!(analysis.unrealized_pnl_percent, dec!(100));
        assert_eq!(analysis.max_price_after_buy, dec!(0.3));
        assert_eq!(analysis.min_price_after_buy, dec!(0.15));
        assert_eq!(analysis.max_gain_possible, dec!(200));
        assert_eq!(analysis.max_drawdown, dec!(50));
        assert_eq!(analysis.status, PositionStatus::Holding);
        assert_eq!(analysis.missed_gains, Decimal::ZERO);
    }

    #[test]
    fn test_candles_before_first_buy_are_ignored() {
        let position = position(
            vec![trade(TradeDirection::Buy, dec!(100), dec!(1000), 10_000)],
            vec![],
            Some(dec!(0.1)),
        );
        let candles = vec![
            candle(3_600, dec!(5), dec!(0.01)),
            candle(10_000, dec!(4), dec!(0.02)),
        ];

        let analysis = PriceReconciler::default().reconcile(&position, &candles);

        assert_eq!(analysis.max_price_after_buy, dec!(0.1));
        assert_eq!(analysis.min_price_after_buy, dec!(0.1));
        assert_eq!(analysis.max_gain_possible, Decimal::ZERO);
    }

    #[test]
    fn test_missed_gains_after_last_sell() {
        let position = position(
            vec![trade(TradeDirection::Buy, dec!(100), dec!(1000), 1_000)],
            vec![
                trade(TradeDirection::Sell, dec!(60), dec!(500), 5_000),
                trade(TradeDirection::Sell, dec!(60), dec!(500), 3_000),
            ],
            Some(dec!(0.2)),
        );
        let candles = vec![
            candle(4_000, dec!(0.9), dec!(0.1)),
            candle(6_000, dec!(0.24), dec!(0.1)),
        ];

        let analysis = PriceReconciler::default().reconcile(&position, &candles);

        assert_eq!(analysis.avg_sell_price, dec!(0.12));
        // only the candle after t=5000 counts, seeded with the live price
        assert_eq!(analysis.max_price_after_sell, dec!(0.24));
        assert_eq!(analysis.missed_gains, dec!(120));
        assert_eq!(analysis.missed_gains_percent, dec!(100));
        assert_eq!(analysis.max_price_after_buy, dec!(0.9));
    }

    #[test]
    fn test_negative_missed_gain_when_sold_at_top() {
        let position = position(
            vec![trade(TradeDirection::Buy, dec!(100), dec!(1000), 1_000)],
            vec![trade(TradeDirection::Sell, dec!(500), dec!(1000), 2_000)],
            Some(dec!(0.25)),
        );

        let analysis = PriceReconciler::default().reconcile(&position, &[]);

        assert_eq!(analysis.max_price_after_sell, dec!(0.25));
        assert_eq!(analysis.missed_gains, dec!(-250));
        assert_eq!(analysis.missed_gains_percent, dec!(-50));
    }

    #[test]
    fn test_roundtrip_detected() {
        let position = position(
            vec![trade(TradeDirection::Buy, dec!(100), dec!(1000), 1_000)],
            vec![],
            Some(dec!(0.05)),
        );
        let candles = vec![candle(2_000, dec!(0.16), dec!(0.04))];

        let analysis = PriceReconciler::default().reconcile(&position, &candles);

        assert!(analysis.is_roundtrip);
        assert_eq!(analysis.badge(), PositionBadge::Roundtrip);
        assert_eq!(analysis.unrealized_pnl_percent, dec!(-50));
    }

    #[test]
    fn test_roundtrip_needs_more_than_threshold() {
        let position = position(
            vec![trade(TradeDirection::Buy, dec!(100), dec!(1000), 1_000)],
            vec![],
            Some(dec!(0.05)),
        );
        // exactly 1.5x is not enough
        let candles = vec![candle(2_000, dec!(0.15), dec!(0.04))];

        let analysis = PriceReconciler::default().reconcile(&position, &candles);
        assert!(!analysis.is_roundtrip);
        assert_eq!(analysis.badge(), PositionBadge::Holding);
    }

    #[test]
    fn test_dust_boundary_is_closed() {
        let buys = vec![trade(TradeDirection::Buy, dec!(100), dec!(1000), 1_000)];
        let reconciler = PriceReconciler::default();

        let at_dust = position(
            buys.clone(),
            vec![trade(TradeDirection::Sell, dec!(120), dec!(999.999), 2_000)],
            Some(dec!(0.1)),
        );
        let analysis = reconciler.reconcile(&at_dust, &[]);
        assert_eq!(analysis.tokens_held, dec!(0.001));
        assert_eq!(analysis.status, PositionStatus::Closed);

        let above_dust = position(
            buys,
            vec![trade(TradeDirection::Sell, dec!(120), dec!(999.9989), 2_000)],
            Some(dec!(0.1)),
        );
        let analysis = reconciler.reconcile(&above_dust, &[]);
        assert_eq!(analysis.tokens_held, dec!(0.0011));
        assert_eq!(analysis.status, PositionStatus::Holding);
    }

    #[test]
    fn test_dust_priced_buy_saturates_percentages() {
        // 1 lamport for 10^19 tokens prices each token at 1e-28
        let position = position(
            vec![trade(
                TradeDirection::Buy,
                dec!(0.000000001),
                dec!(10000000000000000000),
                1_000,
            )],
            vec![],
            Some(dec!(1)),
        );
        let candles = vec![candle(2_000, dec!(2), dec!(0.5))];

        let analysis = PriceReconciler::default().reconcile(&position, &candles);

        assert_eq!(analysis.avg_buy_price, Decimal::new(1, 28));
        assert_eq!(analysis.unrealized_value, dec!(10000000000000000000));
        assert_eq!(analysis.unrealized_pnl_percent, Decimal::MAX);
        assert_eq!(analysis.max_gain_possible, Decimal::MAX);
        assert_eq!(analysis.status, PositionStatus::Holding);
        assert!(!analysis.is_roundtrip);
    }

    #[test]
    fn test_roundtrip_with_missing_live_price() {
        let position = position(
            vec![trade(TradeDirection::Buy, dec!(100), dec!(1000), 1_000)],
            vec![],
            None,
        );
        let candles = vec![candle(2_000, dec!(0.5), dec!(0.08))];

        let analysis = PriceReconciler::default().reconcile(&position, &candles);

        // candles still drive the scan even without a live price
        assert_eq!(analysis.max_price_after_buy, dec!(0.5));
        assert_eq!(analysis.min_price_after_buy, dec!(0.08));
        assert!(analysis.is_roundtrip);
    }

    #[test]
    fn test_custom_thresholds() {
        let position = position(
            vec![trade(TradeDirection::Buy, dec!(100), dec!(1000), 1_000)],
            vec![trade(TradeDirection::Sell, dec!(99), dec!(999.5), 2_000)],
            Some(dec!(0.05)),
        );
        let candles = vec![candle(3_000, dec!(0.16), dec!(0.04))];

        let default = PriceReconciler::default().reconcile(&position, &candles);
        assert_eq!(default.status, PositionStatus::Holding);
        assert!(default.is_roundtrip);

        let strict = PriceReconciler::new(ReconcileThresholds {
            roundtrip_multiplier: dec!(2),
            dust_threshold: dec!(1),
        })
        .reconcile(&position, &candles);
        assert_eq!(strict.status, PositionStatus::Closed);
        assert!(!strict.is_roundtrip);
    }

    #[test]
    fn test_no_price_data_reports_zero_minimum() {
        let position = position(
            vec![trade(TradeDirection::Buy, dec!(100), dec!(1000), 1_000)],
            vec![],
            None,
        );

        let analysis = PriceReconciler::default().reconcile(&position, &[]);

        assert_eq!(analysis.min_price_after_buy, Decimal::ZERO);
        assert_eq!(analysis.max_drawdown, Decimal::ZERO);
        assert_eq!(analysis.max_price_after_buy, Decimal::ZERO);
        assert_eq!(analysis.max_gain_possible, dec!(-100));
        assert_eq!(analysis.unrealized_value, Decimal::ZERO);
        assert_eq!(analysis.unrealized_pnl, dec!(-100));
    }

    #[test]
    fn test_position_without_buys() {
        let position = position(
            vec![],
            vec![trade(TradeDirection::Sell, dec!(10), dec!(100), 1_000)],
            Some(dec!(0.2)),
        );
        let candles = vec![candle(500, dec!(0.3), dec!(0.05))];

        let analysis = PriceReconciler::default().reconcile(&position, &candles);

        assert_eq!(analysis.avg_buy_price, Decimal::ZERO);
        assert_eq!(analysis.realized_pnl, dec!(10));
        assert_eq!(analysis.realized_pnl_percent, Decimal::ZERO);
        assert_eq!(analysis.tokens_held, dec!(-100));
        assert_eq!(analysis.unrealized_pnl_percent, Decimal::ZERO);
        assert_eq!(analysis.max_gain_possible, Decimal::ZERO);
        // with no buys every candle counts as post-entry
        assert_eq!(analysis.max_price_after_buy, dec!(0.3));
        assert_eq!(analysis.status, PositionStatus::Closed);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let position = position(
            vec![
                trade(TradeDirection::Buy, dec!(3), dec!(7), 1_000),
                trade(TradeDirection::Buy, dec!(11), dec!(13), 1_500),
            ],
            vec![trade(TradeDirection::Sell, dec!(5), dec!(9), 2_000)],
            Some(dec!(0.33)),
        );
        let candles = vec![
            candle(1_200, dec!(0.9), dec!(0.2)),
            candle(2_400, dec!(1.7), dec!(0.1)),
        ];

        let reconciler = PriceReconciler::default();
        let first = reconciler.reconcile(&position, &candles);
        let second = reconciler.reconcile(&position, &candles);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_thresholds_from_config() {
        let config = config_manager::AnalysisConfig {
            roundtrip_multiplier: 2.0,
            dust_threshold: 0.5,
            ..Default::default()
        };

        let thresholds = ReconcileThresholds::from(&config);
        assert_eq!(thresholds.roundtrip_multiplier, dec!(2));
        assert_eq!(thresholds.dust_threshold, dec!(0.5));
    }

    #[test]
    fn test_default_constants() {
        assert_eq!(ROUNDTRIP_MULTIPLIER, dec!(1.5));
        assert_eq!(DUST_THRESHOLD, dec!(0.001));
    }
}
