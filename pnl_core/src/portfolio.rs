use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::reconciler::PositionAnalysis;

/// Wallet-level totals over reconciled positions
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PortfolioSummary {
    pub count: usize,
    pub total_invested: Decimal,
    pub total_realized: Decimal,
    pub total_unrealized: Decimal,
    /// Only positive missed gains are counted
    pub total_missed: Decimal,
    pub roundtrip_count: usize,
}

impl PortfolioSummary {
    pub fn total_pnl(&self) -> Decimal {
        self.total_realized.saturating_add(self.total_unrealized)
    }
}

pub fn summarize_portfolio<'a>(
    analyses: impl IntoIterator<Item = &'a PositionAnalysis>,
) -> PortfolioSummary {
    analyses
        .into_iter()
        .fold(PortfolioSummary::default(), |mut summary, analysis| {
            summary.count += 1;
            summary.total_invested =
                summary.total_invested.saturating_add(analysis.total_buy_amount);
            summary.total_realized = summary.total_realized.saturating_add(analysis.realized_pnl);
            summary.total_unrealized =
                summary.total_unrealized.saturating_add(analysis.unrealized_pnl);
            summary.total_missed = summary
                .total_missed
                .saturating_add(analysis.missed_gains.max(Decimal::ZERO));
            if analysis.is_roundtrip {
                summary.roundtrip_count += 1;
            }
            summary
        })
}

/// Metric used to rank positions, largest first
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Realized plus unrealized P&L
    #[default]
    Pnl,
    /// Missed-gain percentage
    Missed,
    /// Stable spent on buys
    Invested,
}

impl SortKey {
    fn metric(&self, analysis: &PositionAnalysis) -> Decimal {
        match self {
            SortKey::Pnl => analysis.total_pnl(),
            SortKey::Missed => analysis.missed_gains_percent,
            SortKey::Invested => analysis.total_buy_amount,
        }
    }

    /// Descending comparator
    pub fn compare(&self, a: &PositionAnalysis, b: &PositionAnalysis) -> Ordering {
        self.metric(b).cmp(&self.metric(a))
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pnl" => Ok(SortKey::Pnl),
            "missed" => Ok(SortKey::Missed),
            "invested" => Ok(SortKey::Invested),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortKey::Pnl => "pnl",
            SortKey::Missed => "missed",
            SortKey::Invested => "invested",
        };
        write!(f, "{}", name)
    }
}

/// Stable sort, so ties keep their aggregation order
pub fn sort_positions(analyses: &mut [PositionAnalysis], key: SortKey) {
    analyses.sort_by(|a, b| key.compare(a, b));
}
