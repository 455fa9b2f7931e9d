use chrono::DateTime;
use tracing::{debug, trace};

use crate::math::guarded_div;
use crate::swap_event::RawSwapEvent;
use crate::{Trade, TradeDirection, SOL_MINT, STABLECOIN_MINTS};

/// A mint counts as a stable pricing asset if it is wrapped SOL or an
/// allow-listed stablecoin.
pub fn is_stable_mint(mint: &str) -> bool {
    mint == SOL_MINT || STABLECOIN_MINTS.contains(&mint)
}

/// Classify one swap into a BUY or SELL of the non-stable token.
///
/// Exactly one leg must be stable:
/// - stable in, token out → BUY of the output token
/// - token in, stable out → SELL of the input token
///
/// Anything else (stable↔stable, token↔token, an unresolved leg, a missing
/// swap payload or an invalid timestamp) yields `None`.
pub fn classify_swap(event: &RawSwapEvent, wallet: &str) -> Option<Trade> {
    let swap = match event.swap() {
        Some(swap) => swap,
        None => {
            trace!("Transaction {} has no swap event", event.signature);
            return None;
        }
    };

    let input = swap.input_leg()?;
    let output = swap.output_leg()?;
    let amount_in = input.amount()?;
    let amount_out = output.amount()?;

    let stable_in = is_stable_mint(input.mint());
    let stable_out = is_stable_mint(output.mint());

    let (direction, token_mint, stable_mint, token_amount, stable_amount) =
        match (stable_in, stable_out) {
            (true, false) => (
                TradeDirection::Buy,
                output.mint(),
                input.mint(),
                amount_out,
                amount_in,
            ),
            (false, true) => (
                TradeDirection::Sell,
                input.mint(),
                output.mint(),
                amount_in,
                amount_out,
            ),
            _ => {
                trace!(
                    "Skipping swap {} for {}: {} -> {} is not a stable/token pair",
                    event.signature,
                    wallet,
                    input.mint(),
                    output.mint()
                );
                return None;
            }
        };

    let timestamp = match DateTime::from_timestamp(event.timestamp, 0) {
        Some(ts) => ts,
        None => {
            debug!(
                "Skipping swap {}: invalid timestamp {}",
                event.signature, event.timestamp
            );
            return None;
        }
    };

    let trade = Trade {
        signature: event.signature.clone(),
        timestamp,
        direction,
        token_mint: token_mint.to_string(),
        token_amount,
        stable_amount,
        price_per_token: guarded_div(stable_amount, token_amount),
        stable_mint: stable_mint.to_string(),
    };

    trace!(
        "Classified {} as {:?} {} {} for {} {}",
        trade.signature,
        trade.direction,
        trade.token_amount,
        trade.token_mint,
        trade.stable_amount,
        trade.stable_mint
    );

    Some(trade)
}

/// Classify a batch of swaps, silently dropping the ones that are not trades.
pub fn classify_swaps(events: &[RawSwapEvent], wallet: &str) -> Vec<Trade> {
    let trades: Vec<Trade> = events
        .iter()
        .filter_map(|event| classify_swap(event, wallet))
        .collect();

    debug!(
        "Classified {} of {} swaps into trades for wallet {}",
        trades.len(),
        events.len(),
        wallet
    );

    trades
}
