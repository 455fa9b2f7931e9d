//! Zero-denominator policy for every ratio the engine reports.
//!
//! All quantities that end up in a denominator (token amounts, average prices,
//! cost basis) are non-negative in a well-formed position, so a non-positive
//! denominator means "nothing to divide by" and the ratio is defined as zero.

use rust_decimal::Decimal;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// `numerator / denominator`, or zero when the denominator is not positive
/// or the quotient does not fit a Decimal.
pub fn guarded_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
}

/// Percentage move from `base` to `value`, zero when `base` is not positive.
/// Saturates at the Decimal range for dust-priced bases.
pub fn percent_change(value: Decimal, base: Decimal) -> Decimal {
    guarded_div(value.saturating_sub(base), base).saturating_mul(HUNDRED)
}

/// `part / whole` as a percentage, zero when `whole` is not positive.
/// Saturates at the Decimal range.
pub fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    guarded_div(part, whole).saturating_mul(HUNDRED)
}
