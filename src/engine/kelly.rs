//! Kelly criterion stake sizing for player props.

/// Full-Kelly fraction of bankroll.
///
/// - `p`: model win probability (0–1)
/// - `b`: net odds, profit per unit staked on a win
///
/// `f* = (p·(b+1) - 1) / b`. Negative means the bet has no edge.
pub fn full_kelly(p: f64, b: f64) -> f64 {
    if b <= 0.0 {
        return 0.0;
    }
    (p * (b + 1.0) - 1.0) / b
}

/// Fractional Kelly, floored at zero and capped at `max_fraction`.
///
/// - `multiplier`: scaling factor (e.g. 0.25 for quarter-Kelly)
/// - `max_fraction`: hard cap on the reported stake fraction
pub fn fractional_kelly(p: f64, b: f64, multiplier: f64, max_fraction: f64) -> f64 {
    if multiplier <= 0.0 || max_fraction <= 0.0 {
        return 0.0;
    }
    let f_star = full_kelly(p, b);
    if f_star <= 0.0 {
        return 0.0;
    }
    (f_star * multiplier).min(max_fraction)
}

/// Stake in currency units for a bankroll, floored to whole cents.
pub fn stake_amount(fraction: f64, bankroll: f64) -> f64 {
    if fraction <= 0.0 || bankroll <= 0.0 {
        return 0.0;
    }
    (fraction * bankroll * 100.0).floor() / 100.0
}
