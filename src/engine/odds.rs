//! American odds conversions.

use crate::error::{EngineError, EngineResult};

/// Largest magnitude accepted; +1000000 already prices a 0.01% outcome.
pub const MAX_ABS_AMERICAN_ODDS: u32 = 1_000_000;

/// Reject zero, the dead zone between -100 and +100, and absurd magnitudes.
pub fn validate_american_odds(odds: i32) -> EngineResult<i32> {
    if odds == 0 {
        return Err(EngineError::InvalidOdds("odds cannot be zero".into()));
    }
    let magnitude = odds.unsigned_abs();
    if magnitude < 100 {
        return Err(EngineError::InvalidOdds(format!(
            "american odds must be <= -100 or >= +100, got {odds}"
        )));
    }
    if magnitude > MAX_ABS_AMERICAN_ODDS {
        return Err(EngineError::InvalidOdds(format!(
            "american odds beyond ±{MAX_ABS_AMERICAN_ODDS}, got {odds}"
        )));
    }
    Ok(odds)
}

/// Parse "+150", "-110" or "150".
pub fn parse_american_odds(raw: &str) -> EngineResult<i32> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let odds: i32 = digits
        .parse()
        .map_err(|_| EngineError::InvalidOdds(format!("malformed american odds: {raw:?}")))?;
    validate_american_odds(odds)
}

/// Convert American odds to implied probability.
/// Positive odds (e.g., +150): prob = 100 / (odds + 100)
/// Negative odds (e.g., -150): prob = |odds| / (|odds| + 100)
pub fn implied_probability(odds: i32) -> EngineResult<f64> {
    let odds = validate_american_odds(odds)? as f64;
    if odds > 0.0 {
        Ok(100.0 / (odds + 100.0))
    } else {
        let abs = odds.abs();
        Ok(abs / (abs + 100.0))
    }
}

/// Net profit per unit staked on a win.
pub fn payout_per_unit(odds: i32) -> EngineResult<f64> {
    let odds = validate_american_odds(odds)? as f64;
    if odds > 0.0 {
        Ok(odds / 100.0)
    } else {
        Ok(100.0 / odds.abs())
    }
}

/// Decimal (European) odds: total return per unit staked.
pub fn decimal_odds(odds: i32) -> EngineResult<f64> {
    Ok(payout_per_unit(odds)? + 1.0)
}

/// Devig two-way odds to get fair probabilities.
/// Returns (side_fair_prob, opposite_fair_prob).
pub fn devig(side_odds: i32, opposite_odds: i32) -> EngineResult<(f64, f64)> {
    let side = implied_probability(side_odds)?;
    let opposite = implied_probability(opposite_odds)?;
    let total = side + opposite;
    Ok((side / total, opposite / total))
}

/// Bookmaker margin on a two-way market (sum of implied probabilities minus one).
pub fn overround(side_odds: i32, opposite_odds: i32) -> EngineResult<f64> {
    Ok(implied_probability(side_odds)? + implied_probability(opposite_odds)? - 1.0)
}
