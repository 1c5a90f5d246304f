use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{EngineError, EngineResult};
use crate::feed::types::StatKind;

/// Belief about a per-minute rate: `λ ~ Gamma(shape, rate)`.
///
/// Both parameters are strictly positive. Updates return a new value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateParameters {
    shape: f64,
    rate: f64,
}

impl RateParameters {
    pub fn new(shape: f64, rate: f64) -> EngineResult<Self> {
        if !(shape.is_finite() && shape > 0.0) {
            return Err(EngineError::InvalidParameter(format!(
                "gamma shape must be positive and finite, got {shape}"
            )));
        }
        if !(rate.is_finite() && rate > 0.0) {
            return Err(EngineError::InvalidParameter(format!(
                "gamma rate must be positive and finite, got {rate}"
            )));
        }
        Ok(Self { shape, rate })
    }

    /// Build from a per-minute mean and prior strength in pseudo-minutes.
    pub fn from_mean(mean_per_minute: f64, strength_minutes: f64) -> EngineResult<Self> {
        Self::new(mean_per_minute * strength_minutes, strength_minutes)
    }

    pub fn shape(&self) -> f64 {
        self.shape
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Mean per-minute rate, `shape / rate`.
    pub fn mean(&self) -> f64 {
        self.shape / self.rate
    }

    /// Variance of the per-minute rate, `shape / rate²`.
    pub fn variance(&self) -> f64 {
        self.shape / (self.rate * self.rate)
    }

    /// Belief about `c·λ`: `Gamma(shape, rate / c)`.
    pub fn scaled(&self, factor: f64) -> EngineResult<Self> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(EngineError::InvalidParameter(format!(
                "rate scaling factor must be positive, got {factor}"
            )));
        }
        Self::new(self.shape, self.rate / factor)
    }

    /// Mean of the negative-binomial game total over `minutes`.
    pub fn predictive_mean(&self, minutes: f64) -> f64 {
        self.shape * minutes / self.rate
    }

    /// Variance of the negative-binomial game total over `minutes`.
    pub fn predictive_variance(&self, minutes: f64) -> f64 {
        let mean = self.predictive_mean(minutes);
        mean * (1.0 + minutes / self.rate)
    }

    /// Success probability of the posterior predictive negative binomial.
    pub fn predictive_success_probability(&self, minutes: f64) -> f64 {
        self.rate / (self.rate + minutes)
    }
}

/// Legacy seed used for stats without a dedicated entry.
pub const FALLBACK_PRIOR: (f64, f64) = (5.0, 120.0);

/// Pseudo-minutes of prior strength behind the per-stat seed priors.
pub const SEED_STRENGTH_MINUTES: f64 = 200.0;

/// League-average per-minute rates behind the per-stat seed priors.
pub fn seed_rate_per_minute(stat: StatKind) -> Option<f64> {
    match stat {
        StatKind::Points => Some(0.45),
        StatKind::Rebounds => Some(0.12),
        StatKind::Assists => Some(0.09),
        _ => None,
    }
}

/// Shrinkage targets per stat, optionally per position.
#[derive(Debug, Clone, Default)]
pub struct LeagueBaseline {
    by_stat: BTreeMap<StatKind, RateParameters>,
    by_position: BTreeMap<(String, StatKind), RateParameters>,
}

impl LeagueBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed priors: PTS 0.45/min, REB 0.12/min, AST 0.09/min at 200 pseudo-minutes.
    pub fn seed_defaults() -> Self {
        let mut baseline = Self::new();
        for stat in StatKind::BASE {
            if let Some(mean) = seed_rate_per_minute(stat) {
                baseline.by_stat.insert(
                    stat,
                    RateParameters {
                        shape: mean * SEED_STRENGTH_MINUTES,
                        rate: SEED_STRENGTH_MINUTES,
                    },
                );
            }
        }
        baseline
    }

    pub fn with_stat(mut self, stat: StatKind, params: RateParameters) -> Self {
        self.by_stat.insert(stat, params);
        self
    }

    pub fn with_position(mut self, position: &str, stat: StatKind, params: RateParameters) -> Self {
        self.by_position.insert((position.to_string(), stat), params);
        self
    }

    /// Position entry, then stat entry. Composites fall back to the sum of
    /// their components when those share a rate (the Gamma sum stays Gamma).
    pub fn get(&self, stat: StatKind, position: Option<&str>) -> Option<RateParameters> {
        if let Some(pos) = position {
            if let Some(p) = self.by_position.get(&(pos.to_string(), stat)) {
                return Some(*p);
            }
        }
        if let Some(p) = self.by_stat.get(&stat) {
            return Some(*p);
        }
        if !stat.is_composite() {
            return None;
        }
        let parts: Option<Vec<RateParameters>> = stat
            .components()
            .iter()
            .map(|c| self.get(*c, position))
            .collect();
        let parts = parts?;
        let rate = parts[0].rate;
        if parts.iter().all(|p| (p.rate - rate).abs() < 1e-9) {
            Some(RateParameters {
                shape: parts.iter().map(|p| p.shape).sum(),
                rate,
            })
        } else {
            None
        }
    }

    /// Entry for `stat`, or the legacy `Gamma(5, 120)` seed.
    pub fn get_or_fallback(&self, stat: StatKind, position: Option<&str>) -> RateParameters {
        self.get(stat, position).unwrap_or(RateParameters {
            shape: FALLBACK_PRIOR.0,
            rate: FALLBACK_PRIOR.1,
        })
    }
}
