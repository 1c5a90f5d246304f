//! Playing-time distribution: a Gaussian truncated to [0, 48].
//!
//! Sampling goes through the truncated inverse CDF, so every draw consumes
//! exactly one uniform and the simulator can pair it with `1 - u`.

use rand::Rng;
use serde::Serialize;

use super::context::AdjustmentSet;
use super::normal::{inverse_normal_cdf, normal_cdf, normal_sf};
use crate::config::MinutesConfig;
use crate::error::{EngineError, EngineResult};
use crate::feed::types::ObservationWindow;

pub const MINUTES_LOWER: f64 = 0.0;
pub const MINUTES_UPPER: f64 = 48.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinutesDistributionSpec {
    mean: f64,
    std_dev: f64,
    lower: f64,
    upper: f64,
}

impl MinutesDistributionSpec {
    pub fn new(mean: f64, std_dev: f64) -> EngineResult<Self> {
        if !(mean.is_finite() && (MINUTES_LOWER..=MINUTES_UPPER).contains(&mean)) {
            return Err(EngineError::InvalidParameter(format!(
                "minutes mean must be in [{MINUTES_LOWER}, {MINUTES_UPPER}], got {mean}"
            )));
        }
        if !(std_dev.is_finite() && std_dev >= 0.0) {
            return Err(EngineError::InvalidParameter(format!(
                "minutes std dev must be non-negative, got {std_dev}"
            )));
        }
        Ok(Self {
            mean,
            std_dev,
            lower: MINUTES_LOWER,
            upper: MINUTES_UPPER,
        })
    }

    /// Degenerate distribution at `minutes`.
    pub fn fixed(minutes: f64) -> EngineResult<Self> {
        Self::new(minutes, 0.0)
    }

    /// Location of the underlying (untruncated) Gaussian.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }

    fn standardized_bounds(&self) -> (f64, f64) {
        (
            (self.lower - self.mean) / self.std_dev,
            (self.upper - self.mean) / self.std_dev,
        )
    }

    /// Inverse CDF of the truncated distribution at `u ∈ [0, 1]`.
    pub fn quantile(&self, u: f64) -> f64 {
        if self.std_dev == 0.0 {
            return self.mean;
        }
        let u = u.clamp(0.0, 1.0);
        let (a, b) = self.standardized_bounds();
        // Work in the tail that keeps precision.
        let z = if a >= 0.0 {
            let (sa, sb) = (normal_sf(a), normal_sf(b));
            -inverse_normal_cdf(sa - u * (sa - sb))
        } else {
            let (fa, fb) = (normal_cdf(a), normal_cdf(b));
            inverse_normal_cdf(fa + u * (fb - fa))
        };
        (self.mean + self.std_dev * z).clamp(self.lower, self.upper)
    }

    /// One draw, consuming a single uniform from `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.quantile(rng.gen::<f64>())
    }

    /// Mean of the truncated distribution.
    pub fn truncated_mean(&self) -> f64 {
        if self.std_dev == 0.0 {
            return self.mean;
        }
        let (a, b) = self.standardized_bounds();
        let z = normal_cdf(b) - normal_cdf(a);
        self.mean + self.std_dev * (density(a) - density(b)) / z
    }
}

fn density(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

pub struct MinutesModel {
    config: MinutesConfig,
}

impl MinutesModel {
    pub fn new(config: MinutesConfig) -> Self {
        Self { config }
    }

    /// `mean = clamp(baseline × Π context, 0, 48)`; std defaults to the configured value.
    pub fn build_distribution(
        &self,
        baseline_minutes: f64,
        context: &AdjustmentSet,
    ) -> EngineResult<MinutesDistributionSpec> {
        self.build_with_std(baseline_minutes, self.config.default_std_dev, context)
    }

    /// Same as `build_distribution` with a caller-supplied std dev, scaled by
    /// the same multiplier product as the mean.
    pub fn build_with_std(
        &self,
        baseline_minutes: f64,
        std_dev: f64,
        context: &AdjustmentSet,
    ) -> EngineResult<MinutesDistributionSpec> {
        if !baseline_minutes.is_finite() {
            return Err(EngineError::InvalidParameter(format!(
                "baseline minutes must be finite, got {baseline_minutes}"
            )));
        }
        let multiplier = context.product();
        let mean = (baseline_minutes * multiplier).clamp(MINUTES_LOWER, MINUTES_UPPER);
        MinutesDistributionSpec::new(mean, std_dev * multiplier)
    }

    /// Baseline and spread from a window of past games. The sample std is used
    /// once the window holds `min_std_dev_games` games.
    pub fn from_history(
        &self,
        window: &ObservationWindow,
        context: &AdjustmentSet,
    ) -> EngineResult<MinutesDistributionSpec> {
        if window.is_empty() {
            return Err(EngineError::InsufficientData(format!(
                "no games in {} window to project minutes from",
                window.name()
            )));
        }
        let n = window.len() as f64;
        let mean = window.total_minutes() / n;
        let std_dev = if window.len() >= self.config.min_std_dev_games.max(2) {
            let ss: f64 = window.minutes().map(|m| (m - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            self.config.default_std_dev
        };
        self.build_with_std(mean, std_dev, context)
    }
}
