use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::feed::types::{StatKind, WindowName};

/// Engine configuration. Every section falls back to its documented
/// defaults, so an empty TOML document is a valid config.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub priors: PriorConfig,
    pub minutes: MinutesConfig,
    pub simulation: SimulationConfig,
    pub correlation: CorrelationConfig,
    pub pricing: PricingConfig,
    pub context: FactorTable,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PriorConfig {
    /// Uninformative seed shape added to every window fit.
    pub seed_alpha: f64,
    /// Uninformative seed rate (pseudo-minutes) added to every window fit.
    pub seed_beta: f64,
    /// Effective sample size `k` of the league-baseline shrinkage.
    pub shrinkage_k: f64,
    pub window_weights: BTreeMap<WindowName, f64>,
    /// Games considered when resolving a player's role.
    pub role_window: usize,
}

impl Default for PriorConfig {
    fn default() -> Self {
        let window_weights = BTreeMap::from([
            (WindowName::Recent, 0.5),
            (WindowName::Season, 0.3),
            (WindowName::PreviousSeason, 0.15),
            (WindowName::Career, 0.05),
        ]);
        Self {
            seed_alpha: 1.0,
            seed_beta: 1.0,
            shrinkage_k: 20.0,
            window_weights,
            role_window: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MinutesConfig {
    pub default_std_dev: f64,
    /// Games required before the historical minutes std is trusted.
    pub min_std_dev_games: usize,
}

impl Default for MinutesConfig {
    fn default() -> Self {
        Self {
            default_std_dev: 4.0,
            min_std_dev_games: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationConfig {
    pub n_draws: usize,
    pub seed: Option<u64>,
    pub antithetic: bool,
    pub percentiles: Vec<u8>,
    /// Lines always reported in `threshold_probabilities`.
    pub lines: Vec<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_draws: 10_000,
            seed: None,
            antithetic: true,
            percentiles: vec![5, 10, 25, 50, 75, 90, 95],
            lines: Vec::new(),
        }
    }
}

/// Pairwise correlations between base stats (rate level, given minutes).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CorrelationConfig {
    pub pts_reb: f64,
    pub pts_ast: f64,
    pub reb_ast: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            pts_reb: 0.15,
            pts_ast: 0.2,
            reb_ast: -0.05,
        }
    }
}

impl CorrelationConfig {
    /// Configured correlation for a pair of base stats, 1.0 on the diagonal.
    pub fn pair(&self, a: StatKind, b: StatKind) -> Option<f64> {
        use StatKind::*;
        match (a, b) {
            _ if a == b => Some(1.0),
            (Points, Rebounds) | (Rebounds, Points) => Some(self.pts_reb),
            (Points, Assists) | (Assists, Points) => Some(self.pts_ast),
            (Rebounds, Assists) | (Assists, Rebounds) => Some(self.reb_ast),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PricingConfig {
    /// Fraction of full Kelly reported (0.25 = quarter-Kelly).
    pub kelly_multiplier: f64,
    pub max_kelly_fraction: f64,
    pub strong_ev: f64,
    pub medium_ev: f64,
    pub weak_ev: f64,
    /// Use the no-vig probability as the market probability when both sides are quoted.
    pub devig: bool,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            kelly_multiplier: 0.25,
            max_kelly_fraction: 0.25,
            strong_ev: 0.10,
            medium_ev: 0.05,
            weak_ev: 0.03,
            devig: false,
        }
    }
}

/// Lookup table for contextual multipliers. All scalars are strictly positive.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FactorTable {
    pub pace_min: f64,
    pub pace_max: f64,
    pub scoring_top5_defense: f64,
    pub scoring_bottom5_defense: f64,
    pub other_top5_defense: f64,
    pub other_bottom5_defense: f64,
    pub home: f64,
    pub away: f64,
    pub rest_back_to_back: f64,
    pub rest_one_day: f64,
    pub rest_two_plus: f64,
    pub minutes_back_to_back: f64,
    pub injury_probable: f64,
    pub injury_questionable: f64,
    pub injury_doubtful: f64,
    pub blowout_spread_high: f64,
    pub blowout_spread_medium: f64,
    pub blowout_high: f64,
    pub blowout_medium: f64,
}

impl Default for FactorTable {
    fn default() -> Self {
        Self {
            pace_min: 0.85,
            pace_max: 1.15,
            scoring_top5_defense: 0.92,
            scoring_bottom5_defense: 1.08,
            other_top5_defense: 0.96,
            other_bottom5_defense: 1.04,
            home: 1.05,
            away: 0.95,
            rest_back_to_back: 0.97,
            rest_one_day: 1.00,
            rest_two_plus: 1.02,
            minutes_back_to_back: 0.95,
            injury_probable: 0.97,
            injury_questionable: 0.85,
            injury_doubtful: 0.50,
            blowout_spread_high: 12.0,
            blowout_spread_medium: 8.0,
            blowout_high: 0.94,
            blowout_medium: 0.97,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }
}
