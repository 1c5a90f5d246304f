//! Contextual multipliers for minutes and per-minute rates.
//!
//! All values come from `FactorTable` (or `role_weights` for rotation role),
//! so each rule is testable on its own. Missing context resolves to 1.0.

use serde::{Deserialize, Serialize};

use super::rate::RateParameters;
use crate::config::FactorTable;
use crate::error::{EngineError, EngineResult};
use crate::feed::types::{Role, StatKind};

pub const PACE: &str = "pace";
pub const MATCHUP: &str = "matchup";
pub const HOME_AWAY: &str = "home_away";
pub const REST: &str = "rest";
pub const BACK_TO_BACK: &str = "back_to_back";
pub const INJURY_STATUS: &str = "injury_status";
pub const BLOWOUT_RISK: &str = "blowout_risk";
pub const ROLE: &str = "role";

/// Ordered named multiplicative factors, combined by product.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdjustmentSet {
    factors: Vec<(String, f64)>,
}

impl AdjustmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a factor. Factors must be strictly positive.
    pub fn insert(&mut self, name: &str, value: f64) -> EngineResult<()> {
        if !(value.is_finite() && value > 0.0) {
            return Err(EngineError::InvalidParameter(format!(
                "adjustment {name} must be positive, got {value}"
            )));
        }
        match self.factors.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.factors.push((name.to_string(), value)),
        }
        Ok(())
    }

    pub fn with(mut self, name: &str, value: f64) -> EngineResult<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.factors.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn product(&self) -> f64 {
        self.factors.iter().map(|(_, v)| v).product()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.factors.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenseTier {
    Top5,
    Average,
    Bottom5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Home,
    Away,
}

/// Pre-game availability designation. Players ruled out are not simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjuryStatus {
    Available,
    Probable,
    Questionable,
    Doubtful,
}

/// Everything known about a player's next game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameContext {
    pub team_pace: Option<f64>,
    pub opponent_pace: Option<f64>,
    pub league_pace: f64,
    pub opponent_defense: Option<DefenseTier>,
    pub venue: Option<Venue>,
    pub rest_days: Option<u32>,
    pub injury_status: Option<InjuryStatus>,
    /// Closing point spread for the player's team; only the magnitude matters.
    pub point_spread: Option<f64>,
    pub role: Option<Role>,
}

impl Default for GameContext {
    fn default() -> Self {
        Self {
            team_pace: None,
            opponent_pace: None,
            league_pace: 100.0,
            opponent_defense: None,
            venue: None,
            rest_days: None,
            injury_status: None,
            point_spread: None,
            role: None,
        }
    }
}

/// Minutes and rate multipliers for a rotation role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleWeights {
    pub minutes_mult: f64,
    pub rate_mult: f64,
}

pub fn role_weights(role: Role) -> RoleWeights {
    match role {
        Role::Starter => RoleWeights {
            minutes_mult: 1.00,
            rate_mult: 1.00,
        },
        Role::Sixth => RoleWeights {
            minutes_mult: 0.88,
            rate_mult: 1.02,
        },
        Role::Bench => RoleWeights {
            minutes_mult: 0.70,
            rate_mult: 0.98,
        },
    }
}

pub struct ContextAdjuster {
    table: FactorTable,
}

impl ContextAdjuster {
    pub fn new(table: FactorTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &FactorTable {
        &self.table
    }

    /// Expected game pace relative to league, clamped to the table bounds.
    pub fn pace_factor(&self, ctx: &GameContext) -> f64 {
        let pace = match (ctx.team_pace, ctx.opponent_pace) {
            (Some(a), Some(b)) => (a + b) / 2.0,
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return 1.0,
        };
        if !(pace.is_finite() && pace > 0.0 && ctx.league_pace > 0.0) {
            return 1.0;
        }
        (pace / ctx.league_pace).clamp(self.table.pace_min, self.table.pace_max)
    }

    pub fn matchup_factor(&self, tier: Option<DefenseTier>, stat: StatKind) -> f64 {
        match (tier, stat.is_scoring()) {
            (Some(DefenseTier::Top5), true) => self.table.scoring_top5_defense,
            (Some(DefenseTier::Bottom5), true) => self.table.scoring_bottom5_defense,
            (Some(DefenseTier::Top5), false) => self.table.other_top5_defense,
            (Some(DefenseTier::Bottom5), false) => self.table.other_bottom5_defense,
            (Some(DefenseTier::Average), _) | (None, _) => 1.0,
        }
    }

    pub fn venue_factor(&self, venue: Option<Venue>) -> f64 {
        match venue {
            Some(Venue::Home) => self.table.home,
            Some(Venue::Away) => self.table.away,
            None => 1.0,
        }
    }

    pub fn rest_factor(&self, rest_days: Option<u32>) -> f64 {
        match rest_days {
            Some(0) => self.table.rest_back_to_back,
            Some(1) => self.table.rest_one_day,
            Some(_) => self.table.rest_two_plus,
            None => 1.0,
        }
    }

    pub fn injury_factor(&self, status: Option<InjuryStatus>) -> f64 {
        match status {
            Some(InjuryStatus::Probable) => self.table.injury_probable,
            Some(InjuryStatus::Questionable) => self.table.injury_questionable,
            Some(InjuryStatus::Doubtful) => self.table.injury_doubtful,
            Some(InjuryStatus::Available) | None => 1.0,
        }
    }

    pub fn blowout_factor(&self, point_spread: Option<f64>) -> f64 {
        let spread = match point_spread {
            Some(s) if s.is_finite() => s.abs(),
            _ => return 1.0,
        };
        if spread >= self.table.blowout_spread_high {
            self.table.blowout_high
        } else if spread >= self.table.blowout_spread_medium {
            self.table.blowout_medium
        } else {
            1.0
        }
    }

    /// Multipliers applied to the per-minute rate of `stat`.
    pub fn compute_factors(&self, ctx: &GameContext, stat: StatKind) -> EngineResult<AdjustmentSet> {
        let mut set = AdjustmentSet::new();
        set.insert(PACE, self.pace_factor(ctx))?;
        set.insert(MATCHUP, self.matchup_factor(ctx.opponent_defense, stat))?;
        set.insert(HOME_AWAY, self.venue_factor(ctx.venue))?;
        set.insert(REST, self.rest_factor(ctx.rest_days))?;
        if let Some(role) = ctx.role {
            set.insert(ROLE, role_weights(role).rate_mult)?;
        }
        Ok(set)
    }

    /// Multipliers applied to baseline minutes.
    pub fn compute_minutes_factors(&self, ctx: &GameContext) -> EngineResult<AdjustmentSet> {
        let mut set = AdjustmentSet::new();
        if ctx.rest_days == Some(0) {
            set.insert(BACK_TO_BACK, self.table.minutes_back_to_back)?;
        }
        set.insert(INJURY_STATUS, self.injury_factor(ctx.injury_status))?;
        set.insert(BLOWOUT_RISK, self.blowout_factor(ctx.point_spread))?;
        if let Some(role) = ctx.role {
            set.insert(ROLE, role_weights(role).minutes_mult)?;
        }
        Ok(set)
    }

    /// Scale a rate belief by the product of `factors`.
    pub fn apply(&self, params: RateParameters, factors: &AdjustmentSet) -> EngineResult<RateParameters> {
        params.scaled(factors.product())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjuster() -> ContextAdjuster {
        ContextAdjuster::new(FactorTable::default())
    }

    #[test]
    fn test_adjustment_set_product_and_replace() {
        let mut set = AdjustmentSet::new();
        set.insert(PACE, 1.1).unwrap();
        set.insert(HOME_AWAY, 0.95).unwrap();
        assert!((set.product() - 1.045).abs() < 1e-12);
        set.insert(PACE, 1.0).unwrap();
        assert_eq!(set.len(), 2);
        assert!((set.product() - 0.95).abs() < 1e-12);
        let names: Vec<&str> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec![PACE, HOME_AWAY]);
    }

    #[test]
    fn test_adjustment_set_rejects_non_positive() {
        let mut set = AdjustmentSet::new();
        assert!(set.insert(PACE, 0.0).is_err());
        assert!(set.insert(PACE, -1.0).is_err());
        assert!(set.insert(PACE, f64::NAN).is_err());
        assert!(set.is_empty());
        assert_eq!(set.product(), 1.0);
    }

    #[test]
    fn test_matchup_table() {
        let a = adjuster();
        assert_eq!(a.matchup_factor(Some(DefenseTier::Top5), StatKind::Points), 0.92);
        assert_eq!(a.matchup_factor(Some(DefenseTier::Average), StatKind::Points), 1.00);
        assert_eq!(a.matchup_factor(Some(DefenseTier::Bottom5), StatKind::Points), 1.08);
        assert_eq!(a.matchup_factor(Some(DefenseTier::Top5), StatKind::Assists), 0.96);
        assert_eq!(a.matchup_factor(None, StatKind::Rebounds), 1.0);
    }

    #[test]
    fn test_venue_and_rest() {
        let a = adjuster();
        assert_eq!(a.venue_factor(Some(Venue::Home)), 1.05);
        assert_eq!(a.venue_factor(Some(Venue::Away)), 0.95);
        assert_eq!(a.rest_factor(Some(0)), 0.97);
        assert_eq!(a.rest_factor(Some(1)), 1.00);
        assert_eq!(a.rest_factor(Some(3)), 1.02);
        assert_eq!(a.rest_factor(None), 1.0);
    }

    #[test]
    fn test_pace_clamped() {
        let a = adjuster();
        let mut ctx = GameContext {
            team_pace: Some(104.0),
            opponent_pace: Some(100.0),
            ..GameContext::default()
        };
        assert!((a.pace_factor(&ctx) - 1.02).abs() < 1e-12);
        ctx.team_pace = Some(200.0);
        ctx.opponent_pace = None;
        assert_eq!(a.pace_factor(&ctx), 1.15);
        assert_eq!(a.pace_factor(&GameContext::default()), 1.0);
    }

    #[test]
    fn test_blowout_and_injury() {
        let a = adjuster();
        assert_eq!(a.blowout_factor(Some(-13.5)), 0.94);
        assert_eq!(a.blowout_factor(Some(9.0)), 0.97);
        assert_eq!(a.blowout_factor(Some(3.5)), 1.0);
        assert_eq!(a.blowout_factor(None), 1.0);
        assert_eq!(a.injury_factor(Some(InjuryStatus::Questionable)), 0.85);
        assert_eq!(a.injury_factor(None), 1.0);
    }

    #[test]
    fn test_compute_factors_defaults_neutral() {
        let a = adjuster();
        let set = a.compute_factors(&GameContext::default(), StatKind::Points).unwrap();
        assert_eq!(set.product(), 1.0);
        let minutes = a.compute_minutes_factors(&GameContext::default()).unwrap();
        assert_eq!(minutes.product(), 1.0);
        assert_eq!(minutes.get(BACK_TO_BACK), None);
    }

    #[test]
    fn test_compute_factors_full_context() {
        let a = adjuster();
        let ctx = GameContext {
            opponent_defense: Some(DefenseTier::Bottom5),
            venue: Some(Venue::Home),
            rest_days: Some(0),
            role: Some(Role::Sixth),
            ..GameContext::default()
        };
        let rate = a.compute_factors(&ctx, StatKind::Points).unwrap();
        let expected = 1.08 * 1.05 * 0.97 * 1.02;
        assert!((rate.product() - expected).abs() < 1e-12);

        let minutes = a.compute_minutes_factors(&ctx).unwrap();
        assert_eq!(minutes.get(BACK_TO_BACK), Some(0.95));
        assert_eq!(minutes.get(ROLE), Some(0.88));
    }

    #[test]
    fn test_role_ordering() {
        let s = role_weights(Role::Starter);
        let x = role_weights(Role::Sixth);
        let b = role_weights(Role::Bench);
        assert!(s.minutes_mult > x.minutes_mult && x.minutes_mult > b.minutes_mult);
        assert!(s.rate_mult > b.rate_mult);
    }

    #[test]
    fn test_apply_scales_mean() {
        let a = adjuster();
        let params = RateParameters::new(85.0, 105.0).unwrap();
        let set = AdjustmentSet::new().with(HOME_AWAY, 1.05).unwrap();
        let adjusted = a.apply(params, &set).unwrap();
        assert!((adjusted.mean() - params.mean() * 1.05).abs() < 1e-12);
    }
}
