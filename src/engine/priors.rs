//! Gamma-Poisson priors per player/stat.
//!
//! Each named history window is fitted independently by conjugate update from
//! a weak seed, the window fits are blended linearly, and the blend is shrunk
//! toward the league baseline with weight `ω = k / (k + n)`.
//!
//! The blend is a linear combination of shape and rate components, an
//! approximation of proper hierarchical pooling.

use std::collections::BTreeMap;

use serde::Serialize;

use super::rate::{LeagueBaseline, RateParameters};
use crate::config::PriorConfig;
use crate::error::{EngineError, EngineResult};
use crate::feed::types::{BoxScoreRow, ObservationWindow, Role, StatKind, WindowName};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Conjugate update: `(shape + count, rate + minutes)`.
pub fn update_posterior(
    prior: RateParameters,
    new_stat_count: u32,
    new_minutes: f64,
) -> EngineResult<RateParameters> {
    if !(new_minutes.is_finite() && new_minutes >= 0.0) {
        return Err(EngineError::InvalidParameter(format!(
            "minutes must be non-negative, got {new_minutes}"
        )));
    }
    RateParameters::new(
        prior.shape() + new_stat_count as f64,
        prior.rate() + new_minutes,
    )
}

/// Fold every observation of a window into `prior` in one batch update.
pub fn update_with_window(
    prior: RateParameters,
    window: &ObservationWindow,
) -> EngineResult<RateParameters> {
    RateParameters::new(
        prior.shape() + window.total_count(),
        prior.rate() + window.total_minutes(),
    )
}

/// Intermediate quantities of a prior build, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriorFit {
    pub params: RateParameters,
    /// Blended window estimate before shrinkage, if any window had data.
    pub blended: Option<RateParameters>,
    /// Weight given to the league baseline.
    pub shrinkage_weight: f64,
    pub games: usize,
}

pub struct PriorEngine {
    config: PriorConfig,
}

impl PriorEngine {
    pub fn new(config: PriorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PriorConfig {
        &self.config
    }

    fn seed(&self) -> EngineResult<RateParameters> {
        RateParameters::new(self.config.seed_alpha, self.config.seed_beta)
    }

    /// Independent conjugate fit of one window from the weak seed.
    pub fn fit_window(&self, window: &ObservationWindow) -> EngineResult<RateParameters> {
        update_with_window(self.seed()?, window)
    }

    /// Shrinkage weight toward the baseline for `games` observed games.
    pub fn shrinkage_weight(&self, games: usize) -> f64 {
        let k = self.config.shrinkage_k.max(0.0);
        if k == 0.0 {
            return if games == 0 { 1.0 } else { 0.0 };
        }
        k / (k + games as f64)
    }

    /// Blended, shrunk prior for one player/stat.
    ///
    /// `sample_size` overrides the games count `n` used for shrinkage; by
    /// default it is the total number of games across the blended windows.
    pub fn build_prior(
        &self,
        windows: &BTreeMap<WindowName, ObservationWindow>,
        weights: &BTreeMap<WindowName, f64>,
        league_baseline: Option<RateParameters>,
        sample_size: Option<usize>,
    ) -> EngineResult<RateParameters> {
        Ok(self
            .fit(windows, weights, league_baseline, sample_size)?
            .params)
    }

    /// Same as `build_prior`, returning the intermediate quantities too.
    pub fn fit(
        &self,
        windows: &BTreeMap<WindowName, ObservationWindow>,
        weights: &BTreeMap<WindowName, f64>,
        league_baseline: Option<RateParameters>,
        sample_size: Option<usize>,
    ) -> EngineResult<PriorFit> {
        validate_weights(weights)?;

        // Empty or zero-weight windows drop out; the rest are renormalised.
        let used: Vec<(&ObservationWindow, f64)> = windows
            .iter()
            .filter(|(_, w)| !w.is_empty())
            .filter_map(|(name, w)| {
                weights
                    .get(name)
                    .copied()
                    .filter(|weight| *weight > 0.0)
                    .map(|weight| (w, weight))
            })
            .collect();
        let weight_total: f64 = used.iter().map(|(_, weight)| weight).sum();
        let observed_games: usize = used.iter().map(|(w, _)| w.len()).sum();
        let games = sample_size.unwrap_or(observed_games);

        let blended = if used.is_empty() {
            None
        } else {
            let mut alpha = 0.0;
            let mut beta = 0.0;
            for (window, weight) in &used {
                let fit = self.fit_window(window)?;
                alpha += weight / weight_total * fit.shape();
                beta += weight / weight_total * fit.rate();
            }
            Some(RateParameters::new(alpha, beta)?)
        };

        let fit = match (blended, league_baseline) {
            (None, None) => {
                return Err(EngineError::InsufficientData(
                    "every window is empty and no league baseline was supplied".into(),
                ))
            }
            (None, Some(league)) => {
                tracing::warn!("no usable history, falling back to league baseline");
                PriorFit {
                    params: league,
                    blended: None,
                    shrinkage_weight: 1.0,
                    games,
                }
            }
            (Some(blend), None) => PriorFit {
                params: blend,
                blended: Some(blend),
                shrinkage_weight: 0.0,
                games,
            },
            (Some(blend), Some(league)) => {
                let omega = self.shrinkage_weight(games);
                let params = RateParameters::new(
                    (1.0 - omega) * blend.shape() + omega * league.shape(),
                    (1.0 - omega) * blend.rate() + omega * league.rate(),
                )?;
                PriorFit {
                    params,
                    blended: Some(blend),
                    shrinkage_weight: omega,
                    games,
                }
            }
        };

        tracing::debug!(
            windows = used.len(),
            games = fit.games,
            omega = fit.shrinkage_weight,
            shape = fit.params.shape(),
            rate = fit.params.rate(),
            "prior built"
        );
        Ok(fit)
    }

    /// Prior for `stat` from per-window box-score rows of one player, using the
    /// configured window weights and the baseline entry for the stat.
    pub fn build_from_box_scores(
        &self,
        rows_by_window: &BTreeMap<WindowName, Vec<BoxScoreRow>>,
        stat: StatKind,
        baseline: &LeagueBaseline,
        position: Option<&str>,
    ) -> EngineResult<PriorFit> {
        let windows: BTreeMap<WindowName, ObservationWindow> = rows_by_window
            .iter()
            .map(|(name, rows)| (*name, ObservationWindow::from_box_scores(*name, rows, stat)))
            .collect();
        self.fit(
            &windows,
            &self.config.window_weights,
            baseline.get(stat, position),
            None,
        )
    }

    /// Role from the most recent `role_window` games.
    pub fn resolve_role(&self, recent_roles: &[Option<Role>]) -> Role {
        resolve_role(recent_roles, self.config.role_window)
    }
}

fn validate_weights(weights: &BTreeMap<WindowName, f64>) -> EngineResult<()> {
    for (name, w) in weights {
        if !(w.is_finite() && (0.0..=1.0).contains(w)) {
            return Err(EngineError::InvalidParameter(format!(
                "weight for window {name} must be in [0, 1], got {w}"
            )));
        }
    }
    let total: f64 = weights.values().sum();
    if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(EngineError::InvalidParameter(format!(
            "window weights must sum to 1, got {total}"
        )));
    }
    Ok(())
}

/// Most frequent role over the last `window` games (ties go to the most
/// recent), else the most recent known role, else `Role::Bench`.
pub fn resolve_role(roles: &[Option<Role>], window: usize) -> Role {
    let start = roles.len().saturating_sub(window);
    let recent: Vec<Role> = roles[start..].iter().flatten().copied().collect();
    if recent.is_empty() {
        return roles.iter().rev().flatten().next().copied().unwrap_or_default();
    }

    let mut best: Option<(Role, usize, usize)> = None; // (role, count, last index)
    for (idx, role) in recent.iter().enumerate() {
        let count = recent.iter().filter(|r| *r == role).count();
        let better = match best {
            None => true,
            Some((_, best_count, best_idx)) => {
                count > best_count || (count == best_count && idx > best_idx)
            }
        };
        if better {
            best = Some((*role, count, idx));
        }
    }
    best.map(|(role, _, _)| role).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::Observation;
    use chrono::{TimeZone, Utc};

    fn window(name: WindowName, games: &[(u32, f64)]) -> ObservationWindow {
        let obs = games
            .iter()
            .enumerate()
            .map(|(i, (count, minutes))| {
                Observation::new(
                    *count,
                    *minutes,
                    Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap()
                        + chrono::Duration::days(i as i64),
                )
            })
            .collect();
        ObservationWindow::new(name, obs)
    }

    fn engine() -> PriorEngine {
        PriorEngine::new(PriorConfig::default())
    }

    fn recent_only() -> BTreeMap<WindowName, f64> {
        BTreeMap::from([(WindowName::Recent, 1.0)])
    }

    #[test]
    fn test_update_posterior_exact() {
        let prior = RateParameters::new(10.0, 0.5).unwrap();
        let post = update_posterior(prior, 75, 105.0).unwrap();
        assert_eq!(post.shape(), 85.0);
        assert_eq!(post.rate(), 105.5);
    }

    #[test]
    fn test_update_posterior_sequential_equals_batch() {
        let prior = RateParameters::new(10.0, 0.5).unwrap();
        let games = [(25u32, 35.0), (27, 34.5), (23, 35.5)];
        let mut seq = prior;
        for (count, minutes) in games {
            seq = update_posterior(seq, count, minutes).unwrap();
        }
        let batch = update_posterior(prior, 75, 105.0).unwrap();
        assert_eq!(seq, batch);
    }

    #[test]
    fn test_update_posterior_rejects_negative_minutes() {
        let prior = RateParameters::new(1.0, 1.0).unwrap();
        assert!(matches!(
            update_posterior(prior, 1, -2.0),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_window_fit_from_seed() {
        let w = window(WindowName::Recent, &[(20, 30.0), (10, 20.0)]);
        let fit = engine().fit_window(&w).unwrap();
        assert_eq!(fit.shape(), 31.0);
        assert_eq!(fit.rate(), 51.0);
    }

    #[test]
    fn test_blend_is_linear_in_shape_and_rate() {
        let windows = BTreeMap::from([
            (WindowName::Recent, window(WindowName::Recent, &[(30, 30.0)])),
            (WindowName::Season, window(WindowName::Season, &[(10, 30.0)])),
        ]);
        let weights = BTreeMap::from([(WindowName::Recent, 0.5), (WindowName::Season, 0.5)]);
        let fit = engine().fit(&windows, &weights, None, None).unwrap();
        let blended = fit.blended.unwrap();
        assert!((blended.shape() - 21.0).abs() < 1e-12);
        assert!((blended.rate() - 31.0).abs() < 1e-12);
        assert_eq!(fit.shrinkage_weight, 0.0);
    }

    #[test]
    fn test_empty_window_weight_renormalised() {
        let windows = BTreeMap::from([
            (WindowName::Recent, window(WindowName::Recent, &[(30, 30.0)])),
            (WindowName::Season, ObservationWindow::empty(WindowName::Season)),
        ]);
        let weights = BTreeMap::from([(WindowName::Recent, 0.6), (WindowName::Season, 0.4)]);
        let fit = engine().fit(&windows, &weights, None, None).unwrap();
        assert_eq!(fit.params.shape(), 31.0);
        assert_eq!(fit.params.rate(), 31.0);
    }

    #[test]
    fn test_shrinkage_weight_formula() {
        let e = engine();
        assert_eq!(e.shrinkage_weight(0), 1.0);
        assert_eq!(e.shrinkage_weight(20), 0.5);
        assert!((e.shrinkage_weight(60) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_shrinkage_applied() {
        let windows = BTreeMap::from([(
            WindowName::Recent,
            window(WindowName::Recent, &[(19, 19.0); 20]),
        )]);
        let league = RateParameters::new(90.0, 200.0).unwrap();
        let fit = engine()
            .fit(&windows, &recent_only(), Some(league), None)
            .unwrap();
        // 20 games, k = 20 → ω = 0.5; blend = (1 + 380, 1 + 380)
        assert_eq!(fit.shrinkage_weight, 0.5);
        assert!((fit.params.shape() - (0.5 * 381.0 + 0.5 * 90.0)).abs() < 1e-9);
        assert!((fit.params.rate() - (0.5 * 381.0 + 0.5 * 200.0)).abs() < 1e-9);
    }

    #[test]
    fn test_no_history_returns_baseline() {
        let windows = BTreeMap::from([(WindowName::Recent, ObservationWindow::empty(WindowName::Recent))]);
        let league = RateParameters::new(90.0, 200.0).unwrap();
        let prior = engine()
            .build_prior(&windows, &recent_only(), Some(league), None)
            .unwrap();
        assert_eq!(prior, league);
    }

    #[test]
    fn test_no_history_no_baseline_fails() {
        let windows = BTreeMap::new();
        let err = engine()
            .build_prior(&windows, &recent_only(), None, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_sample_size_override() {
        let windows = BTreeMap::from([(WindowName::Recent, window(WindowName::Recent, &[(20, 30.0)]))]);
        let league = RateParameters::new(90.0, 200.0).unwrap();
        let fit = engine()
            .fit(&windows, &recent_only(), Some(league), Some(180))
            .unwrap();
        assert!((fit.shrinkage_weight - 0.1).abs() < 1e-12);
        assert_eq!(fit.games, 180);
    }

    #[test]
    fn test_invalid_weights() {
        let windows = BTreeMap::new();
        let league = RateParameters::new(1.0, 1.0).unwrap();
        let bad_sum = BTreeMap::from([(WindowName::Recent, 0.5)]);
        assert!(matches!(
            engine().build_prior(&windows, &bad_sum, Some(league), None),
            Err(EngineError::InvalidParameter(_))
        ));
        let negative = BTreeMap::from([(WindowName::Recent, 1.2), (WindowName::Season, -0.2)]);
        assert!(engine()
            .build_prior(&windows, &negative, Some(league), None)
            .is_err());
    }

    #[test]
    fn test_resolve_role_mode() {
        use Role::*;
        let roles = [Some(Bench), Some(Starter), Some(Starter), None, Some(Sixth)];
        assert_eq!(resolve_role(&roles, 5), Starter);
    }

    #[test]
    fn test_resolve_role_tie_goes_to_most_recent() {
        use Role::*;
        let roles = [Some(Starter), Some(Sixth)];
        assert_eq!(resolve_role(&roles, 5), Sixth);
    }

    #[test]
    fn test_resolve_role_fallbacks() {
        use Role::*;
        // Nothing in the window → most recent known role before it.
        let roles = [Some(Starter), None, None];
        assert_eq!(resolve_role(&roles, 2), Starter);
        assert_eq!(resolve_role(&[None, None], 5), Bench);
        assert_eq!(resolve_role(&[], 5), Bench);
    }
}
