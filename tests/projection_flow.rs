// End-to-end projection: history -> prior -> context -> simulation -> edge

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, TimeZone, Utc};
    use propsim::config::{Config, PriorConfig, PricingConfig, SimulationConfig};
    use propsim::engine::context::{DefenseTier, InjuryStatus, Venue};
    use propsim::engine::priors::update_posterior;
    use propsim::engine::rate::LeagueBaseline;
    use propsim::engine::{
        ConfidenceTier, ContextAdjuster, EdgePricer, GameContext, MinutesDistributionSpec,
        MinutesModel, PriorEngine, RateParameters, RationaleContext, SimulationEngine,
    };
    use propsim::feed::types::{
        BoxScoreRow, Observation, ObservationWindow, OddsRow, Role, Side, StatKind, WindowName,
    };

    fn box_scores(n: usize, points: u32, minutes: f64) -> Vec<BoxScoreRow> {
        let t0 = Utc.with_ymd_and_hms(2025, 10, 22, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| BoxScoreRow {
                player_id: "203999".into(),
                game_time: t0 + Duration::days(2 * i as i64),
                minutes: minutes + (i % 3) as f64 - 1.0,
                points,
                rebounds: 10,
                assists: 7,
                role: Some(Role::Starter),
            })
            .collect()
    }

    #[test]
    fn test_reference_scenario() {
        // Prior (10, 0.5) after 3 games × 35 minutes with 75 points.
        let mut posterior = RateParameters::new(10.0, 0.5).unwrap();
        for _ in 0..3 {
            posterior = update_posterior(posterior, 25, 35.0).unwrap();
        }
        assert!((posterior.shape() - 85.0).abs() < 1e-12);
        assert!((posterior.rate() - 105.5).abs() < 1e-12);

        let params = RateParameters::new(85.0, 105.0).unwrap();
        let minutes = MinutesDistributionSpec::new(36.0, 3.0).unwrap();
        let engine = SimulationEngine::new(SimulationConfig::default());
        let first = engine
            .simulate(StatKind::Points, params, minutes, 10_000, Some(42), None)
            .unwrap()
            .into_single()
            .unwrap();
        let again = engine
            .simulate(StatKind::Points, params, minutes, 10_000, Some(42), None)
            .unwrap()
            .into_single()
            .unwrap();
        assert_eq!(first.draws, again.draws);
        assert_eq!(first.mean, again.mean);

        // Analytic: E = 85·36/105 ≈ 29.14, P(X > 25.5) ≈ 0.693.
        assert!((first.mean - 29.14).abs() < 0.3, "mean {}", first.mean);
        let p_over = first.prob_over(25.5);
        assert!((p_over - 0.693).abs() < 0.025, "p_over {p_over}");
        assert!(first.percentiles[&5] < first.median && first.median < first.percentiles[&95]);

        let pricer = EdgePricer::new(PricingConfig::default());
        let priced = pricer.price_edge(p_over, -110, Side::Over).unwrap();
        assert_eq!(priced.confidence_tier, ConfidenceTier::Strong);
        assert!(priced.kelly_fraction > 0.05 && priced.kelly_fraction < 0.12);
    }

    #[test]
    fn test_sequential_updates_equal_batch() {
        let prior = RateParameters::new(3.0, 7.0).unwrap();
        let games = [(12u32, 31.5), (0, 4.0), (27, 38.25), (9, 22.0)];
        let sequential = games
            .iter()
            .try_fold(prior, |p, &(c, m)| update_posterior(p, c, m))
            .unwrap();
        let count: u32 = games.iter().map(|g| g.0).sum();
        let minutes: f64 = games.iter().map(|g| g.1).sum();
        let batch = update_posterior(prior, count, minutes).unwrap();
        assert!((sequential.shape() - batch.shape()).abs() < 1e-9);
        assert!((sequential.rate() - batch.rate()).abs() < 1e-9);
    }

    #[test]
    fn test_shrinkage_limits() {
        let engine = PriorEngine::new(PriorConfig::default());
        let t0 = Utc.with_ymd_and_hms(2025, 10, 22, 0, 0, 0).unwrap();
        let obs = (0..10)
            .map(|i| Observation::new(30, 36.0, t0 + Duration::days(i)))
            .collect();
        let mut windows = BTreeMap::new();
        windows.insert(WindowName::Recent, ObservationWindow::new(WindowName::Recent, obs));
        let mut weights = BTreeMap::new();
        weights.insert(WindowName::Recent, 1.0);
        let league = RateParameters::new(90.0, 200.0).unwrap();

        let none = engine.fit(&windows, &weights, Some(league), Some(0)).unwrap();
        assert_eq!(none.shrinkage_weight, 1.0);
        assert!((none.params.shape() - 90.0).abs() < 1e-9);

        let huge = engine
            .fit(&windows, &weights, Some(league), Some(10_000_000))
            .unwrap();
        let blended = huge.blended.unwrap();
        assert!(huge.shrinkage_weight < 1e-5);
        assert!((huge.params.mean() - blended.mean()).abs() < 1e-4);
    }

    #[test]
    fn test_full_pipeline_from_box_scores() {
        let config = Config::default();
        let priors = PriorEngine::new(config.priors.clone());
        let adjuster = ContextAdjuster::new(config.context.clone());
        let minutes_model = MinutesModel::new(config.minutes.clone());
        let engine = SimulationEngine::new(SimulationConfig {
            seed: Some(7),
            ..config.simulation.clone()
        })
        .with_correlation(config.correlation.clone());
        let pricer = EdgePricer::new(config.pricing.clone());

        let mut rows = BTreeMap::new();
        rows.insert(WindowName::Recent, box_scores(10, 28, 35.0));
        rows.insert(WindowName::Season, box_scores(40, 25, 34.0));
        let fit = priors
            .build_from_box_scores(&rows, StatKind::Points, &LeagueBaseline::seed_defaults(), None)
            .unwrap();
        assert!(fit.shrinkage_weight > 0.0 && fit.shrinkage_weight < 0.5);

        let ctx = GameContext {
            team_pace: Some(102.0),
            opponent_pace: Some(100.0),
            opponent_defense: Some(DefenseTier::Bottom5),
            venue: Some(Venue::Home),
            rest_days: Some(2),
            injury_status: Some(InjuryStatus::Probable),
            point_spread: Some(-4.5),
            role: Some(priors.resolve_role(&[Some(Role::Starter); 5])),
            ..GameContext::default()
        };
        let rate_factors = adjuster.compute_factors(&ctx, StatKind::Points).unwrap();
        let params = adjuster.apply(fit.params, &rate_factors).unwrap();
        assert!(params.mean() > fit.params.mean());

        let recent = ObservationWindow::from_box_scores(
            WindowName::Recent,
            &rows[&WindowName::Recent],
            StatKind::Points,
        );
        let minutes = minutes_model
            .from_history(&recent, &adjuster.compute_minutes_factors(&ctx).unwrap())
            .unwrap();
        assert!(minutes.mean() < 35.0);

        let result = engine
            .simulate(StatKind::Points, params, minutes, 5_000, None, None)
            .unwrap()
            .into_single()
            .unwrap();
        assert!(result.mean > 20.0 && result.mean < 35.0, "mean {}", result.mean);

        let row = OddsRow {
            player_id: "203999".into(),
            player_name: "Test Player".into(),
            stat: "PTS".into(),
            line: 26.5,
            over_odds: "-115".into(),
            under_odds: "-105".into(),
            book: "book".into(),
        };
        let quotes = row.into_quotes().unwrap();
        assert_eq!(quotes.len(), 2);
        let rationale_ctx = RationaleContext {
            role: ctx.role,
            projected_minutes: Some(minutes.mean()),
        };
        let assessments: Vec<_> = quotes
            .iter()
            .map(|q| pricer.assess_with_context(q, &result, &rationale_ctx).unwrap())
            .collect();
        let total_p: f64 = assessments.iter().map(|a| a.model_probability).sum();
        assert!((total_p - 1.0).abs() < 1e-12);
        for a in &assessments {
            assert!(a.kelly_fraction <= config.pricing.max_kelly_fraction);
            assert!(a.to_json().unwrap().contains("\"player_id\":\"203999\""));
            assert!(a.rationale.starts_with("role=starter"));
            assert!(a.rationale.contains(&format!("sim_mean={:.2}", result.mean)));
        }
    }
}
