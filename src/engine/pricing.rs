use serde::Serialize;
use std::fmt;

use super::context::role_weights;
use super::kelly::{fractional_kelly, stake_amount};
use super::odds::{devig, implied_probability, payout_per_unit};
use super::summary::SimulationResult;
use crate::config::PricingConfig;
use crate::error::{EngineError, EngineResult};
use crate::feed::types::{PropQuote, Role, Side, StatKind};

/// Edge strength by expected value per unit staked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    NoBet,
    Weak,
    Medium,
    Strong,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfidenceTier::NoBet => "no_bet",
            ConfidenceTier::Weak => "weak",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Strong => "strong",
        };
        f.write_str(s)
    }
}

/// Pricing of one side at one price, before it is tied to a player and line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgePricing {
    pub side: Side,
    pub american_odds: i32,
    pub market_probability: f64,
    pub model_probability: f64,
    pub edge: f64,
    pub expected_value: f64,
    pub kelly_fraction: f64,
    pub confidence_tier: ConfidenceTier,
}

/// Full report for one (player, stat, line, side).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeAssessment {
    pub player_id: String,
    pub stat: StatKind,
    pub line: f64,
    pub side: Side,
    pub book: String,
    pub american_odds: i32,
    pub market_probability: f64,
    pub model_probability: f64,
    pub edge: f64,
    pub expected_value: f64,
    pub kelly_fraction: f64,
    pub confidence_tier: ConfidenceTier,
    /// One-line human summary, e.g. `role=starter (min×1.00, rate×1.00); proj_min≈35.0; sim_mean=29.14; Δ vs PTS 25.5=+3.64; method=sim(n=10000)`.
    pub rationale: String,
}

/// Projection context quoted in an assessment's rationale.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RationaleContext {
    pub role: Option<Role>,
    pub projected_minutes: Option<f64>,
}

fn rationale(quote: &PropQuote, result: &SimulationResult, ctx: &RationaleContext) -> String {
    let mut parts = Vec::new();
    if let Some(role) = ctx.role {
        let w = role_weights(role);
        parts.push(format!(
            "role={role} (min×{:.2}, rate×{:.2})",
            w.minutes_mult, w.rate_mult
        ));
    }
    if let Some(m) = ctx.projected_minutes.filter(|m| m.is_finite()) {
        parts.push(format!("proj_min≈{m:.1}"));
    }
    parts.push(format!("sim_mean={:.2}", result.mean));
    parts.push(format!(
        "Δ vs {} {}={:+.2}",
        quote.stat,
        quote.line,
        result.mean - quote.line
    ));
    parts.push(format!("method=sim(n={})", result.n_draws()));
    parts.join("; ")
}

impl EdgeAssessment {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Recommended stake for `bankroll`, floored to cents.
    pub fn stake(&self, bankroll: f64) -> f64 {
        stake_amount(self.kelly_fraction, bankroll)
    }

    pub fn is_bet(&self) -> bool {
        self.confidence_tier != ConfidenceTier::NoBet
    }
}

/// Closing line value of a model probability against the opening and closing price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClvReport {
    pub model_probability: f64,
    pub open_prob: f64,
    pub close_prob: f64,
    pub clv_open: f64,
    pub clv_close: f64,
}

pub struct EdgePricer {
    config: PricingConfig,
}

impl EdgePricer {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn classify(&self, expected_value: f64) -> ConfidenceTier {
        if expected_value >= self.config.strong_ev {
            ConfidenceTier::Strong
        } else if expected_value >= self.config.medium_ev {
            ConfidenceTier::Medium
        } else if expected_value >= self.config.weak_ev {
            ConfidenceTier::Weak
        } else {
            ConfidenceTier::NoBet
        }
    }

    /// Price `model_probability` against the book's `american_odds` for `side`.
    pub fn price_edge(
        &self,
        model_probability: f64,
        american_odds: i32,
        side: Side,
    ) -> EngineResult<EdgePricing> {
        let market_probability = implied_probability(american_odds)?;
        self.price_against(model_probability, american_odds, market_probability, side)
    }

    fn price_against(
        &self,
        model_probability: f64,
        american_odds: i32,
        market_probability: f64,
        side: Side,
    ) -> EngineResult<EdgePricing> {
        if !(0.0..=1.0).contains(&model_probability) {
            return Err(EngineError::InvalidParameter(format!(
                "model probability must be in [0, 1], got {model_probability}"
            )));
        }
        let b = payout_per_unit(american_odds)?;
        let expected_value = model_probability * b - (1.0 - model_probability);
        let kelly_fraction = fractional_kelly(
            model_probability,
            b,
            self.config.kelly_multiplier,
            self.config.max_kelly_fraction,
        );
        Ok(EdgePricing {
            side,
            american_odds,
            market_probability,
            model_probability,
            edge: model_probability - market_probability,
            expected_value,
            kelly_fraction,
            confidence_tier: self.classify(expected_value),
        })
    }

    /// Price a book quote against a simulated distribution.
    ///
    /// The model probability is the win probability among graded outcomes:
    /// draws landing exactly on an integer line are pushes and drop out.
    pub fn assess(&self, quote: &PropQuote, result: &SimulationResult) -> EngineResult<EdgeAssessment> {
        self.assess_with_context(quote, result, &RationaleContext::default())
    }

    /// `assess`, quoting role and projected minutes in the rationale.
    pub fn assess_with_context(
        &self,
        quote: &PropQuote,
        result: &SimulationResult,
        context: &RationaleContext,
    ) -> EngineResult<EdgeAssessment> {
        if quote.stat != result.stat {
            return Err(EngineError::InvalidParameter(format!(
                "quote is for {} but the simulation is for {}",
                quote.stat, result.stat
            )));
        }
        let (over, under) = (result.prob_over(quote.line), result.prob_under(quote.line));
        let (win, lose) = match quote.side {
            Side::Over => (over, under),
            Side::Under => (under, over),
        };
        let graded = win + lose;
        let model_probability = if graded > 0.0 { win / graded } else { 0.0 };

        let market_probability = match (self.config.devig, quote.opposite_odds) {
            (true, Some(opposite)) => devig(quote.american_odds, opposite)?.0,
            _ => implied_probability(quote.american_odds)?,
        };
        let priced = self.price_against(
            model_probability,
            quote.american_odds,
            market_probability,
            quote.side,
        )?;

        tracing::debug!(
            player = %quote.player_id,
            stat = %quote.stat,
            line = quote.line,
            side = %quote.side,
            ev = priced.expected_value,
            tier = %priced.confidence_tier,
            "priced prop"
        );

        Ok(EdgeAssessment {
            player_id: quote.player_id.clone(),
            stat: quote.stat,
            line: quote.line,
            side: quote.side,
            book: quote.book.clone(),
            american_odds: quote.american_odds,
            market_probability: priced.market_probability,
            model_probability: priced.model_probability,
            edge: priced.edge,
            expected_value: priced.expected_value,
            kelly_fraction: priced.kelly_fraction,
            confidence_tier: priced.confidence_tier,
            rationale: rationale(quote, result, context),
        })
    }
}

/// Book probability minus model probability at open and at close.
pub fn closing_line_value(
    model_probability: f64,
    open_odds: i32,
    close_odds: i32,
) -> EngineResult<ClvReport> {
    let open_prob = implied_probability(open_odds)?;
    let close_prob = implied_probability(close_odds)?;
    Ok(ClvReport {
        model_probability,
        open_prob,
        close_prob,
        clv_open: open_prob - model_probability,
        clv_close: close_prob - model_probability,
    })
}
