//! Aggregation of simulated draws into the figures the pricer consumes.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::feed::types::StatKind;

/// Distribution of one stat's game total over `n_draws` simulated games.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub stat: StatKind,
    /// Draws in generation order.
    pub draws: Vec<u32>,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std_dev: f64,
    pub percentiles: BTreeMap<u8, f64>,
    /// `(line, P(count > line))`, sorted by line.
    pub threshold_probabilities: Vec<(f64, f64)>,
    #[serde(skip)]
    sorted: Vec<u32>,
}

impl SimulationResult {
    pub fn from_draws(
        stat: StatKind,
        draws: Vec<u32>,
        percentiles: &[u8],
        lines: &[f64],
    ) -> EngineResult<Self> {
        if draws.is_empty() {
            return Err(EngineError::InvalidParameter(
                "cannot summarise an empty draw sequence".into(),
            ));
        }
        let mut sorted = draws.clone();
        sorted.sort_unstable();

        let n = draws.len() as f64;
        let mean = draws.iter().map(|&x| x as f64).sum::<f64>() / n;
        let std_dev = if draws.len() > 1 {
            let ss: f64 = draws.iter().map(|&x| (x as f64 - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        let median = percentile_of_sorted(&sorted, 50.0);
        let percentiles = percentiles
            .iter()
            .filter(|&&p| p <= 100)
            .map(|&p| (p, percentile_of_sorted(&sorted, p as f64)))
            .collect();

        let mut result = Self {
            stat,
            draws,
            mean,
            median,
            std_dev,
            percentiles,
            threshold_probabilities: Vec::new(),
            sorted,
        };
        result.add_lines(lines);
        Ok(result)
    }

    /// Record `P(count > line)` for extra lines, keeping the table sorted and unique.
    pub fn add_lines(&mut self, lines: &[f64]) {
        for &line in lines.iter().filter(|l| l.is_finite()) {
            if self.threshold(line).is_some() {
                continue;
            }
            let p = self.prob_over(line);
            let idx = self
                .threshold_probabilities
                .partition_point(|(l, _)| *l < line);
            self.threshold_probabilities.insert(idx, (line, p));
        }
    }

    /// Tabulated `P(count > line)`, if the line was requested.
    pub fn threshold(&self, line: f64) -> Option<f64> {
        self.threshold_probabilities
            .iter()
            .find(|(l, _)| *l == line)
            .map(|(_, p)| *p)
    }

    pub fn n_draws(&self) -> usize {
        self.draws.len()
    }

    /// Empirical `P(count > line)`.
    pub fn prob_over(&self, line: f64) -> f64 {
        let at_or_below = self.sorted.partition_point(|&x| x as f64 <= line);
        (self.sorted.len() - at_or_below) as f64 / self.sorted.len() as f64
    }

    /// Empirical `P(count < line)`.
    pub fn prob_under(&self, line: f64) -> f64 {
        let below = self.sorted.partition_point(|&x| (x as f64) < line);
        below as f64 / self.sorted.len() as f64
    }

    /// Empirical `P(count == line)`; zero for half-point lines.
    pub fn prob_push(&self, line: f64) -> f64 {
        1.0 - self.prob_over(line) - self.prob_under(line)
    }

    pub fn percentile(&self, p: f64) -> f64 {
        percentile_of_sorted(&self.sorted, p)
    }
}

/// Linear interpolation between order statistics.
fn percentile_of_sorted(sorted: &[u32], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0] as f64,
        n => {
            let pos = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let (a, b) = (sorted[lo] as f64, sorted[hi] as f64);
            a + (b - a) * (pos - lo as f64)
        }
    }
}
