//! Two-stage Monte Carlo: minutes from the truncated Gaussian, then the
//! stat count from the Gamma-Poisson posterior predictive at those minutes.
//!
//! Single-stat draws sample the negative binomial as a Gamma-mixed Poisson.
//! Joint draws take each count from that stat's own marginal, minutes
//! integrated out (`MinutesMixture`), at a Gaussian-copula uniform. Minutes
//! enter every marginal independently, so the only dependence between stats
//! is the requested correlation.
//!
//! Antithetic pairing: each minutes uniform `u` is reused as `1 - u` on the
//! next draw (in joint runs the copula normals as `-z`), so half the draws
//! mirror the other half.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::copula::{to_uniforms, CorrelatedNormalGenerator, CorrelationMatrix};
use super::minutes::MinutesDistributionSpec;
use super::negbin::{MinutesMixture, NegativeBinomial};
use super::rate::RateParameters;
use super::summary::SimulationResult;
use crate::config::{CorrelationConfig, SimulationConfig};
use crate::error::{EngineError, EngineResult};
use crate::feed::types::StatKind;

/// `stat → (posterior, correlation with the primary stat)`.
pub type CorrelatedStats = BTreeMap<StatKind, (RateParameters, f64)>;

#[derive(Debug, Clone)]
pub enum SimulationOutput {
    Single(SimulationResult),
    Joint(JointSimulation),
}

impl SimulationOutput {
    /// Result for the primary stat either way.
    pub fn primary(&self) -> &SimulationResult {
        match self {
            SimulationOutput::Single(r) => r,
            SimulationOutput::Joint(j) => j.primary(),
        }
    }

    pub fn into_single(self) -> Option<SimulationResult> {
        match self {
            SimulationOutput::Single(r) => Some(r),
            SimulationOutput::Joint(_) => None,
        }
    }

    pub fn into_joint(self) -> Option<JointSimulation> {
        match self {
            SimulationOutput::Joint(j) => Some(j),
            SimulationOutput::Single(_) => None,
        }
    }
}

/// Per-stat results from one joint run; draw `i` of every stat comes from the same simulated game.
#[derive(Debug, Clone)]
pub struct JointSimulation {
    primary: StatKind,
    results: BTreeMap<StatKind, SimulationResult>,
    percentiles: Vec<u8>,
    lines: Vec<f64>,
}

impl JointSimulation {
    pub fn primary(&self) -> &SimulationResult {
        // The primary stat is always inserted on construction.
        &self.results[&self.primary]
    }

    pub fn primary_stat(&self) -> StatKind {
        self.primary
    }

    pub fn get(&self, stat: StatKind) -> Option<&SimulationResult> {
        self.results.get(&stat)
    }

    pub fn results(&self) -> &BTreeMap<StatKind, SimulationResult> {
        &self.results
    }

    pub fn into_results(self) -> BTreeMap<StatKind, SimulationResult> {
        self.results
    }

    /// Exact distribution of a summed market (PA, RA, PRA) from per-draw sums.
    pub fn composite(&self, stat: StatKind) -> EngineResult<SimulationResult> {
        let mut parts = Vec::with_capacity(stat.components().len());
        for component in stat.components() {
            let r = self.results.get(component).ok_or_else(|| {
                EngineError::InvalidParameter(format!(
                    "{stat} needs {component} in the joint simulation"
                ))
            })?;
            parts.push(&r.draws);
        }
        let n = parts.first().map(|d| d.len()).unwrap_or(0);
        let sums = (0..n)
            .map(|i| parts.iter().map(|d| d[i]).sum::<u32>())
            .collect();
        SimulationResult::from_draws(stat, sums, &self.percentiles, &self.lines)
    }
}

pub struct SimulationEngine {
    config: SimulationConfig,
    correlation: CorrelationConfig,
}

impl SimulationEngine {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            correlation: CorrelationConfig::default(),
        }
    }

    /// Pairwise correlations used between non-primary stats of a joint run.
    pub fn with_correlation(mut self, correlation: CorrelationConfig) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulate `stat`, jointly with `correlated_stats` when given.
    ///
    /// `seed` overrides the configured seed; with neither set the stream is
    /// seeded from OS entropy and the run is not reproducible.
    pub fn simulate(
        &self,
        stat: StatKind,
        rate_params: RateParameters,
        minutes_spec: MinutesDistributionSpec,
        n_draws: usize,
        seed: Option<u64>,
        correlated_stats: Option<&CorrelatedStats>,
    ) -> EngineResult<SimulationOutput> {
        match correlated_stats {
            Some(others) if !others.is_empty() => self
                .simulate_joint(stat, rate_params, minutes_spec, n_draws, seed, others)
                .map(SimulationOutput::Joint),
            _ => self
                .simulate_single(stat, rate_params, minutes_spec, n_draws, seed)
                .map(SimulationOutput::Single),
        }
    }

    pub fn simulate_single(
        &self,
        stat: StatKind,
        rate_params: RateParameters,
        minutes_spec: MinutesDistributionSpec,
        n_draws: usize,
        seed: Option<u64>,
    ) -> EngineResult<SimulationResult> {
        validate_draws(n_draws)?;
        let mut rng = self.rng(seed);
        let mut minutes = MinutesStream::new(self.config.antithetic);

        let mut draws = Vec::with_capacity(n_draws);
        for _ in 0..n_draws {
            let u = minutes.next(&mut rng);
            let m = minutes_spec.quantile(u);
            let nb = NegativeBinomial::from_rate(&rate_params, m)?;
            draws.push(nb.sample(&mut rng));
        }

        let result = SimulationResult::from_draws(
            stat,
            draws,
            &self.config.percentiles,
            &self.config.lines,
        )?;
        tracing::debug!(
            stat = %stat,
            n_draws,
            mean = result.mean,
            std_dev = result.std_dev,
            "simulated"
        );
        Ok(result)
    }

    pub fn simulate_joint(
        &self,
        primary: StatKind,
        rate_params: RateParameters,
        minutes_spec: MinutesDistributionSpec,
        n_draws: usize,
        seed: Option<u64>,
        correlated_stats: &CorrelatedStats,
    ) -> EngineResult<JointSimulation> {
        validate_draws(n_draws)?;
        if correlated_stats.contains_key(&primary) {
            return Err(EngineError::DimensionMismatch(format!(
                "{primary} cannot be correlated with itself"
            )));
        }
        let mut stats = vec![(primary, rate_params)];
        stats.extend(correlated_stats.iter().map(|(s, (p, _))| (*s, *p)));
        let matrix = self.correlation_matrix(primary, correlated_stats)?;
        let marginals = stats
            .iter()
            .map(|(_, params)| MinutesMixture::new(params, &minutes_spec))
            .collect::<EngineResult<Vec<_>>>()?;

        let mut rng = self.rng(seed);
        let mut generator = CorrelatedNormalGenerator::new(&matrix);
        let dim = stats.len();
        let mut z = vec![0.0; dim];
        let mut mirrored: Option<Vec<f64>> = None;
        let mut columns: Vec<Vec<u32>> = vec![Vec::with_capacity(n_draws); dim];

        for _ in 0..n_draws {
            match mirrored.take() {
                Some(normals) => z.copy_from_slice(&normals),
                None => {
                    generator.fill(&mut rng, &mut z);
                    if self.config.antithetic {
                        mirrored = Some(z.iter().map(|x| -x).collect());
                    }
                }
            }
            to_uniforms(&mut z);
            for ((marginal, col), &v) in marginals.iter().zip(columns.iter_mut()).zip(z.iter()) {
                col.push(marginal.quantile(v));
            }
        }

        let mut results = BTreeMap::new();
        for ((stat, _), draws) in stats.iter().zip(columns) {
            let r = SimulationResult::from_draws(
                *stat,
                draws,
                &self.config.percentiles,
                &self.config.lines,
            )?;
            results.insert(*stat, r);
        }
        tracing::debug!(
            primary = %primary,
            stats = dim,
            n_draws,
            "simulated joint"
        );
        Ok(JointSimulation {
            primary,
            results,
            percentiles: self.config.percentiles.clone(),
            lines: self.config.lines.clone(),
        })
    }

    /// Primary row from the requested coefficients; other pairs from the
    /// configured table, else the product of their primary correlations.
    pub fn correlation_matrix(
        &self,
        primary: StatKind,
        correlated_stats: &CorrelatedStats,
    ) -> EngineResult<CorrelationMatrix> {
        let mut rhos = vec![(primary, 1.0)];
        rhos.extend(correlated_stats.iter().map(|(s, (_, rho))| (*s, *rho)));
        let dim = rhos.len();
        let mut entries = vec![0.0; dim * dim];
        for (i, &(si, ri)) in rhos.iter().enumerate() {
            for (j, &(sj, rj)) in rhos.iter().enumerate() {
                entries[i * dim + j] = if i == j {
                    1.0
                } else if i == 0 {
                    rj
                } else if j == 0 {
                    ri
                } else {
                    self.correlation.pair(si, sj).unwrap_or(ri * rj)
                };
            }
        }
        CorrelationMatrix::new(dim, &entries)
    }

    fn rng(&self, seed: Option<u64>) -> StdRng {
        match seed.or(self.config.seed) {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        }
    }
}

fn validate_draws(n_draws: usize) -> EngineResult<()> {
    if n_draws < 1 {
        return Err(EngineError::InvalidParameter(
            "n_draws must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Minutes uniforms, optionally in antithetic pairs.
struct MinutesStream {
    antithetic: bool,
    mirrored: Option<f64>,
}

impl MinutesStream {
    fn new(antithetic: bool) -> Self {
        Self {
            antithetic,
            mirrored: None,
        }
    }

    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        if let Some(u) = self.mirrored.take() {
            return u;
        }
        let u: f64 = rng.gen();
        if self.antithetic {
            self.mirrored = Some(1.0 - u);
        }
        u
    }
}
