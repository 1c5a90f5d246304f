//! Negative binomial posterior predictive of a game total.
//!
//! With `λ ~ Gamma(α, β)` per minute and `X | λ ~ Poisson(λ·m)`, the game
//! total is `NB(α, p = β / (β + m))`: shape unchanged, success probability
//! combining the Gamma rate and the minutes played.
//!
//! `MinutesMixture` integrates the minutes distribution out of that total,
//! giving the marginal a joint run transforms its copula uniforms through.

use rand::Rng;
use rand_distr::{Distribution, Gamma, Poisson};

use super::minutes::MinutesDistributionSpec;
use super::rate::RateParameters;
use crate::error::{EngineError, EngineResult};

/// Upper tail of a tabulated support in standard deviations beyond the mean.
const SUPPORT_TAIL_SDS: f64 = 40.0;
/// Hard cap on a tabulated support.
const MAX_SUPPORT: f64 = 10_000_000.0;
/// Largest uniform fed to a quantile, keeps the search clear of rounding at 1.
const MAX_UNIFORM: f64 = 1.0 - 1e-12;
/// Equal-weight minutes nodes (midpoint quantiles) of the mixture.
pub const MIXTURE_NODES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NegativeBinomial {
    shape: f64,
    p: f64,
    q: f64,
}

impl NegativeBinomial {
    pub fn new(shape: f64, p: f64) -> EngineResult<Self> {
        if !(shape.is_finite() && shape > 0.0) {
            return Err(EngineError::InvalidParameter(format!(
                "negative binomial shape must be positive, got {shape}"
            )));
        }
        if !(p > 0.0 && p <= 1.0) {
            return Err(EngineError::InvalidParameter(format!(
                "negative binomial p must be in (0, 1], got {p}"
            )));
        }
        Ok(Self {
            shape,
            p,
            q: 1.0 - p,
        })
    }

    /// Posterior predictive over `minutes`. Zero minutes is the point mass at 0.
    pub fn from_rate(params: &RateParameters, minutes: f64) -> EngineResult<Self> {
        if !(minutes.is_finite() && minutes >= 0.0) {
            return Err(EngineError::InvalidParameter(format!(
                "minutes must be non-negative, got {minutes}"
            )));
        }
        let denom = params.rate() + minutes;
        Ok(Self {
            shape: params.shape(),
            p: params.rate() / denom,
            q: minutes / denom,
        })
    }

    pub fn shape(&self) -> f64 {
        self.shape
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn mean(&self) -> f64 {
        self.shape * self.q / self.p
    }

    pub fn variance(&self) -> f64 {
        self.shape * self.q / (self.p * self.p)
    }

    /// Exact draw as a Gamma-mixed Poisson: `Λ ~ Gamma(α, scale = q/p)`, `X ~ Poisson(Λ)`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        if self.q == 0.0 {
            return 0;
        }
        let lambda = match Gamma::new(self.shape, self.q / self.p) {
            Ok(g) => g.sample(rng),
            Err(_) => return 0,
        };
        if !(lambda > 0.0) {
            return 0;
        }
        match Poisson::new(lambda) {
            Ok(poisson) => {
                let x: f64 = poisson.sample(rng);
                x.min(u32::MAX as f64) as u32
            }
            Err(_) => 0,
        }
    }

    /// `P(X <= k)`.
    pub fn cdf(&self, k: u32) -> f64 {
        if self.q == 0.0 {
            return 1.0;
        }
        self.pmf().take(k as usize + 1).sum::<f64>().min(1.0)
    }

    /// `P(X = 0), P(X = 1), ...` by the ratio recurrence in log space, so
    /// large shapes do not underflow the first terms.
    fn pmf(&self) -> impl Iterator<Item = f64> {
        let shape = self.shape;
        let ln_q = self.q.ln();
        (0u32..).scan(shape * self.p.ln(), move |log_pmf, k| {
            let current = log_pmf.exp();
            *log_pmf += ((k as f64 + shape) / (k as f64 + 1.0)).ln() + ln_q;
            Some(current)
        })
    }

    fn support_cap(&self) -> f64 {
        self.mean() + SUPPORT_TAIL_SDS * self.variance().sqrt() + 100.0
    }
}

/// Game total with minutes integrated out, tabulated as a CDF.
///
/// The minutes integral uses `MIXTURE_NODES` equal-weight midpoint quantiles
/// of the truncated minutes distribution; fixed minutes collapse it to the
/// exact negative binomial.
#[derive(Debug, Clone, PartialEq)]
pub struct MinutesMixture {
    cdf: Vec<f64>,
}

impl MinutesMixture {
    pub fn new(params: &RateParameters, minutes: &MinutesDistributionSpec) -> EngineResult<Self> {
        let nodes = (0..MIXTURE_NODES)
            .map(|j| {
                let u = (j as f64 + 0.5) / MIXTURE_NODES as f64;
                NegativeBinomial::from_rate(params, minutes.quantile(u))
            })
            .collect::<EngineResult<Vec<_>>>()?;
        let cap = nodes
            .iter()
            .map(NegativeBinomial::support_cap)
            .fold(0.0, f64::max)
            .min(MAX_SUPPORT) as usize;

        let weight = 1.0 / nodes.len() as f64;
        let mut streams: Vec<_> = nodes.iter().map(NegativeBinomial::pmf).collect();
        let mut cdf = Vec::new();
        let mut total = 0.0;
        while cdf.len() <= cap {
            let mass: f64 = streams.iter_mut().filter_map(Iterator::next).sum();
            total += mass * weight;
            cdf.push(total.min(1.0));
            if total >= MAX_UNIFORM {
                break;
            }
        }
        Ok(Self { cdf })
    }

    /// Smallest `k` with `P(X <= k) >= u`.
    pub fn quantile(&self, u: f64) -> u32 {
        let u = u.clamp(0.0, MAX_UNIFORM);
        let k = self.cdf.partition_point(|&c| c < u);
        k.min(self.cdf.len() - 1) as u32
    }

    /// `P(X <= k)`.
    pub fn cdf(&self, k: u32) -> f64 {
        self.cdf
            .get(k as usize)
            .copied()
            .unwrap_or_else(|| self.cdf.last().copied().unwrap_or(1.0))
    }

    pub fn mean(&self) -> f64 {
        let mut prev = 0.0;
        self.cdf
            .iter()
            .enumerate()
            .map(|(k, &c)| {
                let mass = c - prev;
                prev = c;
                k as f64 * mass
            })
            .sum()
    }
}
