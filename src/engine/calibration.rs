//! Scoring primitives for graded predictions: `(predicted probability, hit)`.

use serde::Serialize;

use crate::error::{EngineError, EngineResult};

const LOG_LOSS_EPS: f64 = 1e-15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub p_mean: f64,
    pub hit_rate: f64,
    /// `hit_rate - p_mean`; positive means the model was too pessimistic.
    pub gap: f64,
}

fn validate(pairs: &[(f64, bool)]) -> EngineResult<()> {
    match pairs.iter().find(|(p, _)| !(0.0..=1.0).contains(p)) {
        Some((p, _)) => Err(EngineError::InvalidParameter(format!(
            "predicted probability must be in [0, 1], got {p}"
        ))),
        None => Ok(()),
    }
}

/// Equal-count bins over the predicted probabilities. Bin edges that
/// coincide collapse, so fewer than `n_bins` bins may come back.
pub fn bin_calibration(pairs: &[(f64, bool)], n_bins: usize) -> EngineResult<Vec<CalibrationBin>> {
    if n_bins == 0 {
        return Err(EngineError::InvalidParameter("n_bins must be at least 1".into()));
    }
    validate(pairs)?;
    if pairs.is_empty() {
        return Ok(Vec::new());
    }

    let mut preds: Vec<f64> = pairs.iter().map(|(p, _)| *p).collect();
    preds.sort_by(|a, b| a.total_cmp(b));
    let mut edges: Vec<f64> = (0..=n_bins)
        .map(|k| quantile_sorted(&preds, k as f64 / n_bins as f64))
        .collect();
    edges.dedup();
    let n_out = edges.len().saturating_sub(1).max(1);
    let interior = if edges.len() > 2 { &edges[1..edges.len() - 1] } else { &[][..] };

    // (count, sum p, hits)
    let mut acc = vec![(0usize, 0.0f64, 0usize); n_out];
    for &(p, hit) in pairs {
        let idx = interior.partition_point(|&e| e < p);
        let slot = &mut acc[idx];
        slot.0 += 1;
        slot.1 += p;
        slot.2 += hit as usize;
    }

    let last = edges.len() - 1;
    Ok(acc
        .into_iter()
        .enumerate()
        .filter(|(_, (count, _, _))| *count > 0)
        .map(|(i, (count, sum_p, hits))| {
            let p_mean = sum_p / count as f64;
            let hit_rate = hits as f64 / count as f64;
            CalibrationBin {
                lower: edges[i.min(last)],
                upper: edges[(i + 1).min(last)],
                count,
                p_mean,
                hit_rate,
                gap: hit_rate - p_mean,
            }
        })
        .collect())
}

pub fn brier_score(pairs: &[(f64, bool)]) -> EngineResult<f64> {
    validate(pairs)?;
    if pairs.is_empty() {
        return Err(EngineError::InsufficientData("no graded predictions".into()));
    }
    let total: f64 = pairs
        .iter()
        .map(|&(p, hit)| (p - if hit { 1.0 } else { 0.0 }).powi(2))
        .sum();
    Ok(total / pairs.len() as f64)
}

/// Mean negative log-likelihood, probabilities clipped away from 0 and 1.
pub fn log_loss(pairs: &[(f64, bool)]) -> EngineResult<f64> {
    validate(pairs)?;
    if pairs.is_empty() {
        return Err(EngineError::InsufficientData("no graded predictions".into()));
    }
    let total: f64 = pairs
        .iter()
        .map(|&(p, hit)| {
            let p = p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
            if hit {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    Ok(total / pairs.len() as f64)
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
