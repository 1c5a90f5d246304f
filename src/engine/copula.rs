//! Gaussian copula in two stages: a correlated standard-normal generator and
//! a per-coordinate uniform transform feeding each stat's own inverse CDF.

use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use super::normal::normal_cdf;
use crate::error::{EngineError, EngineResult};

const SYMMETRY_TOLERANCE: f64 = 1e-9;
const EIGEN_TOLERANCE: f64 = 1e-10;

/// Validated correlation matrix: symmetric, unit diagonal, entries in [-1, 1],
/// positive semi-definite.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    matrix: DMatrix<f64>,
}

impl CorrelationMatrix {
    /// Build from row-major entries of a `dim × dim` matrix.
    pub fn new(dim: usize, entries: &[f64]) -> EngineResult<Self> {
        if dim == 0 {
            return Err(EngineError::DimensionMismatch(
                "correlation matrix must have at least one row".into(),
            ));
        }
        if entries.len() != dim * dim {
            return Err(EngineError::DimensionMismatch(format!(
                "expected {} entries for a {dim}x{dim} matrix, got {}",
                dim * dim,
                entries.len()
            )));
        }
        let matrix = DMatrix::from_row_slice(dim, dim, entries);
        for i in 0..dim {
            if (matrix[(i, i)] - 1.0).abs() > SYMMETRY_TOLERANCE {
                return Err(EngineError::DimensionMismatch(format!(
                    "diagonal entry {i} must be 1, got {}",
                    matrix[(i, i)]
                )));
            }
            for j in 0..dim {
                let v = matrix[(i, j)];
                if !(v.is_finite() && (-1.0..=1.0).contains(&v)) {
                    return Err(EngineError::DimensionMismatch(format!(
                        "correlation ({i}, {j}) must be in [-1, 1], got {v}"
                    )));
                }
                if (v - matrix[(j, i)]).abs() > SYMMETRY_TOLERANCE {
                    return Err(EngineError::DimensionMismatch(format!(
                        "correlation matrix is not symmetric at ({i}, {j})"
                    )));
                }
            }
        }
        let min_eigen = matrix
            .clone()
            .symmetric_eigen()
            .eigenvalues
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        if min_eigen < -EIGEN_TOLERANCE {
            return Err(EngineError::DimensionMismatch(format!(
                "correlation matrix is not positive semi-definite (min eigenvalue {min_eigen:.6})"
            )));
        }
        Ok(Self { matrix })
    }

    pub fn identity(dim: usize) -> Self {
        Self {
            matrix: DMatrix::identity(dim, dim),
        }
    }

    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix[(i, j)]
    }

    /// `A` with `A·Aᵀ = C`. Cholesky when `C` is positive definite, otherwise
    /// the symmetric square root from the eigendecomposition.
    fn factor(&self) -> DMatrix<f64> {
        if let Some(chol) = self.matrix.clone().cholesky() {
            return chol.l();
        }
        let eigen = self.matrix.clone().symmetric_eigen();
        let sqrt_vals = eigen.eigenvalues.map(|v| v.max(0.0).sqrt());
        &eigen.eigenvectors * DMatrix::from_diagonal(&sqrt_vals)
    }
}

/// Draws standard-normal vectors with a target correlation.
#[derive(Debug, Clone)]
pub struct CorrelatedNormalGenerator {
    factor: DMatrix<f64>,
    scratch: Vec<f64>,
}

impl CorrelatedNormalGenerator {
    pub fn new(correlation: &CorrelationMatrix) -> Self {
        Self {
            factor: correlation.factor(),
            scratch: vec![0.0; correlation.dim()],
        }
    }

    pub fn dim(&self) -> usize {
        self.scratch.len()
    }

    /// Fill `out` with one correlated draw.
    pub fn fill<R: Rng + ?Sized>(&mut self, rng: &mut R, out: &mut [f64]) {
        let n = self.scratch.len();
        for z in self.scratch.iter_mut() {
            *z = StandardNormal.sample(rng);
        }
        for (i, slot) in out.iter_mut().enumerate().take(n) {
            *slot = (0..n).map(|j| self.factor[(i, j)] * self.scratch[j]).sum();
        }
    }
}

/// Map a correlated normal vector to uniforms in place.
pub fn to_uniforms(normals: &mut [f64]) {
    for x in normals.iter_mut() {
        *x = normal_cdf(*x);
    }
}
