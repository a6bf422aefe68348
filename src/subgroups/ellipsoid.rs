// Gaussian ellipsoid membership model for one subgroup.
//
// The covariance of the member points is estimated with Ledoit-Wolf
// shrinkage toward a scaled identity, then inverted with an SVD
// pseudo-inverse. Subgroups often have fewer members than the embedding has
// dimensions, so the raw sample covariance is singular; shrinkage keeps it
// well conditioned and the pseudo-inverse absorbs whatever singularity is
// left. The cutoff is an upper quantile of the members' own squared
// Mahalanobis distances.

use anyhow::Result;
use nalgebra::{DMatrix, DVector};

/// Fraction of training points an ellipsoid is fit to contain.
pub const DEFAULT_QUANTILE: f64 = 0.95;

/// Centroid, inverse covariance and distance cutoff of a subgroup.
#[derive(Debug, Clone)]
pub struct Ellipsoid {
    centroid: DVector<f64>,
    inverse_covariance: DMatrix<f64>,
    cutoff: f64,
    shrinkage: f64,
}

impl Ellipsoid {
    /// Fit an ellipsoid to `points` (one member per row).
    ///
    /// `quantile` picks the cutoff: at least that fraction of the rows of
    /// `points` will satisfy `squared_mahalanobis(row) <= cutoff`.
    pub fn fit(points: &DMatrix<f64>, quantile: f64) -> Result<Self> {
        let n = points.nrows();
        let dim = points.ncols();
        if n == 0 {
            anyhow::bail!("Cannot fit an ellipsoid to an empty set of points");
        }
        if !(quantile > 0.0 && quantile <= 1.0) {
            anyhow::bail!("Ellipsoid quantile must be in (0, 1], got {quantile}");
        }

        let centroid = DVector::from_fn(dim, |c, _| points.column(c).sum() / n as f64);
        let centered = DMatrix::from_fn(n, dim, |r, c| points[(r, c)] - centroid[c]);

        let (covariance, shrinkage) = ledoit_wolf(&centered);
        let inverse_covariance = pseudo_inverse(covariance)?;

        let distances: Vec<f64> = (0..n)
            .map(|r| quadratic_form(&inverse_covariance, &centered.row(r).transpose()))
            .collect();
        let cutoff = upper_quantile(&distances, quantile).unwrap_or(0.0);

        Ok(Self {
            centroid,
            inverse_covariance,
            cutoff,
            shrinkage,
        })
    }

    /// `(p - c)ᵀ Σ⁺ (p - c)` for a point `p` of the same dimensionality.
    pub fn squared_mahalanobis(&self, point: &[f64]) -> f64 {
        let diff = DVector::from_fn(self.centroid.len(), |i, _| point[i] - self.centroid[i]);
        quadratic_form(&self.inverse_covariance, &diff)
    }

    pub fn contains(&self, point: &[f64]) -> bool {
        self.squared_mahalanobis(point) <= self.cutoff
    }

    pub fn centroid(&self) -> &DVector<f64> {
        &self.centroid
    }

    pub fn inverse_covariance(&self) -> &DMatrix<f64> {
        &self.inverse_covariance
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Ledoit-Wolf shrinkage coefficient used for the covariance, in [0, 1].
    pub fn shrinkage(&self) -> f64 {
        self.shrinkage
    }

    pub fn dim(&self) -> usize {
        self.centroid.len()
    }
}

fn quadratic_form(matrix: &DMatrix<f64>, v: &DVector<f64>) -> f64 {
    v.dot(&(matrix * v))
}

/// Ledoit-Wolf shrunk covariance of already-centered rows.
///
/// Returns `(1 - s)·S + s·mu·I` with `S = XᵀX / n`, `mu = trace(S) / p`, and
/// the shrinkage coefficient `s` (Ledoit & Wolf 2004). `s` is 0 for a
/// one-dimensional space or when `S` is already a multiple of the identity.
pub fn ledoit_wolf(centered: &DMatrix<f64>) -> (DMatrix<f64>, f64) {
    let n = centered.nrows() as f64;
    let p = centered.ncols();
    let pf = p as f64;

    let gram = centered.transpose() * centered;
    let empirical = &gram / n;
    let trace = empirical.trace();
    let mu = trace / pf;

    let shrinkage = if p <= 1 {
        0.0
    } else {
        let squared = centered.map(|v| v * v);
        let beta_sum = (squared.transpose() * &squared).sum();
        let delta_sum = gram.map(|v| v * v).sum() / (n * n);

        let beta = (beta_sum / n - delta_sum) / (pf * n);
        let delta = (delta_sum - 2.0 * mu * trace + pf * mu * mu) / pf;

        if delta > 0.0 {
            (beta.min(delta) / delta).clamp(0.0, 1.0)
        } else {
            0.0
        }
    };

    let mut shrunk = empirical * (1.0 - shrinkage);
    for i in 0..p {
        shrunk[(i, i)] += shrinkage * mu;
    }
    (shrunk, shrinkage)
}

/// Moore-Penrose pseudo-inverse via SVD.
///
/// Singular values at or below `max(σ)·dim·ε` are treated as zero.
pub fn pseudo_inverse(matrix: DMatrix<f64>) -> Result<DMatrix<f64>> {
    let dim = matrix.nrows().max(matrix.ncols());
    let svd = matrix.svd(true, true);
    let largest = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    let tolerance = largest * dim as f64 * f64::EPSILON;
    svd.pseudo_inverse(tolerance)
        .map_err(|e| anyhow::anyhow!("Pseudo-inverse failed: {e}"))
}

/// Nearest-rank upper quantile: the `ceil(q·n)`-th smallest value.
///
/// At least `q·n` of the values are `<=` the result. `None` when `values`
/// is empty.
pub fn upper_quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    let rank = ((q * n as f64).ceil() as usize).clamp(1, n);
    Some(sorted[rank - 1])
}
