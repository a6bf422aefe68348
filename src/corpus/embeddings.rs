// Embedding matrix — the N×D snapshot every pass reads from.
//
// Rows are stored contiguously (row-major) so distance computations in the
// silhouette loops walk memory linearly. Ellipsoid fitting gathers the rows it
// needs into an nalgebra matrix.

use anyhow::Result;
use nalgebra::DMatrix;

/// Dense row-major embedding matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingMatrix {
    rows: usize,
    dim: usize,
    data: Vec<f64>,
}

impl EmbeddingMatrix {
    /// Build from rows of equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * dim);

        for (i, row) in rows.iter().enumerate() {
            if row.len() != dim {
                anyhow::bail!(
                    "Embedding row {i} has {} dimensions, expected {dim}",
                    row.len()
                );
            }
            data.extend_from_slice(row);
        }

        Ok(Self {
            rows: rows.len(),
            dim,
            data,
        })
    }

    /// Build from single-precision rows (the on-disk format), widening to f64.
    pub fn from_f32_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let widened: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| r.iter().map(|&v| v as f64).collect())
            .collect();
        Self::from_rows(&widened)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Append a row, returning its index. An empty matrix adopts the row's
    /// dimensionality.
    pub fn push_row(&mut self, row: &[f64]) -> Result<usize> {
        if self.rows == 0 && self.dim == 0 {
            self.dim = row.len();
        }
        if row.len() != self.dim {
            anyhow::bail!(
                "Cannot append a {}-dimensional row to a {}-dimensional matrix",
                row.len(),
                self.dim
            );
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(self.rows - 1)
    }

    /// Euclidean distance between rows `i` and `j`.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.row(i)
            .iter()
            .zip(self.row(j))
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    /// Copy the given rows into a `indices.len() × dim` matrix.
    pub fn gather(&self, indices: &[usize]) -> DMatrix<f64> {
        DMatrix::from_fn(indices.len(), self.dim, |r, c| self.row(indices[r])[c])
    }
}

/// Compute the unit-length mean of several embedding vectors.
///
/// This is how a user gets a position in the embedding space: the average of
/// everything they wrote, rescaled to unit norm so long-winded and terse users
/// sit on the same sphere as individual texts. Returns `None` for an empty
/// input, mismatched dimensions, or a zero mean.
pub fn normalized_mean(vectors: &[&[f64]]) -> Option<Vec<f64>> {
    let dim = vectors.first()?.len();
    if vectors.iter().any(|v| v.len() != dim) {
        return None;
    }

    let n = vectors.len() as f64;
    let mut mean = vec![0.0_f64; dim];
    for v in vectors {
        for (m, &x) in mean.iter_mut().zip(v.iter()) {
            *m += x;
        }
    }
    for m in &mut mean {
        *m /= n;
    }

    let norm = mean.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm < f64::EPSILON {
        return None;
    }
    for m in &mut mean {
        *m /= norm;
    }
    Some(mean)
}
