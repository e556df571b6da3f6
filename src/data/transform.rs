//! Input preprocessing fitted on the learn subset
//!
//! Min-max scaling and principal component projection are both fitted on
//! learn rows only and then applied unchanged to valid, test and any frame
//! presented for inference later.

use crate::error::{Error, Result};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Fraction of variance kept when no component cap is configured
pub const DEFAULT_VARIANCE_KEPT: f64 = 0.99;

/// Eigenvalues below this share of the total variance are treated as zero
const EIGEN_TOLERANCE: f64 = 1e-12;

/// Per-column min-max scaling to `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: Vec<f32>,
    pub max: Vec<f32>,
}

impl MinMaxScaler {
    pub fn fit(inputs: &Array2<f32>) -> Self {
        let min = inputs
            .axis_iter(Axis(1))
            .map(|col| col.iter().copied().fold(f32::INFINITY, f32::min))
            .collect();
        let max = inputs
            .axis_iter(Axis(1))
            .map(|col| col.iter().copied().fold(f32::NEG_INFINITY, f32::max))
            .collect();
        Self { min, max }
    }

    pub fn apply(&self, inputs: &Array2<f32>) -> Array2<f32> {
        let mut out = inputs.clone();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let range = self.max[j] - self.min[j];
            if range > f32::EPSILON {
                col.mapv_inplace(|v| (v - self.min[j]) / range);
            } else {
                col.fill(0.0);
            }
        }
        out
    }
}

/// Principal component projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    pub mean: Vec<f32>,
    /// One row per component, each of input width
    pub components: Vec<Vec<f32>>,
    /// Variance captured by each component
    pub explained_variance: Vec<f64>,
}

impl Pca {
    /// Fit components on `inputs`, capped at `max_components` or at the
    /// number needed to keep [`DEFAULT_VARIANCE_KEPT`] of the variance
    pub fn fit(inputs: &Array2<f32>, max_components: Option<usize>) -> Result<Self> {
        let (rows, dims) = inputs.dim();
        if rows == 0 || dims == 0 {
            return Err(Error::Data("cannot fit PCA on an empty learn set".to_string()));
        }

        let data = inputs.mapv(f64::from);
        let mean: Array1<f64> = data
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Data("cannot fit PCA on an empty learn set".to_string()))?;
        let centered = &data - &mean;
        let denom = if rows > 1 { (rows - 1) as f64 } else { 1.0 };
        let cov = centered.t().dot(&centered) / denom;

        let eigen = SymmetricEigen::new(DMatrix::from_fn(dims, dims, |i, j| cov[[i, j]]));
        // nalgebra leaves eigenvalues unordered
        let mut order: Vec<usize> = (0..dims).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .total_cmp(&eigen.eigenvalues[a])
                .then(a.cmp(&b))
        });

        let total_variance: f64 = eigen.eigenvalues.iter().filter(|&&v| v > 0.0).sum();
        let floor = EIGEN_TOLERANCE * total_variance.max(1.0);
        let cap = max_components.unwrap_or(dims).min(dims);

        let mut components = Vec::new();
        let mut explained_variance = Vec::new();
        let mut kept = 0.0;
        for &idx in order.iter().take(cap) {
            let eigenvalue = eigen.eigenvalues[idx];
            if eigenvalue <= floor {
                break;
            }
            components.push(oriented(eigen.eigenvectors.column(idx).iter().copied()));
            explained_variance.push(eigenvalue);
            kept += eigenvalue;

            if max_components.is_none() && kept / total_variance >= DEFAULT_VARIANCE_KEPT {
                break;
            }
        }

        if components.is_empty() {
            // Constant inputs: keep a single zero-variance axis
            let mut axis = vec![0.0; dims];
            axis[0] = 1.0;
            components.push(axis);
            explained_variance.push(0.0);
        }

        Ok(Self {
            mean: mean.iter().map(|&m| m as f32).collect(),
            components,
            explained_variance,
        })
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    pub fn apply(&self, inputs: &Array2<f32>) -> Array2<f32> {
        let mean = Array1::from(self.mean.clone());
        let centered = inputs - &mean;
        let basis = Array2::from_shape_fn((self.mean.len(), self.components.len()), |(d, k)| {
            self.components[k][d]
        });
        centered.dot(&basis)
    }
}

/// Unit eigenvector with its largest-magnitude loading made positive
fn oriented(vector: impl Iterator<Item = f64>) -> Vec<f32> {
    let mut v: Vec<f64> = vector.collect();
    let pivot = v
        .iter()
        .copied()
        .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
    if pivot < 0.0 {
        v.iter_mut().for_each(|x| *x = -*x);
    }
    v.into_iter().map(|x| x as f32).collect()
}

/// Fitted preprocessing pipeline carried by a [`Dataset`](super::Dataset)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    /// Raw input width the pipeline was fitted on
    pub input_dim: usize,
    pub scaler: Option<MinMaxScaler>,
    pub pca: Option<Pca>,
}

impl Preprocessor {
    /// Fit on learn inputs
    pub fn fit(
        learn_inputs: &Array2<f32>,
        normalize: bool,
        transform: bool,
        max_components: Option<usize>,
    ) -> Result<Self> {
        let scaler = normalize.then(|| MinMaxScaler::fit(learn_inputs));
        let pca = if transform {
            let scaled = match &scaler {
                Some(s) => s.apply(learn_inputs),
                None => learn_inputs.clone(),
            };
            Some(Pca::fit(&scaled, max_components)?)
        } else {
            None
        };
        Ok(Self {
            input_dim: learn_inputs.ncols(),
            scaler,
            pca,
        })
    }

    /// Map raw inputs into the fitted feature space
    pub fn apply(&self, inputs: &Array2<f32>) -> Result<Array2<f32>> {
        if inputs.ncols() != self.input_dim {
            return Err(Error::Data(format!(
                "preprocessor fitted on {} inputs, got {}",
                self.input_dim,
                inputs.ncols()
            )));
        }
        let scaled = match &self.scaler {
            Some(s) => s.apply(inputs),
            None => inputs.clone(),
        };
        Ok(match &self.pca {
            Some(pca) => pca.apply(&scaled),
            None => scaled,
        })
    }

    /// Column names after preprocessing
    pub fn output_names(&self, raw_names: &[String]) -> Vec<String> {
        match &self.pca {
            Some(pca) => (0..pca.n_components()).map(|i| format!("PC{i}")).collect(),
            None => raw_names.to_vec(),
        }
    }
}
