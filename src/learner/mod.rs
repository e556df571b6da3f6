//! Pluggable regression learners
//!
//! Orchestration code only sees the [`Learner`] capability: build a fresh
//! instance for a candidate slot, fit it on a dataset, predict, and move its
//! state through an opaque byte stream.
//!
//! - **mlp**: feed-forward network trained with Adam or SGD
//! - **optim**: parameter update rules used by the network

mod mlp;
mod optim;

pub use mlp::Mlp;
pub use optim::{Adam, ParamOptimizer, Sgd};

use crate::config::Config;
use crate::data::Dataset;
use crate::error::{Coord, Result};
use ndarray::Array2;
use std::io::{Read, Write};

/// Everything a learner needs to know about the slot it is built for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerSpec {
    pub coord: Coord,
    pub input_dim: usize,
    pub output_dim: usize,
    pub seed: u64,
}

impl LearnerSpec {
    /// Spec for `coord`, with a seed derived from the config seed and the coordinate
    pub fn for_slot(coord: Coord, dataset: &Dataset, config: &Config) -> Self {
        let mix = (coord.pool as u64)
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add((coord.candidate as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9));
        Self {
            coord,
            input_dim: dataset.n_inputs(),
            output_dim: dataset.n_targets(),
            seed: config.seed ^ mix,
        }
    }
}

/// Outcome of a single fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSummary {
    pub epochs_run: usize,
    /// Mean squared error on the learn subset after the last epoch
    pub learn_loss: f32,
    /// Best mean squared error on the valid subset, when one was tracked
    pub best_valid_loss: Option<f32>,
}

/// Trainable regression model
///
/// Implementations must be `Send` so the dispatcher can train them on worker
/// threads; each instance is owned by exactly one job.
pub trait Learner: Send + Sized {
    /// Fresh, untrained instance for a candidate slot
    fn build(spec: &LearnerSpec, config: &Config) -> Result<Self>;

    /// Train on the learn subset; the valid subset may drive early stopping
    fn fit(&mut self, dataset: &Dataset, config: &Config) -> Result<FitSummary>;

    /// Predict `rows x targets` for `rows x inputs`
    fn predict(&self, inputs: &Array2<f32>) -> Result<Array2<f32>>;

    /// Write the learner's state
    fn save(&self, writer: &mut dyn Write) -> Result<()>;

    /// Restore a learner from state written by [`Learner::save`]
    fn load(reader: &mut dyn Read) -> Result<Self>;
}
