//! Feed-forward regression network

use super::optim::{build_optimizer, ParamOptimizer};
use super::{FitSummary, Learner, LearnerSpec};
use crate::config::{Activation, Config};
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::io::{load_state, save_state, ModelFormat, ModelMetadata, ModelState, SaveConfig};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::io::{Read, Write};

const ARCHITECTURE: &str = "mlp";

#[derive(Debug, Clone, PartialEq)]
struct Dense {
    /// `inputs x outputs`
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl Dense {
    /// Xavier-uniform weights, zero bias
    fn init(inputs: usize, outputs: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f32).sqrt();
        Self {
            weights: Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-limit..limit)),
            bias: Array1::zeros(outputs),
        }
    }
}

/// Multilayer perceptron with a linear output layer and MSE loss
///
/// With no hidden layers it reduces to linear regression.
#[derive(Debug, Clone)]
pub struct Mlp {
    name: String,
    activation: Activation,
    seed: u64,
    layers: Vec<Dense>,
    format: ModelFormat,
}

impl Mlp {
    pub fn new(
        input_dim: usize,
        hidden: &[usize],
        output_dim: usize,
        activation: Activation,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let widths: Vec<usize> = std::iter::once(input_dim)
            .chain(hidden.iter().copied())
            .chain(std::iter::once(output_dim))
            .collect();
        let layers = widths
            .windows(2)
            .map(|w| Dense::init(w[0], w[1], &mut rng))
            .collect();
        Self {
            name: ARCHITECTURE.to_string(),
            activation,
            seed,
            layers,
            format: ModelFormat::Json,
        }
    }

    /// Encoding used by [`Learner::save`]
    pub fn with_format(mut self, format: ModelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Widths from input to output
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.layers.iter().map(|l| l.weights.nrows()).collect();
        sizes.extend(self.layers.last().map(|l| l.weights.ncols()));
        sizes
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map(|l| l.weights.nrows()).unwrap_or(0)
    }

    fn activate(&self, z: &Array2<f32>) -> Array2<f32> {
        match self.activation {
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(sigmoid),
            Activation::Tanh => z.mapv(f32::tanh),
        }
    }

    fn derivative(&self, z: &Array2<f32>) -> Array2<f32> {
        match self.activation {
            Activation::Relu => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => z.mapv(|v| {
                let s = sigmoid(v);
                s * (1.0 - s)
            }),
            Activation::Tanh => z.mapv(|v| 1.0 - v.tanh().powi(2)),
        }
    }

    /// Pre-activations per layer and activations (input first)
    fn forward_all(&self, x: &Array2<f32>) -> (Vec<Array2<f32>>, Vec<Array2<f32>>) {
        let mut pre = Vec::with_capacity(self.layers.len());
        let mut acts = vec![x.clone()];
        let last = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            let z = acts[i].dot(&layer.weights) + &layer.bias;
            let a = if i == last { z.clone() } else { self.activate(&z) };
            pre.push(z);
            acts.push(a);
        }
        (pre, acts)
    }

    fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let (_, mut acts) = self.forward_all(x);
        acts.pop().unwrap_or_else(|| x.clone())
    }

    fn train_batch(&mut self, x: &Array2<f32>, y: &Array2<f32>, opt: &mut dyn ParamOptimizer) {
        let (pre, acts) = self.forward_all(x);
        let n_layers = self.layers.len();
        let out = &acts[n_layers];

        let scale = 2.0 / out.len().max(1) as f32;
        let mut delta = (out - y) * scale;
        let mut grads = Vec::with_capacity(n_layers);

        for l in (0..n_layers).rev() {
            let gw = acts[l].t().dot(&delta);
            let gb = delta.sum_axis(Axis(0));
            if l > 0 {
                let upstream = delta.dot(&self.layers[l].weights.t());
                delta = upstream * self.derivative(&pre[l - 1]);
            }
            grads.push((l, gw, gb));
        }

        opt.begin_step();
        for (l, gw, gb) in grads {
            let layer = &mut self.layers[l];
            opt.update(2 * l, layer.weights.view_mut().into_dyn(), gw.view().into_dyn());
            opt.update(2 * l + 1, layer.bias.view_mut().into_dyn(), gb.view().into_dyn());
        }
    }

    fn check_width(&self, inputs: &Array2<f32>) -> Result<()> {
        if inputs.ncols() != self.input_dim() {
            return Err(Error::Data(format!(
                "learner expects {} inputs, got {}",
                self.input_dim(),
                inputs.ncols()
            )));
        }
        Ok(())
    }

    pub fn to_state(&self) -> ModelState {
        let metadata = ModelMetadata::new(self.name.clone(), ARCHITECTURE)
            .with_custom(
                "activation",
                serde_json::to_value(self.activation).unwrap_or_default(),
            )
            .with_custom("seed", serde_json::json!(self.seed))
            .with_custom("layer_sizes", serde_json::json!(self.layer_sizes()));
        let mut state = ModelState::new(metadata);
        for (i, layer) in self.layers.iter().enumerate() {
            let weights: Vec<f32> = layer.weights.iter().copied().collect();
            let bias: Vec<f32> = layer.bias.iter().copied().collect();
            state.push(
                format!("layer{i}.weight"),
                vec![layer.weights.nrows(), layer.weights.ncols()],
                &weights,
            );
            state.push(format!("layer{i}.bias"), vec![layer.bias.len()], &bias);
        }
        state
    }

    pub fn from_state(state: &ModelState) -> Result<Self> {
        let bad = |msg: &str| Error::Serialization(format!("invalid mlp state: {msg}"));

        if state.metadata.architecture != ARCHITECTURE {
            return Err(bad(&format!(
                "architecture '{}'",
                state.metadata.architecture
            )));
        }
        let activation: Activation = state
            .metadata
            .custom
            .get("activation")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| bad(&e.to_string()))?
            .unwrap_or(Activation::Relu);
        let seed = state
            .metadata
            .custom
            .get("seed")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let parts = state.split().ok_or_else(|| bad("parameter layout"))?;
        if parts.is_empty() || parts.len() % 2 != 0 {
            return Err(bad("expected weight/bias pairs"));
        }

        let mut layers: Vec<Dense> = Vec::with_capacity(parts.len() / 2);
        for pair in parts.chunks(2) {
            let (w_info, w) = pair[0];
            let (b_info, b) = pair[1];
            let (rows, cols) = match w_info.shape.as_slice() {
                [r, c] => (*r, *c),
                _ => return Err(bad(&format!("{} is not a matrix", w_info.name))),
            };
            if b_info.shape != [cols] {
                return Err(bad(&format!("{} does not match {}", b_info.name, w_info.name)));
            }
            if let Some(prev) = layers.last() {
                if prev.weights.ncols() != rows {
                    return Err(bad(&format!("{} breaks the layer chain", w_info.name)));
                }
            }
            let weights = Array2::from_shape_vec((rows, cols), w.to_vec())
                .map_err(|e| bad(&e.to_string()))?;
            layers.push(Dense {
                weights,
                bias: Array1::from(b.to_vec()),
            });
        }

        Ok(Self {
            name: state.metadata.name.clone(),
            activation,
            seed,
            layers,
            format: ModelFormat::Json,
        })
    }
}

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Mean squared error over every cell
pub(crate) fn mean_squared_error(predictions: &Array2<f32>, targets: &Array2<f32>) -> f32 {
    let diff = predictions - targets;
    diff.mapv(|d| d * d).mean().unwrap_or(0.0)
}

impl Learner for Mlp {
    fn build(spec: &LearnerSpec, config: &Config) -> Result<Self> {
        if spec.input_dim == 0 || spec.output_dim == 0 {
            return Err(Error::InvalidParameter(format!(
                "mlp for {} needs at least one input and one output",
                spec.coord
            )));
        }
        Ok(Mlp::new(
            spec.input_dim,
            &config.hidden_layers,
            spec.output_dim,
            config.activation,
            spec.seed,
        )
        .with_name(spec.coord.to_string()))
    }

    fn fit(&mut self, dataset: &Dataset, config: &Config) -> Result<FitSummary> {
        let learn = &dataset.learn;
        if learn.is_empty() {
            return Err(Error::Data("learn subset is empty".to_string()));
        }
        self.check_width(&learn.inputs)?;

        let mut opt = build_optimizer(config.optimizer, config.learning_rate);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..learn.len()).collect();
        let batch_size = config.batch_size.max(1);

        let valid = &dataset.valid;
        let patience = config.patience.filter(|_| !valid.is_empty());
        let mut best: Option<(f32, Vec<Dense>)> = None;
        let mut since_best = 0;
        let mut epochs_run = 0;

        for epoch in 0..config.epochs {
            order.shuffle(&mut rng);
            for chunk in order.chunks(batch_size) {
                let xb = learn.inputs.select(Axis(0), chunk);
                let yb = learn.targets.select(Axis(0), chunk);
                self.train_batch(&xb, &yb, opt.as_mut());
            }
            epochs_run = epoch + 1;

            if let Some(patience) = patience {
                let valid_loss = mean_squared_error(&self.forward(&valid.inputs), &valid.targets);
                if !valid_loss.is_finite() {
                    return Err(Error::Data(format!(
                        "{} diverged at epoch {epoch}",
                        self.name
                    )));
                }
                let improved = best.as_ref().map_or(true, |(loss, _)| valid_loss < *loss);
                if improved {
                    best = Some((valid_loss, self.layers.clone()));
                    since_best = 0;
                } else {
                    since_best += 1;
                    if since_best >= patience {
                        log::debug!("{}: early stop at epoch {epoch}", self.name);
                        break;
                    }
                }
            }
        }

        let best_valid_loss = best.as_ref().map(|(loss, _)| *loss);
        if let Some((_, layers)) = best {
            self.layers = layers;
        }

        let learn_loss = mean_squared_error(&self.forward(&learn.inputs), &learn.targets);
        if !learn_loss.is_finite() {
            return Err(Error::Data(format!("{} diverged", self.name)));
        }
        log::debug!(
            "{}: {} epochs, learn mse {:.6}",
            self.name,
            epochs_run,
            learn_loss
        );

        Ok(FitSummary {
            epochs_run,
            learn_loss,
            best_valid_loss,
        })
    }

    fn predict(&self, inputs: &Array2<f32>) -> Result<Array2<f32>> {
        self.check_width(inputs)?;
        Ok(self.forward(inputs))
    }

    fn save(&self, writer: &mut dyn Write) -> Result<()> {
        save_state(&self.to_state(), writer, &SaveConfig::new(self.format))
    }

    fn load(reader: &mut dyn Read) -> Result<Self> {
        let state = load_state(reader)?;
        Mlp::from_state(&state)
    }
}
