//! Parameter update rules

use crate::config::OptimizerKind;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};

/// Update rule applied to each parameter tensor after a backward pass
///
/// Parameters are addressed by a stable slot index so stateful rules can
/// keep per-tensor moments.
pub trait ParamOptimizer: Send {
    /// Advance the step counter; call once per mini-batch
    fn begin_step(&mut self);

    /// Apply one update to `param` given its gradient
    fn update(&mut self, slot: usize, param: ArrayViewMutD<'_, f32>, grad: ArrayViewD<'_, f32>);

    fn lr(&self) -> f32;
}

/// Build the update rule named by the configuration
pub fn build_optimizer(kind: OptimizerKind, lr: f32) -> Box<dyn ParamOptimizer> {
    match kind {
        OptimizerKind::Adam => Box::new(Adam::default_params(lr)),
        OptimizerKind::Sgd => Box::new(Sgd::new(lr)),
    }
}

/// Plain stochastic gradient descent
pub struct Sgd {
    lr: f32,
}

impl Sgd {
    pub fn new(lr: f32) -> Self {
        Self { lr }
    }
}

impl ParamOptimizer for Sgd {
    fn begin_step(&mut self) {}

    fn update(&mut self, _slot: usize, mut param: ArrayViewMutD<'_, f32>, grad: ArrayViewD<'_, f32>) {
        let lr = self.lr;
        Zip::from(&mut param).and(&grad).for_each(|p, &g| *p -= lr * g);
    }

    fn lr(&self) -> f32 {
        self.lr
    }
}

/// Adam optimizer (Adaptive Moment Estimation)
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<ArrayD<f32>>>, // First moment
    v: Vec<Option<ArrayD<f32>>>, // Second moment
}

impl Adam {
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Create Adam with default parameters
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }
}

impl ParamOptimizer for Adam {
    fn begin_step(&mut self) {
        self.t += 1;
    }

    fn update(&mut self, slot: usize, mut param: ArrayViewMutD<'_, f32>, grad: ArrayViewD<'_, f32>) {
        if self.m.len() <= slot {
            self.m.resize(slot + 1, None);
            self.v.resize(slot + 1, None);
        }
        let m = self.m[slot].get_or_insert_with(|| ArrayD::zeros(grad.raw_dim()));
        let v = self.v[slot].get_or_insert_with(|| ArrayD::zeros(grad.raw_dim()));

        let t = self.t.max(1) as i32;
        // Bias correction folded into the step size
        let lr_t = self.lr * ((1.0 - self.beta2.powi(t)).sqrt() / (1.0 - self.beta1.powi(t)));
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);

        Zip::from(&mut param)
            .and(&grad)
            .and(m)
            .and(v)
            .for_each(|p, &g, m, v| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                *p -= lr_t * *m / (v.sqrt() + eps);
            });
    }

    fn lr(&self) -> f32 {
        self.lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn minimise(opt: &mut dyn ParamOptimizer, steps: usize) -> f32 {
        // f(x) = (x - 3)^2
        let mut x = array![0.0f32].into_dyn();
        for _ in 0..steps {
            let grad = x.mapv(|v| 2.0 * (v - 3.0));
            opt.begin_step();
            opt.update(0, x.view_mut(), grad.view());
        }
        x[[0]]
    }

    #[test]
    fn test_sgd_converges_on_quadratic() {
        let mut sgd = Sgd::new(0.1);
        assert_abs_diff_eq!(minimise(&mut sgd, 200), 3.0, epsilon = 1e-3);
    }

    #[test]
    fn test_adam_converges_on_quadratic() {
        let mut adam = Adam::default_params(0.1);
        assert_abs_diff_eq!(minimise(&mut adam, 2000), 3.0, epsilon = 1e-2);
    }

    #[test]
    fn test_adam_keeps_separate_moments_per_slot() {
        let mut adam = Adam::default_params(0.01);
        let mut a = array![1.0f32, 1.0].into_dyn();
        let mut b = array![1.0f32].into_dyn();
        adam.begin_step();
        adam.update(0, a.view_mut(), array![1.0f32, -1.0].into_dyn().view());
        adam.update(3, b.view_mut(), array![1.0f32].into_dyn().view());
        assert_eq!(adam.m.len(), 4);
        assert!(a[[0]] < 1.0 && a[[1]] > 1.0);
        assert!(b[[0]] < 1.0);
    }

    #[test]
    fn test_build_optimizer_respects_kind() {
        assert_eq!(build_optimizer(OptimizerKind::Sgd, 0.5).lr(), 0.5);
        assert_eq!(build_optimizer(OptimizerKind::Adam, 0.01).lr(), 0.01);
    }
}
