//! Regression metrics for candidate selection
//!
//! - RMSE, MAE and median absolute error: lower is better
//! - R²: higher is better

use crate::config::SelectionMetric;
use ndarray::ArrayView2;

/// Trait for evaluation metrics
pub trait Metric {
    /// Compute the metric over every cell of `rows x targets`
    fn compute(&self, predictions: ArrayView2<'_, f32>, targets: ArrayView2<'_, f32>) -> f32;

    /// Name of the metric
    fn name(&self) -> &str;

    /// Whether higher values are better (true) or lower (false)
    fn higher_is_better(&self) -> bool {
        false
    }
}

fn abs_errors(predictions: ArrayView2<'_, f32>, targets: ArrayView2<'_, f32>) -> Vec<f32> {
    debug_assert_eq!(predictions.shape(), targets.shape());
    predictions
        .iter()
        .zip(targets.iter())
        .map(|(&p, &t)| (p - t).abs())
        .collect()
}

/// Root Mean Squared Error (RMSE) metric
///
/// RMSE = sqrt(mean((y - y_pred)²))
#[derive(Debug, Clone, Copy, Default)]
pub struct RMSE;

impl Metric for RMSE {
    fn compute(&self, predictions: ArrayView2<'_, f32>, targets: ArrayView2<'_, f32>) -> f32 {
        if predictions.is_empty() {
            return 0.0;
        }
        let n = predictions.len() as f32;
        let mse = abs_errors(predictions, targets).iter().map(|e| e * e).sum::<f32>() / n;
        mse.sqrt()
    }

    fn name(&self) -> &str {
        "RMSE"
    }
}

/// Mean Absolute Error (MAE) metric
#[derive(Debug, Clone, Copy, Default)]
pub struct MAE;

impl Metric for MAE {
    fn compute(&self, predictions: ArrayView2<'_, f32>, targets: ArrayView2<'_, f32>) -> f32 {
        if predictions.is_empty() {
            return 0.0;
        }
        let n = predictions.len() as f32;
        abs_errors(predictions, targets).iter().sum::<f32>() / n
    }

    fn name(&self) -> &str {
        "MAE"
    }
}

/// Median absolute error
///
/// Even counts average the two middle errors. Any NaN error makes the
/// result NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct MedianAE;

impl Metric for MedianAE {
    fn compute(&self, predictions: ArrayView2<'_, f32>, targets: ArrayView2<'_, f32>) -> f32 {
        let mut errors = abs_errors(predictions, targets);
        if errors.is_empty() {
            return 0.0;
        }
        if errors.iter().any(|e| e.is_nan()) {
            return f32::NAN;
        }
        errors.sort_by(f32::total_cmp);
        let mid = errors.len() / 2;
        if errors.len() % 2 == 0 {
            (errors[mid - 1] + errors[mid]) / 2.0
        } else {
            errors[mid]
        }
    }

    fn name(&self) -> &str {
        "MedAE"
    }
}

/// R² (coefficient of determination), pooled over every target column
///
/// R² = 1 - SS_res / SS_tot, where SS_tot is taken around each column's mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct R2Score;

impl Metric for R2Score {
    fn compute(&self, predictions: ArrayView2<'_, f32>, targets: ArrayView2<'_, f32>) -> f32 {
        if predictions.is_empty() {
            return 0.0;
        }
        let ss_res: f32 = abs_errors(predictions, targets).iter().map(|e| e * e).sum();
        let ss_tot: f32 = targets
            .columns()
            .into_iter()
            .map(|col| {
                let mean = col.mean().unwrap_or(0.0);
                col.iter().map(|&t| (t - mean).powi(2)).sum::<f32>()
            })
            .sum();

        if ss_tot == 0.0 {
            return if ss_res == 0.0 { 1.0 } else { 0.0 };
        }
        1.0 - ss_res / ss_tot
    }

    fn name(&self) -> &str {
        "R²"
    }

    fn higher_is_better(&self) -> bool {
        true
    }
}

/// Metric implementation for a configured selection metric
pub fn metric_for(kind: SelectionMetric) -> Box<dyn Metric> {
    match kind {
        SelectionMetric::Rmse => Box::new(RMSE),
        SelectionMetric::Mae => Box::new(MAE),
        SelectionMetric::MedAe => Box::new(MedianAE),
        SelectionMetric::R2 => Box::new(R2Score),
    }
}

/// Error to minimise: metrics where higher is better are reported as `1 - value`
pub fn selection_error(
    kind: SelectionMetric,
    predictions: ArrayView2<'_, f32>,
    targets: ArrayView2<'_, f32>,
) -> f32 {
    let metric = metric_for(kind);
    let value = metric.compute(predictions, targets);
    if metric.higher_is_better() {
        1.0 - value
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_rmse() {
        let pred = array![[1.0f32], [2.0], [3.0]];
        let target = array![[1.0f32], [2.0], [5.0]];
        // sqrt(4 / 3)
        assert_abs_diff_eq!(RMSE.compute(pred.view(), target.view()), 1.1547, epsilon = 1e-4);
        assert_eq!(RMSE.compute(pred.view(), pred.view()), 0.0);
    }

    #[test]
    fn test_mae() {
        let pred = array![[1.0f32, 2.0], [3.0, 4.0]];
        let target = array![[1.5f32, 2.5], [3.5, 4.5]];
        assert_abs_diff_eq!(MAE.compute(pred.view(), target.view()), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_median_ae_odd_and_even() {
        let target = array![[0.0f32], [0.0], [0.0]];
        let pred = array![[1.0f32], [10.0], [2.0]];
        assert_eq!(MedianAE.compute(pred.view(), target.view()), 2.0);

        let target = array![[0.0f32], [0.0], [0.0], [0.0]];
        let pred = array![[1.0f32], [10.0], [2.0], [-4.0]];
        assert_eq!(MedianAE.compute(pred.view(), target.view()), 3.0);
    }

    #[test]
    fn test_median_ae_propagates_nan() {
        let target = array![[0.0f32], [0.0]];
        let pred = array![[f32::NAN], [1.0]];
        assert!(MedianAE.compute(pred.view(), target.view()).is_nan());
    }

    #[test]
    fn test_r2_perfect_and_mean() {
        let target = array![[1.0f32], [2.0], [3.0]];
        assert_abs_diff_eq!(R2Score.compute(target.view(), target.view()), 1.0, epsilon = 1e-6);
        let mean = array![[2.0f32], [2.0], [2.0]];
        assert_abs_diff_eq!(R2Score.compute(mean.view(), target.view()), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_selection_error_flips_r2() {
        let target = array![[1.0f32], [2.0], [3.0]];
        let err = selection_error(SelectionMetric::R2, target.view(), target.view());
        assert_abs_diff_eq!(err, 0.0, epsilon = 1e-6);
        let err = selection_error(SelectionMetric::Rmse, target.view(), target.view());
        assert_eq!(err, 0.0);
        assert!(!metric_for(SelectionMetric::Mae).higher_is_better());
    }

    fn score_all(predictions: ArrayView2<'_, f32>, targets: ArrayView2<'_, f32>) -> Vec<f32> {
        [
            SelectionMetric::Rmse,
            SelectionMetric::Mae,
            SelectionMetric::MedAe,
            SelectionMetric::R2,
        ]
        .into_iter()
        .map(|kind| metric_for(kind).compute(predictions, targets))
        .collect()
    }

    #[test]
    fn test_metrics_take_views_of_unrelated_lifetimes() {
        let target = array![[0.0f32], [0.0], [0.0], [0.0]];
        let scores = {
            let pred = array![[1.0f32], [-1.0], [3.0], [-3.0]];
            score_all(pred.view(), target.view())
        };
        assert_abs_diff_eq!(scores[0], 5.0f32.sqrt(), epsilon = 1e-6);
        assert_abs_diff_eq!(scores[1], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(scores[2], 2.0, epsilon = 1e-6);
        assert_eq!(scores[3], 0.0);
    }
}
