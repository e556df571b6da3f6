//! YAML schema for the project configuration sidecar

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hidden layer activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
}

/// Parameter update rule used by the bundled learner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Adam,
    Sgd,
}

/// Error measure used to rank candidates within a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMetric {
    /// Root mean squared error
    Rmse,
    /// Mean absolute error
    Mae,
    /// Median absolute error
    MedAe,
    /// Ranked as `1 - R²` so that lower is still better
    R2,
}

/// Training and data configuration shared by every job of a round
///
/// Keys this struct does not know are kept in `extra` and written back
/// untouched when the sidecar is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Training epochs per candidate
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// Hidden layer widths, input side first
    #[serde(default = "default_hidden_layers")]
    pub hidden_layers: Vec<usize>,

    #[serde(default = "default_activation")]
    pub activation: Activation,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,

    #[serde(default = "default_optimizer")]
    pub optimizer: OptimizerKind,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Stop after this many epochs without validation improvement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patience: Option<usize>,

    /// Base seed; each candidate derives its own from its coordinate
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Worker count recorded for the orchestrator that wrote this file
    #[serde(default = "default_process_count")]
    pub process_count: usize,

    /// Learn/valid/test fractions
    #[serde(default = "default_split")]
    pub split: [f64; 3],

    /// Shuffle rows before splitting
    #[serde(default)]
    pub random: bool,

    /// Min-max scale inputs
    #[serde(default)]
    pub normalize: bool,

    /// Replace inputs by principal components
    #[serde(default)]
    pub transform: bool,

    /// Cap on principal components (None keeps 99% of the variance)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_components: Option<usize>,

    #[serde(default = "default_selection_metric")]
    pub selection_metric: SelectionMetric,

    /// Unrecognized keys, preserved but not interpreted
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            hidden_layers: default_hidden_layers(),
            activation: default_activation(),
            learning_rate: default_learning_rate(),
            optimizer: default_optimizer(),
            batch_size: default_batch_size(),
            patience: None,
            seed: default_seed(),
            process_count: default_process_count(),
            split: default_split(),
            random: false,
            normalize: false,
            transform: false,
            transform_components: None,
            selection_metric: default_selection_metric(),
            extra: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_hidden_layers(mut self, layers: Vec<usize>) -> Self {
        self.hidden_layers = layers;
        self
    }

    pub fn with_learning_rate(mut self, lr: f32) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_selection_metric(mut self, metric: SelectionMetric) -> Self {
        self.selection_metric = metric;
        self
    }
}

fn default_epochs() -> usize {
    500
}

fn default_hidden_layers() -> Vec<usize> {
    vec![32, 32]
}

fn default_activation() -> Activation {
    Activation::Relu
}

fn default_learning_rate() -> f32 {
    0.001
}

fn default_optimizer() -> OptimizerKind {
    OptimizerKind::Adam
}

fn default_batch_size() -> usize {
    32
}

fn default_seed() -> u64 {
    42
}

fn default_process_count() -> usize {
    1
}

fn default_split() -> [f64; 3] {
    [0.7, 0.2, 0.1]
}

fn default_selection_metric() -> SelectionMetric {
    SelectionMetric::Rmse
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_document_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_deserialize_full_config() {
        let yaml = r#"
epochs: 100
hidden_layers: [16, 8]
activation: tanh
learning_rate: 0.01
optimizer: sgd
batch_size: 4
patience: 20
seed: 7
process_count: 8
split: [0.6, 0.3, 0.1]
random: true
normalize: true
transform: true
transform_components: 5
selection_metric: med_ae
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.epochs, 100);
        assert_eq!(config.hidden_layers, vec![16, 8]);
        assert_eq!(config.activation, Activation::Tanh);
        assert_eq!(config.optimizer, OptimizerKind::Sgd);
        assert_eq!(config.patience, Some(20));
        assert_eq!(config.process_count, 8);
        assert_eq!(config.split, [0.6, 0.3, 0.1]);
        assert!(config.random && config.normalize && config.transform);
        assert_eq!(config.transform_components, Some(5));
        assert_eq!(config.selection_metric, SelectionMetric::MedAe);
        assert!(config.extra.is_empty());
    }

    #[test]
    fn test_unknown_keys_are_preserved() {
        let yaml = "epochs: 3\nnotes: keep me\nlegacy_block:\n  a: 1\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(
            config.extra.get("notes"),
            Some(&serde_yaml::Value::String("keep me".to_string()))
        );

        let written = serde_yaml::to_string(&config).unwrap();
        let reread: Config = serde_yaml::from_str(&written).unwrap();
        assert_eq!(reread.extra, config.extra);
    }

    #[test]
    fn test_builder_helpers() {
        let config = Config::default()
            .with_epochs(5)
            .with_hidden_layers(vec![3])
            .with_learning_rate(0.5)
            .with_seed(9)
            .with_selection_metric(SelectionMetric::R2);
        assert_eq!(config.epochs, 5);
        assert_eq!(config.hidden_layers, vec![3]);
        assert_eq!(config.learning_rate, 0.5);
        assert_eq!(config.seed, 9);
        assert_eq!(config.selection_metric, SelectionMetric::R2);
    }
}
