//! Declarative YAML configuration
//!
//! Every project carries a `config.yml` sidecar holding the hyperparameters
//! used to train its pools. Missing files are regenerated with defaults.
//!
//! # Example
//!
//! ```yaml
//! epochs: 500
//! hidden_layers: [32, 32]
//! learning_rate: 0.001
//! process_count: 4
//! split: [0.7, 0.2, 0.1]
//! normalize: true
//! transform: false
//! ```

mod cli;
mod file;
mod schema;
mod validate;


#[cfg(test)]
mod property_tests;

pub use cli::{
    apply_overrides, parse_args, Cli, Command, DemoArgs, PredictArgs, SplitArg, TrainArgs,
    ValidateArgs,
};
pub use file::{load_config, load_or_default, save_config, CONFIG_FILE};
pub use schema::{Activation, Config, OptimizerKind, SelectionMetric};
pub use validate::{validate_config, validate_split, ValidationError, SPLIT_TOLERANCE};
