//! Configuration validation

use super::schema::Config;

/// Tolerance on the sum of the split fractions
pub const SPLIT_TOLERANCE: f64 = 1e-6;

/// Validation error type
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid epochs: {0} (must be > 0)")]
    InvalidEpochs(usize),

    #[error("Invalid batch size: {0} (must be > 0)")]
    InvalidBatchSize(usize),

    #[error("Invalid learning rate: {0} (must be > 0.0)")]
    InvalidLearningRate(f32),

    #[error("Invalid hidden layer width at index {0} (must be > 0)")]
    InvalidHiddenLayer(usize),

    #[error("Invalid process count: {0} (must be > 0)")]
    InvalidProcessCount(usize),

    #[error("Invalid transform component count: {0} (must be > 0)")]
    InvalidComponents(usize),

    #[error("Invalid split {0:?}: {1}")]
    InvalidSplit([f64; 3], &'static str),
}

/// Validate a configuration before a training round starts
pub fn validate_config(config: &Config) -> Result<(), ValidationError> {
    if config.epochs == 0 {
        return Err(ValidationError::InvalidEpochs(config.epochs));
    }
    if config.batch_size == 0 {
        return Err(ValidationError::InvalidBatchSize(config.batch_size));
    }
    if !(config.learning_rate > 0.0) || !config.learning_rate.is_finite() {
        return Err(ValidationError::InvalidLearningRate(config.learning_rate));
    }
    if let Some(idx) = config.hidden_layers.iter().position(|&w| w == 0) {
        return Err(ValidationError::InvalidHiddenLayer(idx));
    }
    if config.process_count == 0 {
        return Err(ValidationError::InvalidProcessCount(config.process_count));
    }
    if config.transform_components == Some(0) {
        return Err(ValidationError::InvalidComponents(0));
    }
    validate_split(config.split)
}

/// Split fractions each lie in `[0, 1)`, learn is positive, and they sum to 1
pub fn validate_split(split: [f64; 3]) -> Result<(), ValidationError> {
    if split.iter().any(|f| !f.is_finite() || *f < 0.0 || *f >= 1.0) {
        return Err(ValidationError::InvalidSplit(
            split,
            "every fraction must lie in [0, 1)",
        ));
    }
    if split[0] <= 0.0 {
        return Err(ValidationError::InvalidSplit(
            split,
            "learn fraction must be positive",
        ));
    }
    let sum: f64 = split.iter().sum();
    if (sum - 1.0).abs() > SPLIT_TOLERANCE {
        return Err(ValidationError::InvalidSplit(split, "fractions must sum to 1"));
    }
    Ok(())
}
