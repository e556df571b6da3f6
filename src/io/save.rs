//! Learner state saving

use super::format::{ModelFormat, SaveConfig};
use super::model::ModelState;
use crate::{Error, Result};
use std::io::Write;

/// Encode a learner state into `writer`
///
/// # Example
///
/// ```
/// use conjunto::io::{save_state, ModelMetadata, ModelState, SaveConfig};
///
/// let mut state = ModelState::new(ModelMetadata::new("demo", "mlp"));
/// state.push("layer0.bias", vec![2], &[0.0, 1.0]);
///
/// let mut buf = Vec::new();
/// save_state(&state, &mut buf, &SaveConfig::default()).unwrap();
/// assert!(buf.starts_with(b"{"));
/// ```
pub fn save_state(state: &ModelState, writer: &mut dyn Write, config: &SaveConfig) -> Result<()> {
    let data = match config.format {
        ModelFormat::Json if config.pretty => serde_json::to_string_pretty(state)
            .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?,
        ModelFormat::Json => serde_json::to_string(state)
            .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?,
        ModelFormat::Yaml => serde_yaml::to_string(state)
            .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))?,
    };
    writer.write_all(data.as_bytes())?;
    Ok(())
}
