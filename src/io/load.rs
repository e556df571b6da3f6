//! Learner state loading

use super::format::ModelFormat;
use super::model::ModelState;
use crate::{Error, Result};
use std::io::Read;

/// Decode a learner state from `reader`
///
/// The encoding is detected from the content, so states written as JSON or
/// YAML load through the same call.
pub fn load_state(reader: &mut dyn Read) -> Result<ModelState> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    let state: ModelState = match ModelFormat::sniff(&bytes) {
        ModelFormat::Json => serde_json::from_slice(&bytes)
            .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {e}")))?,
        ModelFormat::Yaml => serde_yaml::from_slice(&bytes)
            .map_err(|e| Error::Serialization(format!("YAML deserialization failed: {e}")))?,
    };

    if state.split().is_none() {
        return Err(Error::Serialization(format!(
            "state '{}' declares {} values but carries {}",
            state.metadata.name,
            state.parameters.iter().map(|p| p.numel()).sum::<usize>(),
            state.data.len()
        )));
    }

    Ok(state)
}
