//! Serializable learner state

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Learner metadata containing architecture and training information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Learner name/identifier, usually the candidate coordinate
    pub name: String,

    /// Architecture type (e.g., "mlp")
    pub architecture: String,

    /// State layout version
    pub version: String,

    /// Custom metadata fields
    #[serde(default)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl ModelMetadata {
    /// Create new metadata with minimal fields
    pub fn new(name: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            architecture: architecture.into(),
            version: "0.1.0".to_string(),
            custom: HashMap::new(),
        }
    }

    /// Add custom metadata field
    pub fn with_custom(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }
}

/// Information about one flattened parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Parameter name (e.g., "layer0.weight")
    pub name: String,

    /// Parameter shape
    pub shape: Vec<usize>,
}

impl ParameterInfo {
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Serializable learner state: metadata, parameter layout and flat data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub metadata: ModelMetadata,
    pub parameters: Vec<ParameterInfo>,
    pub data: Vec<f32>,
}

impl ModelState {
    pub fn new(metadata: ModelMetadata) -> Self {
        Self {
            metadata,
            parameters: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Append a parameter and its values
    pub fn push(&mut self, name: impl Into<String>, shape: Vec<usize>, values: &[f32]) {
        self.parameters.push(ParameterInfo {
            name: name.into(),
            shape,
        });
        self.data.extend_from_slice(values);
    }

    /// Split the flat data back into `(info, values)` pairs
    ///
    /// Returns `None` when the declared shapes do not cover `data` exactly.
    pub fn split(&self) -> Option<Vec<(&ParameterInfo, &[f32])>> {
        let mut offset = 0;
        let mut out = Vec::with_capacity(self.parameters.len());
        for info in &self.parameters {
            let end = offset + info.numel();
            if end > self.data.len() {
                return None;
            }
            out.push((info, &self.data[offset..end]));
            offset = end;
        }
        (offset == self.data.len()).then_some(out)
    }
}
