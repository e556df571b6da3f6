//! Serialization format definitions

use serde::{Deserialize, Serialize};

/// Supported learner state encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFormat {
    /// Default for artifacts
    Json,

    Yaml,
}

impl ModelFormat {
    /// Detect format from encoded bytes: JSON documents open with `{`
    pub fn sniff(bytes: &[u8]) -> Self {
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => ModelFormat::Json,
            _ => ModelFormat::Yaml,
        }
    }
}

/// Configuration for saving learner state
#[derive(Debug, Clone)]
pub struct SaveConfig {
    /// Serialization format
    pub format: ModelFormat,

    /// Whether to pretty-print
    pub pretty: bool,
}

impl SaveConfig {
    /// Create new save config with format
    pub fn new(format: ModelFormat) -> Self {
        Self {
            format,
            pretty: false,
        }
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self::new(ModelFormat::Json)
    }
}
