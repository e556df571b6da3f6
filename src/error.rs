//! Error types for Conjunto

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Location of one candidate inside a project: `pool_<pool>/candidate_<candidate>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub pool: usize,
    pub candidate: usize,
}

impl Coord {
    pub fn new(pool: usize, candidate: usize) -> Self {
        Self { pool, candidate }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool_{}/candidate_{}", self.pool, self.candidate)
    }
}

/// A single candidate's training failure, captured by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingFailure {
    pub coord: Coord,
    pub cause: String,
}

impl fmt::Display for TrainingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.coord, self.cause)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid topology: {pools} pools x {candidates} candidates (both must be >= 1)")]
    InvalidTopology { pools: usize, candidates: usize },

    #[error("Data error: {0}")]
    Data(String),

    #[error("No pool has a trained winner; train the project first")]
    NotTrained,

    #[error("Corrupt archive {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("Training failed at {0}")]
    Training(TrainingFailure),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Project error: {0}")]
    Project(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl Error {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptArchive {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_display_names_directories() {
        assert_eq!(Coord::new(2, 7).to_string(), "pool_2/candidate_7");
    }

    #[test]
    fn test_coord_ordering_is_pool_major() {
        let mut coords = vec![Coord::new(1, 0), Coord::new(0, 1), Coord::new(0, 0)];
        coords.sort();
        assert_eq!(
            coords,
            vec![Coord::new(0, 0), Coord::new(0, 1), Coord::new(1, 0)]
        );
    }

    #[test]
    fn test_training_error_names_coordinate() {
        let err = Error::Training(TrainingFailure {
            coord: Coord::new(1, 3),
            cause: "diverged".to_string(),
        });
        let msg = err.to_string();
        assert!(msg.contains("pool_1/candidate_3"));
        assert!(msg.contains("diverged"));
    }

    #[test]
    fn test_topology_error_reports_counts() {
        let err = Error::InvalidTopology {
            pools: 0,
            candidates: 4,
        };
        assert!(err.to_string().contains("0 pools x 4 candidates"));
    }
}
