//! Training round reports

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SelectionMetric;
use crate::error::{Coord, TrainingFailure};

/// Lifecycle of one candidate slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Untrained,
    Trained,
    Failed,
}

/// How one candidate fared in a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub coord: Coord,
    pub status: CandidateStatus,
    /// Selection error, present only for trained candidates
    pub error: Option<f32>,
    pub epochs_run: usize,
    pub failure: Option<TrainingFailure>,
}

impl CandidateReport {
    pub(crate) fn failed(coord: Coord, cause: String) -> Self {
        Self {
            coord,
            status: CandidateStatus::Failed,
            error: None,
            epochs_run: 0,
            failure: Some(TrainingFailure { coord, cause }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolReport {
    pub pool: usize,
    /// Winning candidate index; `None` when every candidate failed
    pub winner: Option<usize>,
    pub candidates: Vec<CandidateReport>,
}

/// Result of [`crate::ProjectOrchestrator::train`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub metric: SelectionMetric,
    pub pools: Vec<PoolReport>,
}

impl TrainReport {
    pub fn winners(&self) -> Vec<Option<usize>> {
        self.pools.iter().map(|p| p.winner).collect()
    }

    /// Every candidate failure, pool-major
    pub fn failures(&self) -> Vec<&TrainingFailure> {
        self.pools
            .iter()
            .flat_map(|p| &p.candidates)
            .filter_map(|c| c.failure.as_ref())
            .collect()
    }

    /// Whether at least one pool produced a winner
    pub fn has_winner(&self) -> bool {
        self.pools.iter().any(|p| p.winner.is_some())
    }
}

impl fmt::Display for TrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pool in &self.pools {
            match pool.winner {
                Some(w) => write!(f, "pool_{}: winner candidate_{w}", pool.pool)?,
                None => write!(f, "pool_{}: no winner", pool.pool)?,
            }
            let failed = pool
                .candidates
                .iter()
                .filter(|c| c.status == CandidateStatus::Failed)
                .count();
            writeln!(f, " ({failed}/{} failed)", pool.candidates.len())?;
        }
        Ok(())
    }
}
