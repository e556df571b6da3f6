//! `project.yml`: everything about a project that is not a learner artifact

use serde::{Deserialize, Serialize};

use crate::data::{Dataset, Preprocessor};
use crate::error::{Error, Result};
use crate::train::{CandidateStatus, TrainReport};

/// Where the training rows came from and how they were shaped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub source: String,
    pub input_names: Vec<String>,
    pub target_names: Vec<String>,
    /// Learn, valid and test row counts
    pub rows: [usize; 3],
    /// Fitted preprocessing, so raw frames can be predicted after a reload
    pub preprocessor: Preprocessor,
}

impl DatasetRecord {
    pub fn of(dataset: &Dataset) -> Self {
        Self {
            source: dataset.source.clone(),
            input_names: dataset.input_names.clone(),
            target_names: dataset.target_names.clone(),
            rows: [dataset.learn.len(), dataset.valid.len(), dataset.test.len()],
            preprocessor: dataset.preprocessor.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub pools: usize,
    pub candidates: usize,
    /// Candidate statuses, pool-major
    pub statuses: Vec<Vec<CandidateStatus>>,
    /// Selection error of every trained candidate, pool-major
    #[serde(default)]
    pub errors: Vec<Vec<Option<f32>>>,
    pub winners: Vec<Option<usize>>,
    #[serde(default)]
    pub dataset: Option<DatasetRecord>,
}

impl Manifest {
    /// Fresh manifest: every candidate untrained, no winners
    pub fn new(name: &str, pools: usize, candidates: usize) -> Self {
        Self {
            name: name.to_string(),
            pools,
            candidates,
            statuses: vec![vec![CandidateStatus::Untrained; candidates]; pools],
            errors: vec![vec![None; candidates]; pools],
            winners: vec![None; pools],
            dataset: None,
        }
    }

    /// Record the outcome of a training round
    pub fn record_round(&mut self, report: &TrainReport, dataset: &Dataset) {
        self.statuses = report
            .pools
            .iter()
            .map(|p| p.candidates.iter().map(|c| c.status).collect())
            .collect();
        self.errors = report
            .pools
            .iter()
            .map(|p| p.candidates.iter().map(|c| c.error).collect())
            .collect();
        self.winners = report.winners();
        self.dataset = Some(DatasetRecord::of(dataset));
    }

    /// Pools that have a winner, with the winning candidate
    pub fn winning_pools(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.winners
            .iter()
            .enumerate()
            .filter_map(|(pool, w)| w.map(|w| (pool, w)))
    }

    /// Check internal consistency against a `(pools, candidates)` topology
    pub fn check(&self, pools: usize, candidates: usize) -> std::result::Result<(), String> {
        if (self.pools, self.candidates) != (pools, candidates) {
            return Err(format!(
                "manifest declares {}x{} but layout holds {pools}x{candidates}",
                self.pools, self.candidates
            ));
        }
        let rows_ok = |n: usize| n == pools;
        if !rows_ok(self.statuses.len()) || !rows_ok(self.winners.len()) {
            return Err("manifest pool count is inconsistent".to_string());
        }
        if self.statuses.iter().any(|s| s.len() != candidates) {
            return Err("manifest candidate count is inconsistent".to_string());
        }
        for (pool, winner) in self.winning_pools() {
            if winner >= candidates || self.statuses[pool][winner] != CandidateStatus::Trained {
                return Err(format!("pool_{pool} winner candidate_{winner} was not trained"));
            }
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| Error::Serialization(format!("Failed to parse manifest: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_manifest_is_untrained() {
        let m = Manifest::new("demo", 2, 3);
        assert_eq!(m.statuses, vec![vec![CandidateStatus::Untrained; 3]; 2]);
        assert_eq!(m.winners, vec![None, None]);
        assert_eq!(m.winning_pools().count(), 0);
        assert!(m.check(2, 3).is_ok());
        assert!(m.check(3, 3).is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut m = Manifest::new("demo", 1, 2);
        m.statuses[0] = vec![CandidateStatus::Failed, CandidateStatus::Trained];
        m.errors[0][1] = Some(0.25);
        m.winners[0] = Some(1);
        let yaml = m.to_yaml().unwrap();
        assert!(yaml.contains("failed"));
        assert_eq!(Manifest::from_yaml(&yaml).unwrap(), m);
    }

    #[test]
    fn test_check_rejects_untrained_winner() {
        let mut m = Manifest::new("demo", 1, 2);
        m.winners[0] = Some(0);
        assert!(m.check(1, 2).is_err());
        m.winners[0] = Some(5);
        assert!(m.check(1, 2).is_err());
    }

    #[test]
    fn test_from_yaml_reports_serialization_error() {
        assert!(matches!(
            Manifest::from_yaml("name: [unterminated"),
            Err(Error::Serialization(_))
        ));
    }
}
