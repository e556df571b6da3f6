//! Parallel candidate training
//!
//! One job per candidate slot runs on a fixed-size rayon pool. Jobs share the
//! dataset read-only, own a private copy of the config, and write only their
//! own artifact slot. Results come back over a channel and are reassembled by
//! coordinate once every job has reported.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::time::Instant;

use rayon::{ThreadPool, ThreadPoolBuilder};

use super::selector::evaluate;
use crate::config::Config;
use crate::data::Dataset;
use crate::error::{Coord, Error, Result, TrainingFailure};
use crate::learner::{FitSummary, Learner, LearnerSpec};
use crate::storage::{ArtifactStore, Slot};

/// Where a dispatcher is within a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    /// Jobs submitted, waiting at the barrier
    Dispatching,
    /// Every job reported; assembling results
    Collecting,
    Done,
}

/// What one candidate job produced
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Fitted, evaluated and persisted
    Trained { summary: FitSummary, error: f32 },
    Failed(TrainingFailure),
}

/// Bounded worker pool that trains candidates in rounds
pub struct TrainingDispatcher {
    pool: ThreadPool,
    workers: usize,
    state: RoundState,
}

impl std::fmt::Debug for TrainingDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingDispatcher")
            .field("workers", &self.workers)
            .field("state", &self.state)
            .finish()
    }
}

impl TrainingDispatcher {
    /// Create a dispatcher with `workers` threads; 1 trains sequentially
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::InvalidParameter(
                "worker count must be at least 1".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("conjunto-worker-{i}"))
            .build()
            .map_err(|e| Error::InvalidParameter(format!("cannot start worker pool: {e}")))?;
        Ok(Self {
            pool,
            workers,
            state: RoundState::Idle,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Train every coordinate and block until all of them have reported
    ///
    /// Jobs are submitted in the order given. A job that errors or panics
    /// yields [`JobOutcome::Failed`] for its coordinate only.
    pub fn run_round<L: Learner>(
        &mut self,
        coords: &[Coord],
        dataset: &Dataset,
        config: &Config,
        store: &dyn ArtifactStore,
    ) -> BTreeMap<Coord, JobOutcome> {
        let started = Instant::now();
        log::info!(
            "Dispatching {} candidate jobs on {} workers",
            coords.len(),
            self.workers
        );
        self.state = RoundState::Dispatching;

        let (tx, rx) = mpsc::channel();
        self.pool.scope(move |scope| {
            for &coord in coords {
                let tx = tx.clone();
                let config = config.clone();
                scope.spawn(move |_| {
                    let outcome = execute::<L>(coord, dataset, config, store);
                    // the receiver outlives the scope
                    let _ = tx.send((coord, outcome));
                });
            }
        });

        self.state = RoundState::Collecting;
        let mut results: BTreeMap<Coord, JobOutcome> = rx.into_iter().collect();
        for &coord in coords {
            results.entry(coord).or_insert_with(|| {
                JobOutcome::Failed(TrainingFailure {
                    coord,
                    cause: "job did not report".to_string(),
                })
            });
        }

        let failed = results
            .values()
            .filter(|o| matches!(o, JobOutcome::Failed(_)))
            .count();
        log::info!(
            "Round finished in {:.2?}: {} trained, {} failed",
            started.elapsed(),
            results.len() - failed,
            failed
        );
        self.state = RoundState::Done;
        results
    }
}

fn execute<L: Learner>(
    coord: Coord,
    dataset: &Dataset,
    config: Config,
    store: &dyn ArtifactStore,
) -> JobOutcome {
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
        train_candidate::<L>(coord, dataset, &config, store)
    }));
    let cause = match attempt {
        Ok(Ok((summary, error))) => return JobOutcome::Trained { summary, error },
        Ok(Err(Error::Training(failure))) => failure.cause,
        Ok(Err(e)) => e.to_string(),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };
    log::warn!("{coord} failed: {cause}");
    JobOutcome::Failed(TrainingFailure { coord, cause })
}

fn train_candidate<L: Learner>(
    coord: Coord,
    dataset: &Dataset,
    config: &Config,
    store: &dyn ArtifactStore,
) -> Result<(FitSummary, f32)> {
    let spec = LearnerSpec::for_slot(coord, dataset, config);
    let mut learner = L::build(&spec, config)?;
    let summary = learner.fit(dataset, config)?;

    let error = evaluate(&learner, dataset, config.selection_metric)?;
    if !error.is_finite() {
        return Err(Error::Training(TrainingFailure {
            coord,
            cause: format!("non-finite selection error {error}"),
        }));
    }

    let mut bytes = Vec::new();
    learner.save(&mut bytes)?;
    store.persist(Slot::Candidate(coord), &bytes)?;
    log::debug!("{coord} trained: {} epochs, error {error:.6}", summary.epochs_run);
    Ok((summary, error))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
