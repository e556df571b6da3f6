//! Training rounds
//!
//! This module turns a project topology into trained pools:
//! - Dispatcher: fans candidates out over a bounded worker pool
//! - Selector: ranks trained candidates and picks one winner per pool
//! - Metrics: regression error measures used for ranking
//! - Reports: per-candidate status, errors and failures of a round
//!
//! # Example
//!
//! ```
//! use conjunto::train::pick_winner;
//!
//! assert_eq!(pick_winner(&[Some(0.9), Some(0.1), Some(0.5)]), Some(1));
//! assert_eq!(pick_winner(&[Some(0.1), Some(0.1)]), Some(0));
//! ```

mod dispatcher;
mod metrics;
mod report;
mod selector;


pub use dispatcher::{JobOutcome, RoundState, TrainingDispatcher};
pub use metrics::{metric_for, selection_error, MedianAE, Metric, R2Score, MAE, RMSE};
pub use report::{CandidateReport, CandidateStatus, PoolReport, TrainReport};
pub use selector::{evaluate, pick_winner, select_winners};
