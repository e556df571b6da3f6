//! # Conjunto: Ensemble Training Orchestration
//!
//! Conjunto trains pools of candidate regressors in parallel, keeps the best
//! candidate of every pool, and predicts with the mean of the pool winners.
//! Whole projects pack into a single `.prj` archive and unpack back into an
//! identical directory tree.
//!
//! ## Architecture
//!
//! - **project**: Orchestrator owning project layout, data, training and archiving
//! - **train**: Parallel training rounds, candidate metrics and winner selection
//! - **storage**: Artifact slots, filesystem and in-memory backends, archives
//! - **learner**: Learner capability trait and the bundled feed-forward network
//! - **data**: CSV ingestion, learn/valid/test splits, normalization and PCA
//! - **config**: Declarative YAML configuration and command-line arguments
//! - **io**: Learner state saving and loading (JSON, YAML formats)
//!
//! ## Example
//!
//! ```no_run
//! use conjunto::{DataOptions, ProjectOrchestrator};
//!
//! let mut orch = ProjectOrchestrator::new("work", 4)?;
//! orch.load_data("db.csv", &DataOptions::from_config(orch.config()))?;
//! orch.create_project("cn", 5, 10)?;
//! let report = orch.train()?;
//! println!("{report}");
//! let predictions = orch.predict(None)?;
//! assert_eq!(predictions.nrows(), orch.dataset().map_or(0, |d| d.len()));
//! orch.save_project()?;
//! # Ok::<(), conjunto::Error>(())
//! ```

pub mod config;
pub mod data;
pub mod io;
pub mod learner;
pub mod project;
pub mod storage;
pub mod train;

pub mod error;

// Re-export commonly used types
pub use config::Config;
pub use data::{DataFrame, DataOptions, Dataset, SubsetKind};
pub use error::{Coord, Error, Result, TrainingFailure};
pub use learner::{Learner, Mlp};
pub use project::{ProjectOrchestrator, StoreBackend};
pub use storage::{ArtifactStore, FsStore, InMemoryStore};
pub use train::{CandidateStatus, TrainReport};
