//! Project orchestration
//!
//! A [`ProjectOrchestrator`] owns one working directory, its `config.yml`
//! sidecar, a worker pool, at most one open project and at most one loaded
//! dataset. A project lives either expanded as `<workdir>/<name>/` or packed
//! as `<workdir>/<name>.prj`, never both.

mod manifest;

#[cfg(test)]
mod tests;

pub use manifest::{DatasetRecord, Manifest};

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::config::{load_or_default, save_config, validate_config, Config, CONFIG_FILE};
use crate::data::{load_csv, DataFrame, DataOptions, Dataset, SubsetKind};
use crate::error::{Coord, Error, Result};
use crate::learner::{Learner, Mlp};
use crate::storage::{
    archive_path, ArtifactStore, FsStore, InMemoryStore, Slot, DATASET_FILE, MANIFEST_FILE,
};
use crate::train::{select_winners, CandidateStatus, TrainReport, TrainingDispatcher};

/// Where expanded projects are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// `<workdir>/<name>/` on disk
    #[default]
    Filesystem,
    /// Process memory; only the packed archive touches the disk
    Memory,
}

impl StoreBackend {
    fn open(self, workdir: &Path, name: &str) -> Box<dyn ArtifactStore> {
        match self {
            StoreBackend::Filesystem => Box::new(FsStore::new(workdir, name)),
            StoreBackend::Memory => Box::new(InMemoryStore::new(name)),
        }
    }
}

struct OpenProject {
    store: Box<dyn ArtifactStore>,
    manifest: Manifest,
}

/// Creates, trains, queries and archives ensemble projects
///
/// `L` is the learner trained in every candidate slot.
pub struct ProjectOrchestrator<L: Learner = Mlp> {
    workdir: PathBuf,
    config: Config,
    backend: StoreBackend,
    dispatcher: TrainingDispatcher,
    project: Option<OpenProject>,
    dataset: Option<Dataset>,
    _learner: PhantomData<fn() -> L>,
}

impl<L: Learner> std::fmt::Debug for ProjectOrchestrator<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectOrchestrator")
            .field("workdir", &self.workdir)
            .field("backend", &self.backend)
            .field("dispatcher", &self.dispatcher)
            .field("project", &self.project_name())
            .field("dataset", &self.dataset.as_ref().map(|d| &d.source))
            .finish()
    }
}

fn check_name(name: &str) -> Result<()> {
    let legal = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.ends_with(".prj");
    if legal {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!("illegal project name {name:?}")))
    }
}

impl ProjectOrchestrator<Mlp> {
    /// Open `workdir` with `processes` training workers, training [`Mlp`]s
    ///
    /// Loads `<workdir>/config.yml`, regenerating it with defaults when
    /// missing, and records the worker count in it.
    pub fn new(workdir: impl AsRef<Path>, processes: usize) -> Result<Self> {
        Self::with_learner(workdir, processes)
    }

    /// Open `workdir` with the worker count its `config.yml` already records
    ///
    /// An existing config file is left as it is.
    pub fn open(workdir: impl AsRef<Path>) -> Result<Self> {
        let workdir = workdir.as_ref();
        std::fs::create_dir_all(workdir)?;
        let processes = load_or_default(workdir.join(CONFIG_FILE))?.process_count;
        Self::new(workdir, processes)
    }
}

impl<L: Learner> ProjectOrchestrator<L> {
    /// Like [`ProjectOrchestrator::new`], training learners of type `L`
    pub fn with_learner(workdir: impl AsRef<Path>, processes: usize) -> Result<Self> {
        if processes == 0 {
            return Err(Error::InvalidParameter(
                "process count must be at least 1".to_string(),
            ));
        }
        let workdir = workdir.as_ref().to_path_buf();
        std::fs::create_dir_all(&workdir)?;

        let config_path = workdir.join(CONFIG_FILE);
        let mut config = load_or_default(&config_path)?;
        if config.process_count != processes {
            config.process_count = processes;
            save_config(&config, &config_path)?;
        }

        let dispatcher = TrainingDispatcher::new(processes)?;
        log::info!(
            "Orchestrator ready in {} with {processes} worker(s)",
            workdir.display()
        );
        Ok(Self {
            workdir,
            config,
            backend: StoreBackend::default(),
            dispatcher,
            project: None,
            dataset: None,
            _learner: PhantomData,
        })
    }

    /// Keep expanded projects in `backend` instead of on disk
    pub fn with_backend(mut self, backend: StoreBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the configuration between rounds
    ///
    /// The worker count is fixed at construction and kept as is. The new
    /// config is written to the working directory and to the open project.
    pub fn set_config(&mut self, mut config: Config) -> Result<()> {
        config.process_count = self.dispatcher.workers();
        validate_config(&config).map_err(|e| Error::ConfigError(format!("Invalid config: {e}")))?;
        save_config(&config, self.workdir.join(CONFIG_FILE))?;
        self.config = config;
        if let Some(project) = &self.project {
            write_config(project.store.as_ref(), &self.config)?;
        }
        Ok(())
    }

    pub fn project_name(&self) -> Option<&str> {
        self.project.as_ref().map(|p| p.manifest.name.as_str())
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.project.as_ref().map(|p| &p.manifest)
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    /// `(pools, candidates)` of the open project
    pub fn topology(&self) -> Option<(usize, usize)> {
        self.manifest().map(|m| (m.pools, m.candidates))
    }

    /// Winning candidate per pool of the open project
    pub fn winners(&self) -> Vec<Option<usize>> {
        self.manifest().map(|m| m.winners.clone()).unwrap_or_default()
    }

    /// Path of the expanded project directory for `name`
    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.workdir.join(name)
    }

    /// Path of the packed archive for `name`
    pub fn archive_path(&self, name: &str) -> PathBuf {
        archive_path(&self.workdir, name)
    }

    /// Create `<name>/pool_i/candidate_j` for every pool and candidate
    pub fn create_project(&mut self, name: &str, pools: usize, candidates: usize) -> Result<()> {
        if pools == 0 || candidates == 0 {
            return Err(Error::InvalidTopology { pools, candidates });
        }
        check_name(name)?;
        if self.project_dir(name).exists() || self.archive_path(name).exists() {
            return Err(Error::Project(format!("project {name} already exists")));
        }
        if self.project_name() == Some(name) {
            return Err(Error::Project(format!("project {name} is already open")));
        }

        let store = self.backend.open(&self.workdir, name);
        let manifest = Manifest::new(name, pools, candidates);
        store.create_layout(pools, candidates)?;
        write_config(store.as_ref(), &self.config)?;
        write_manifest(store.as_ref(), &manifest)?;

        log::info!("Created project {name}: {pools} pools x {candidates} candidates");
        self.project = Some(OpenProject { store, manifest });
        Ok(())
    }

    /// Load a two-header CSV database as the current dataset
    pub fn load_data(&mut self, path: impl AsRef<Path>, options: &DataOptions) -> Result<()> {
        let dataset = load_csv(path, options)?;
        self.dataset = Some(dataset);
        Ok(())
    }

    /// Use an in-memory frame as the current dataset
    pub fn load_frame(&mut self, frame: &DataFrame, options: &DataOptions) -> Result<()> {
        let dataset = Dataset::from_frame(frame, options, "in-memory frame")?;
        self.dataset = Some(dataset);
        Ok(())
    }

    /// Train every candidate, pick one winner per pool and promote it
    ///
    /// Blocks until every candidate has finished. Candidate failures are
    /// reported, not raised; earlier artifacts are discarded first so a
    /// retrain never mixes rounds.
    pub fn train(&mut self) -> Result<TrainReport> {
        let project = self
            .project
            .as_mut()
            .ok_or_else(|| Error::Project("no project is open".to_string()))?;
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| Error::Data("no dataset loaded".to_string()))?;
        validate_config(&self.config)
            .map_err(|e| Error::ConfigError(format!("Invalid config: {e}")))?;

        let (pools, candidates) = (project.manifest.pools, project.manifest.candidates);
        let store = project.store.as_ref();
        let coords: Vec<Coord> = (0..pools)
            .flat_map(|p| (0..candidates).map(move |c| Coord::new(p, c)))
            .collect();
        for &coord in &coords {
            store.discard(Slot::Candidate(coord))?;
        }
        for pool in 0..pools {
            store.discard(Slot::Winner(pool))?;
        }

        log::info!(
            "Training {}: {} candidates on {} rows",
            project.manifest.name,
            coords.len(),
            dataset.len()
        );
        let outcomes = self
            .dispatcher
            .run_round::<L>(&coords, dataset, &self.config, store);
        let report = select_winners(pools, candidates, &outcomes, self.config.selection_metric);

        for (pool, winner) in report.winners().into_iter().enumerate() {
            if let Some(candidate) = winner {
                store.promote(Coord::new(pool, candidate))?;
            }
        }

        project.manifest.record_round(&report, dataset);
        write_config(store, &self.config)?;
        write_dataset(store, dataset)?;
        write_manifest(store, &project.manifest)?;
        Ok(report)
    }

    /// Mean prediction of every pool winner over all rows of `dataset`
    ///
    /// Uses the loaded dataset when `None`. Rows come out in learn, valid,
    /// test order; the result has one row per dataset row.
    pub fn predict(&self, dataset: Option<&Dataset>) -> Result<Array2<f32>> {
        self.require_trained()?;
        let dataset = dataset
            .or(self.dataset.as_ref())
            .ok_or_else(|| Error::Data("no dataset loaded".to_string()))?;
        let inputs = dataset.subset(SubsetKind::All).inputs;
        self.ensemble(&inputs)
    }

    /// Mean prediction over one subset of the loaded dataset
    pub fn predict_subset(&self, kind: SubsetKind) -> Result<Array2<f32>> {
        self.require_trained()?;
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| Error::Data("no dataset loaded".to_string()))?;
        self.ensemble(&dataset.subset(kind).inputs)
    }

    /// Mean prediction for raw rows, mapped through the fitted preprocessing
    ///
    /// Uses the preprocessing the winners were trained with, as recorded in
    /// the project; the loaded dataset's only when the project has no record.
    pub fn predict_frame(&self, frame: &DataFrame) -> Result<Array2<f32>> {
        let project = self.require_trained()?;
        let inputs = match (project.manifest.dataset.as_ref(), &self.dataset) {
            (Some(record), _) => record.preprocessor.apply(&frame.inputs)?,
            (None, Some(dataset)) => dataset.prepare_inputs(frame)?,
            (None, None) => return Err(Error::Data("no preprocessing available".to_string())),
        };
        self.ensemble(&inputs)
    }

    fn require_trained(&self) -> Result<&OpenProject> {
        self.project
            .as_ref()
            .filter(|p| p.manifest.winning_pools().next().is_some())
            .ok_or(Error::NotTrained)
    }

    fn ensemble(&self, inputs: &Array2<f32>) -> Result<Array2<f32>> {
        let project = self.require_trained()?;
        let mut sum: Option<Array2<f32>> = None;
        let mut count = 0usize;
        for (pool, _) in project.manifest.winning_pools() {
            let bytes = project.store.retrieve(Slot::Winner(pool))?;
            let learner = L::load(&mut bytes.as_slice())?;
            let prediction = learner.predict(inputs)?;
            if prediction.nrows() != inputs.nrows() {
                return Err(Error::Data(format!(
                    "pool_{pool} predicted {} rows for {} inputs",
                    prediction.nrows(),
                    inputs.nrows()
                )));
            }
            sum = Some(match sum {
                None => prediction,
                Some(acc) if acc.dim() == prediction.dim() => acc + &prediction,
                Some(acc) => {
                    return Err(Error::Data(format!(
                        "pool_{pool} predicted {:?}, other pools {:?}",
                        prediction.dim(),
                        acc.dim()
                    )))
                }
            });
            count += 1;
        }
        let sum = sum.ok_or(Error::NotTrained)?;
        log::debug!("Averaged {count} pool winners over {} rows", inputs.nrows());
        Ok(sum / count as f32)
    }

    /// Pack the open project into `<name>.prj` and remove its directory
    ///
    /// The archive is verified before the directory is removed; on failure
    /// the directory stays and no archive is left behind.
    pub fn save_project(&mut self) -> Result<PathBuf> {
        let project = self
            .project
            .as_ref()
            .ok_or_else(|| Error::Project("no project is open".to_string()))?;
        let name = project.manifest.name.clone();
        if !project.store.exists() {
            return Err(Error::Project(format!("project {name} is not expanded")));
        }
        let archive = self.archive_path(&name);
        if archive.exists() {
            return Err(Error::Project(format!(
                "archive {} already exists",
                archive.display()
            )));
        }

        write_manifest(project.store.as_ref(), &project.manifest)?;
        let summary = project.store.pack(&archive)?;
        project.store.clear()?;
        self.project = None;

        log::info!(
            "Saved project {name} to {} ({} files, {} bytes)",
            archive.display(),
            summary.files,
            summary.bytes
        );
        Ok(archive)
    }

    /// Unpack `<name>.prj`, restore its state and remove the archive
    ///
    /// The rows the project was last trained on become the loaded dataset.
    pub fn load_project(&mut self, name: &str) -> Result<()> {
        check_name(name)?;
        let archive = self.archive_path(name);
        if !archive.exists() {
            return Err(Error::Project(format!(
                "no archive {} to load",
                archive.display()
            )));
        }
        if self.project_dir(name).exists() || self.project_name() == Some(name) {
            return Err(Error::Project(format!("project {name} is already expanded")));
        }

        let store = self.backend.open(&self.workdir, name);
        let (summary, (pools, candidates)) = store.unpack(&archive)?;
        let restored = restore_state(store.as_ref(), pools, candidates)
            .map_err(|reason| Error::corrupt(&archive, reason));
        let (manifest, config, dataset) = match restored {
            Ok(state) => state,
            Err(e) => {
                store.clear()?;
                return Err(e);
            }
        };
        std::fs::remove_file(&archive)?;

        if let Some(mut config) = config {
            config.process_count = self.dispatcher.workers();
            save_config(&config, self.workdir.join(CONFIG_FILE))?;
            self.config = config;
        }
        if let Some(dataset) = dataset {
            self.dataset = Some(dataset);
        }
        log::info!(
            "Loaded project {name}: {pools} pools x {candidates} candidates, {} files",
            summary.files
        );
        self.project = Some(OpenProject { store, manifest });
        Ok(())
    }
}

fn write_config(store: &dyn ArtifactStore, config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config)
        .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))?;
    store.write_file(CONFIG_FILE, yaml.as_bytes())
}

fn write_dataset(store: &dyn ArtifactStore, dataset: &Dataset) -> Result<()> {
    let json = serde_json::to_vec(dataset)
        .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?;
    store.write_file(DATASET_FILE, &json)
}

fn write_manifest(store: &dyn ArtifactStore, manifest: &Manifest) -> Result<()> {
    store.write_file(MANIFEST_FILE, manifest.to_yaml()?.as_bytes())
}

type RestoredState = (Manifest, Option<Config>, Option<Dataset>);

/// Manifest, project config and training rows of a freshly unpacked project
fn restore_state(
    store: &dyn ArtifactStore,
    pools: usize,
    candidates: usize,
) -> std::result::Result<RestoredState, String> {
    let text = store.read_file(MANIFEST_FILE).map_err(|e| e.to_string())?;
    let text = String::from_utf8(text).map_err(|_| "manifest is not UTF-8".to_string())?;
    let manifest = Manifest::from_yaml(&text).map_err(|e| e.to_string())?;
    manifest.check(pools, candidates)?;
    for (pool, winner) in manifest.winning_pools() {
        if !store.contains(Slot::Winner(pool)) {
            return Err(format!("pool_{pool} winner artifact is missing"));
        }
        if !store.contains(Slot::Candidate(Coord::new(pool, winner))) {
            return Err(format!("pool_{pool}/candidate_{winner} artifact is missing"));
        }
    }
    for (pool, statuses) in manifest.statuses.iter().enumerate() {
        for (candidate, status) in statuses.iter().enumerate() {
            let coord = Coord::new(pool, candidate);
            if *status == CandidateStatus::Trained && !store.contains(Slot::Candidate(coord)) {
                return Err(format!("{coord} artifact is missing"));
            }
        }
    }

    let config = if store.has_file(CONFIG_FILE) {
        let bytes = store.read_file(CONFIG_FILE).map_err(|e| e.to_string())?;
        let config: Config =
            serde_yaml::from_slice(&bytes).map_err(|e| format!("unreadable {CONFIG_FILE}: {e}"))?;
        validate_config(&config).map_err(|e| format!("invalid {CONFIG_FILE}: {e}"))?;
        Some(config)
    } else {
        None
    };

    let dataset = if store.has_file(DATASET_FILE) {
        let bytes = store.read_file(DATASET_FILE).map_err(|e| e.to_string())?;
        let dataset: Dataset = serde_json::from_slice(&bytes)
            .map_err(|e| format!("unreadable {DATASET_FILE}: {e}"))?;
        Some(dataset)
    } else {
        None
    };
    Ok((manifest, config, dataset))
}
