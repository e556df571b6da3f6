//! Project tree layout
//!
//! ```text
//! <project>/
//!   config.yml
//!   project.yml
//!   dataset.json          split rows of the last training round
//!   pool_0/
//!     model.h5            winner artifact
//!     candidate_0/
//!       model.h5          candidate artifact
//! ```
//!
//! Paths inside a tree are relative and `/`-separated regardless of platform.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::CONFIG_FILE;
use crate::error::Coord;

/// File name of every persisted learner
pub const ARTIFACT_FILE: &str = "model.h5";

/// Project manifest at the project root
pub const MANIFEST_FILE: &str = "project.yml";

/// Learn, valid and test rows the winners were trained on
pub const DATASET_FILE: &str = "dataset.json";

const POOL_PREFIX: &str = "pool_";
const CANDIDATE_PREFIX: &str = "candidate_";

/// Where an artifact lives: a candidate's own slot, or its pool's winner slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    Candidate(Coord),
    Winner(usize),
}

impl Slot {
    /// Directory of the slot, relative to the project root
    pub fn dir(&self) -> String {
        match self {
            Slot::Candidate(coord) => format!(
                "{POOL_PREFIX}{}/{CANDIDATE_PREFIX}{}",
                coord.pool, coord.candidate
            ),
            Slot::Winner(pool) => format!("{POOL_PREFIX}{pool}"),
        }
    }

    /// Artifact file of the slot, relative to the project root
    pub fn artifact_path(&self) -> String {
        format!("{}/{ARTIFACT_FILE}", self.dir())
    }
}

/// Full contents of an expanded project: every directory and every file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectTree {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
}

impl ProjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directory and all of its ancestors
    pub fn insert_dir(&mut self, relative: &str) {
        let mut prefix = String::new();
        for component in relative.split('/').filter(|c| !c.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(component);
            self.dirs.insert(prefix.clone());
        }
    }

    /// Record a file, creating its parent directories
    pub fn insert_file(&mut self, relative: &str, bytes: Vec<u8>) {
        if let Some((parent, _)) = relative.rsplit_once('/') {
            self.insert_dir(parent);
        }
        self.files.insert(relative.to_string(), bytes);
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|b| b.len() as u64).sum()
    }
}

/// Reject absolute paths, empty components and `.`/`..` traversal
pub fn check_relative(path: &str) -> Result<(), String> {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        return Err(format!("illegal path {path:?}"));
    }
    if path
        .split('/')
        .any(|c| c.is_empty() || c == "." || c == "..")
    {
        return Err(format!("illegal path {path:?}"));
    }
    Ok(())
}

fn parse_index(component: &str, prefix: &str) -> Option<usize> {
    let index: usize = component.strip_prefix(prefix)?.parse().ok()?;
    // reject `pool_01` and friends so names map back to exactly one index
    (format!("{prefix}{index}") == component).then_some(index)
}

/// Validate a tree against the project layout and return `(pools, candidates)`
///
/// Pools and candidates must be numbered contiguously from zero, every pool
/// must hold the same candidate count, and the only files allowed are the
/// config, the manifest and `model.h5` artifacts inside known slots.
pub fn topology(tree: &ProjectTree) -> Result<(usize, usize), String> {
    let mut pools: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();

    for dir in &tree.dirs {
        check_relative(dir)?;
        let parts: Vec<&str> = dir.split('/').collect();
        let pool = parse_index(parts[0], POOL_PREFIX)
            .ok_or_else(|| format!("unexpected directory {dir:?}"))?;
        let candidates = pools.entry(pool).or_default();
        match parts.as_slice() {
            [_] => {}
            [_, candidate] => {
                let candidate = parse_index(candidate, CANDIDATE_PREFIX)
                    .ok_or_else(|| format!("unexpected directory {dir:?}"))?;
                candidates.insert(candidate);
            }
            _ => return Err(format!("unexpected directory {dir:?}")),
        }
    }

    if pools.is_empty() {
        return Err("no pool directories".to_string());
    }
    if pools.keys().copied().ne(0..pools.len()) {
        return Err("pool directories are not numbered 0..n".to_string());
    }
    let candidate_count = pools[&0].len();
    if candidate_count == 0 {
        return Err("pool_0 has no candidate directories".to_string());
    }
    for (pool, candidates) in &pools {
        if candidates.iter().copied().ne(0..candidate_count) {
            return Err(format!(
                "pool_{pool} does not hold candidates 0..{candidate_count}"
            ));
        }
    }

    if !tree.files.contains_key(MANIFEST_FILE) {
        return Err(format!("missing {MANIFEST_FILE}"));
    }
    for path in tree.files.keys() {
        check_relative(path)?;
        let allowed = match path.rsplit_once('/') {
            None => [CONFIG_FILE, MANIFEST_FILE, DATASET_FILE].contains(&path.as_str()),
            Some((dir, file)) => file == ARTIFACT_FILE && tree.dirs.contains(dir),
        };
        if !allowed {
            return Err(format!("unexpected file {path:?}"));
        }
    }

    Ok((pools.len(), candidate_count))
}
