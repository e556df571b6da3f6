//! Project Artifact Storage
//!
//! Provides the `ArtifactStore` trait and backends for persisting a project's
//! tree of trained learners, config and manifest.
//!
//! # Backends
//!
//! - `FsStore`: expanded project directory on disk
//! - `InMemoryStore`: in-memory tree for testing
//!
//! Both pack to and unpack from the same `.prj` archive format.
//!
//! # Example
//!
//! ```
//! use conjunto::storage::{ArtifactStore, InMemoryStore, Slot};
//! use conjunto::Coord;
//!
//! let store = InMemoryStore::new("demo");
//! store.create_layout(2, 3).unwrap();
//! let coord = Coord::new(1, 2);
//! store.persist(Slot::Candidate(coord), b"weights").unwrap();
//! store.promote(coord).unwrap();
//! assert_eq!(store.retrieve(Slot::Winner(1)).unwrap(), b"weights");
//! ```

pub mod archive;
pub mod fs;
pub mod layout;
pub mod memory;

pub use archive::{archive_path, ArchiveSummary, ARCHIVE_EXTENSION};
pub use fs::FsStore;
pub use layout::{ProjectTree, Slot, ARTIFACT_FILE, DATASET_FILE, MANIFEST_FILE};
pub use memory::InMemoryStore;

use std::path::Path;

use crate::error::{Coord, Error, Result};

/// Trait for project storage backends
///
/// Backends implement a handful of file primitives over `/`-separated paths
/// relative to the project root; slot handling and archiving are provided on
/// top of them.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: training workers persist their
/// candidates concurrently, each into its own slot.
pub trait ArtifactStore: Send + Sync {
    /// Name of the project this store holds
    fn project_name(&self) -> &str;

    /// Whether the expanded project exists
    fn exists(&self) -> bool;

    /// Create a directory and its ancestors
    fn create_dir(&self, relative: &str) -> Result<()>;

    /// Replace a file's contents in one step
    fn write_file(&self, relative: &str, bytes: &[u8]) -> Result<()>;

    fn read_file(&self, relative: &str) -> Result<Vec<u8>>;

    fn has_file(&self, relative: &str) -> bool;

    /// Remove a file; removing a missing file is not an error
    fn remove_file(&self, relative: &str) -> Result<()>;

    /// Every directory and file of the expanded project
    fn snapshot(&self) -> Result<ProjectTree>;

    /// Materialize a tree as the expanded project
    fn restore(&self, tree: &ProjectTree) -> Result<()>;

    /// Remove the expanded project entirely
    fn clear(&self) -> Result<()>;

    /// Create `pool_i/candidate_j` for every pool and candidate
    fn create_layout(&self, pools: usize, candidates: usize) -> Result<()> {
        if pools == 0 || candidates == 0 {
            return Err(Error::InvalidTopology { pools, candidates });
        }
        for pool in 0..pools {
            for candidate in 0..candidates {
                self.create_dir(&Slot::Candidate(Coord::new(pool, candidate)).dir())?;
            }
        }
        Ok(())
    }

    /// Store an artifact in its slot
    fn persist(&self, slot: Slot, bytes: &[u8]) -> Result<()> {
        self.write_file(&slot.artifact_path(), bytes)
    }

    fn retrieve(&self, slot: Slot) -> Result<Vec<u8>> {
        self.read_file(&slot.artifact_path())
    }

    fn contains(&self, slot: Slot) -> bool {
        self.has_file(&slot.artifact_path())
    }

    /// Drop whatever artifact a slot holds
    fn discard(&self, slot: Slot) -> Result<()> {
        self.remove_file(&slot.artifact_path())
    }

    /// Copy a candidate's artifact to its pool's winner slot
    fn promote(&self, coord: Coord) -> Result<()> {
        let bytes = self.retrieve(Slot::Candidate(coord))?;
        self.persist(Slot::Winner(coord.pool), &bytes)
    }

    /// Pack the expanded project into `archive`
    ///
    /// Trees that [`ArtifactStore::unpack`] would reject are refused with
    /// nothing written. The archive is re-read and checked against the tree
    /// before returning.
    fn pack(&self, archive: &Path) -> Result<ArchiveSummary> {
        let tree = self.snapshot()?;
        layout::topology(&tree).map_err(|reason| {
            Error::Project(format!("cannot pack {}: {reason}", self.project_name()))
        })?;
        archive::write(archive, self.project_name(), &tree)?;
        match archive::verify(archive, &tree) {
            Ok(summary) => Ok(summary),
            Err(e) => {
                let _ = std::fs::remove_file(archive);
                Err(e)
            }
        }
    }

    /// Expand `archive` into the project, validating its layout first
    ///
    /// Returns the summary and the `(pools, candidates)` topology found.
    fn unpack(&self, archive: &Path) -> Result<(ArchiveSummary, (usize, usize))> {
        if self.exists() {
            return Err(Error::Project(format!(
                "project {} is already expanded",
                self.project_name()
            )));
        }
        let (summary, tree) = archive::read(archive)?;
        let topology =
            layout::topology(&tree).map_err(|reason| Error::corrupt(archive, reason))?;
        self.restore(&tree)?;
        Ok((summary, topology))
    }
}
