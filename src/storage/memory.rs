//! In-Memory Storage Backend
//!
//! Provides an in-memory implementation of `ArtifactStore` for testing and
//! for runs that should leave nothing on disk except the packed archive.

use std::io;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::layout::ProjectTree;
use super::ArtifactStore;
use crate::error::{Error, Result};

/// In-memory project store
///
/// `None` means the expanded project does not exist (never created, or
/// cleared after packing).
#[derive(Debug)]
pub struct InMemoryStore {
    name: String,
    tree: RwLock<Option<ProjectTree>>,
}

impl InMemoryStore {
    /// Create a store for `name`; the project starts out absent
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tree: RwLock::new(None),
        }
    }

    /// Number of files currently held
    pub fn file_count(&self) -> usize {
        self.read()
            .map(|tree| tree.as_ref().map_or(0, |t| t.files.len()))
            .unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Option<ProjectTree>>> {
        self.tree
            .read()
            .map_err(|_| Error::Project("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Option<ProjectTree>>> {
        self.tree
            .write()
            .map_err(|_| Error::Project("in-memory store lock poisoned".to_string()))
    }

    fn missing(&self, relative: &str) -> Error {
        Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{}/{relative} not found", self.name),
        ))
    }
}

impl ArtifactStore for InMemoryStore {
    fn project_name(&self) -> &str {
        &self.name
    }

    fn exists(&self) -> bool {
        self.read().map(|tree| tree.is_some()).unwrap_or(false)
    }

    fn create_dir(&self, relative: &str) -> Result<()> {
        self.write()?
            .get_or_insert_with(ProjectTree::new)
            .insert_dir(relative);
        Ok(())
    }

    fn write_file(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        self.write()?
            .get_or_insert_with(ProjectTree::new)
            .insert_file(relative, bytes.to_vec());
        Ok(())
    }

    fn read_file(&self, relative: &str) -> Result<Vec<u8>> {
        self.read()?
            .as_ref()
            .and_then(|tree| tree.files.get(relative).cloned())
            .ok_or_else(|| self.missing(relative))
    }

    fn has_file(&self, relative: &str) -> bool {
        self.read()
            .map(|tree| tree.as_ref().is_some_and(|t| t.files.contains_key(relative)))
            .unwrap_or(false)
    }

    fn remove_file(&self, relative: &str) -> Result<()> {
        if let Some(tree) = self.write()?.as_mut() {
            tree.files.remove(relative);
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<ProjectTree> {
        self.read()?
            .clone()
            .ok_or_else(|| Error::Project(format!("project {} does not exist", self.name)))
    }

    fn restore(&self, tree: &ProjectTree) -> Result<()> {
        *self.write()? = Some(tree.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.write()? = None;
        Ok(())
    }
}
