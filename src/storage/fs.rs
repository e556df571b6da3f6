//! Filesystem Storage Backend
//!
//! The expanded project is a plain directory; artifacts are written to a
//! sibling temp file and renamed into place so a reader never sees a
//! half-written `model.h5`.

use std::fs;
use std::path::{Path, PathBuf};

use super::layout::ProjectTree;
use super::ArtifactStore;
use crate::error::{Error, Result};

/// Project stored as `<parent>/<name>/`
#[derive(Debug, Clone)]
pub struct FsStore {
    name: String,
    root: PathBuf,
}

impl FsStore {
    pub fn new(parent: impl AsRef<Path>, name: &str) -> Self {
        Self {
            name: name.to_string(),
            root: parent.as_ref().join(name),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|c| !c.is_empty())
            .fold(self.root.clone(), |path, c| path.join(c))
    }

    fn walk(&self, dir: &Path, prefix: &str, tree: &mut ProjectTree) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().into_string().map_err(|name| {
                Error::Project(format!("non UTF-8 file name {name:?} in project"))
            })?;
            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            let kind = entry.file_type()?;
            if kind.is_dir() {
                tree.insert_dir(&relative);
                self.walk(&entry.path(), &relative, tree)?;
            } else if kind.is_file() {
                tree.insert_file(&relative, fs::read(entry.path())?);
            }
        }
        Ok(())
    }
}

impl ArtifactStore for FsStore {
    fn project_name(&self) -> &str {
        &self.name
    }

    fn exists(&self) -> bool {
        self.root.is_dir()
    }

    fn create_dir(&self, relative: &str) -> Result<()> {
        fs::create_dir_all(self.resolve(relative))?;
        Ok(())
    }

    fn write_file(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(relative);
        let parent = path
            .parent()
            .ok_or_else(|| Error::Project(format!("no parent directory for {relative}")))?;
        fs::create_dir_all(parent)?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Project(format!("invalid file path {relative}")))?;
        let partial = parent.join(format!(".{file_name}.partial"));
        let written = fs::write(&partial, bytes).and_then(|()| fs::rename(&partial, &path));
        if let Err(e) = written {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }
        Ok(())
    }

    fn read_file(&self, relative: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(relative))?)
    }

    fn has_file(&self, relative: &str) -> bool {
        self.resolve(relative).is_file()
    }

    fn remove_file(&self, relative: &str) -> Result<()> {
        match fs::remove_file(self.resolve(relative)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn snapshot(&self) -> Result<ProjectTree> {
        if !self.exists() {
            return Err(Error::Project(format!(
                "project directory {} does not exist",
                self.root.display()
            )));
        }
        let mut tree = ProjectTree::new();
        self.walk(&self.root, "", &mut tree)?;
        Ok(tree)
    }

    fn restore(&self, tree: &ProjectTree) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        for dir in &tree.dirs {
            self.create_dir(dir)?;
        }
        for (path, bytes) in &tree.files {
            fs::write(self.resolve(path), bytes)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }
}
