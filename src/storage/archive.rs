//! `.prj` project archives
//!
//! Layout:
//!
//! ```text
//! b"PRJ\0" | version: u32 LE | header_len: u64 LE | header (JSON) | data
//! ```
//!
//! The header lists every directory (so empty ones survive) and every file
//! with its offset and length into the data section plus a SHA-256 digest.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::layout::{check_relative, ProjectTree};
use crate::error::{Error, Result};

/// File extension of project archives
pub const ARCHIVE_EXTENSION: &str = "prj";

pub const FORMAT_VERSION: u32 = 1;

const MAGIC: &[u8; 4] = b"PRJ\0";
const PREAMBLE_LEN: usize = 4 + 4 + 8;

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveHeader {
    project: String,
    directories: Vec<String>,
    files: Vec<FileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    path: String,
    offset: u64,
    length: u64,
    sha256: String,
}

/// What an archive holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub project: String,
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}

/// `<parent>/<name>.prj`
pub fn archive_path(parent: &Path, name: &str) -> PathBuf {
    parent.join(format!("{name}.{ARCHIVE_EXTENSION}"))
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn summary(project: &str, tree: &ProjectTree) -> ArchiveSummary {
    ArchiveSummary {
        project: project.to_string(),
        directories: tree.dirs.len(),
        files: tree.files.len(),
        bytes: tree.total_bytes(),
    }
}

/// Serialize a project tree into archive bytes
pub fn encode(project: &str, tree: &ProjectTree) -> Result<Vec<u8>> {
    let mut offset = 0u64;
    let files = tree
        .files
        .iter()
        .map(|(path, bytes)| {
            let entry = FileEntry {
                path: path.clone(),
                offset,
                length: bytes.len() as u64,
                sha256: digest(bytes),
            };
            offset += bytes.len() as u64;
            entry
        })
        .collect();
    let header = ArchiveHeader {
        project: project.to_string(),
        directories: tree.dirs.iter().cloned().collect(),
        files,
    };
    let header = serde_json::to_vec(&header).map_err(|e| Error::Serialization(e.to_string()))?;

    let mut out = Vec::with_capacity(PREAMBLE_LEN + header.len() + offset as usize);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(header.len() as u64).to_le_bytes());
    out.extend_from_slice(&header);
    for bytes in tree.files.values() {
        out.extend_from_slice(bytes);
    }
    Ok(out)
}

/// Parse archive bytes back into a project name and tree
///
/// Every structural problem is reported as a plain reason string; callers
/// attach the archive path.
pub fn decode(bytes: &[u8]) -> std::result::Result<(String, ProjectTree), String> {
    if bytes.len() < PREAMBLE_LEN {
        return Err("truncated preamble".to_string());
    }
    if &bytes[..4] != MAGIC {
        return Err("bad magic".to_string());
    }
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[4..8]);
    let version = u32::from_le_bytes(word);
    if version != FORMAT_VERSION {
        return Err(format!("unsupported format version {version}"));
    }
    let mut dword = [0u8; 8];
    dword.copy_from_slice(&bytes[8..16]);
    let header_len = usize::try_from(u64::from_le_bytes(dword))
        .map_err(|_| "header length overflows".to_string())?;

    let body = &bytes[PREAMBLE_LEN..];
    if header_len > body.len() {
        return Err("header runs past end of archive".to_string());
    }
    let (header, data) = body.split_at(header_len);
    let header: ArchiveHeader =
        serde_json::from_slice(header).map_err(|e| format!("unreadable header: {e}"))?;

    let mut tree = ProjectTree::new();
    for dir in &header.directories {
        check_relative(dir)?;
        tree.insert_dir(dir);
    }

    let mut seen = BTreeSet::new();
    for entry in &header.files {
        check_relative(&entry.path)?;
        if !seen.insert(entry.path.as_str()) {
            return Err(format!("duplicate entry {:?}", entry.path));
        }
        let start = usize::try_from(entry.offset).map_err(|_| "offset overflows".to_string())?;
        let len = usize::try_from(entry.length).map_err(|_| "length overflows".to_string())?;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| format!("{:?} runs past end of archive", entry.path))?;
        let contents = &data[start..end];
        if digest(contents) != entry.sha256 {
            return Err(format!("checksum mismatch for {:?}", entry.path));
        }
        tree.insert_file(&entry.path, contents.to_vec());
    }

    Ok((header.project, tree))
}

/// Write an archive next to its final location, then move it into place
///
/// A failed write leaves no partial archive behind.
pub fn write(path: &Path, project: &str, tree: &ProjectTree) -> Result<ArchiveSummary> {
    let bytes = encode(project, tree)?;
    let partial = path.with_extension(format!("{ARCHIVE_EXTENSION}.partial"));
    let written = fs::File::create(&partial)
        .and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&partial, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    Ok(summary(project, tree))
}

/// Read and fully validate an archive
pub fn read(path: &Path) -> Result<(ArchiveSummary, ProjectTree)> {
    let bytes = fs::read(path)?;
    let (project, tree) = decode(&bytes).map_err(|reason| Error::corrupt(path, reason))?;
    Ok((summary(&project, &tree), tree))
}

/// Re-read an archive and confirm it holds exactly `expected`
pub fn verify(path: &Path, expected: &ProjectTree) -> Result<ArchiveSummary> {
    let (summary, tree) = read(path)?;
    if &tree != expected {
        return Err(Error::corrupt(path, "archive contents differ from project tree"));
    }
    Ok(summary)
}
