// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Filesystem access behind a trait so the resource walkers can run against
//! memory in tests

use std::collections::{BTreeMap, HashSet};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One entry returned by [`FileSystem::read_dir`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl DirEntry {
    /// Last path component, lossily converted
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// The filesystem operations the resource tree code needs
pub trait FileSystem: Send + Sync {
    fn is_dir(&self, path: &Path) -> bool;

    fn exists(&self, path: &Path) -> bool;

    /// Entries directly under `path`, sorted by name
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create a file, failing with `AlreadyExists` if it is already there
    fn create_new(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// The real disk
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn exists(&self, path: &Path) -> bool {
        // symlink_metadata so dangling links still count as present
        std::fs::symlink_metadata(path).is_ok()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let is_dir = entry.file_type()?.is_dir();
            entries.push(DirEntry { path: entry.path(), is_dir });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }

    fn create_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(contents)
    }
}

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
}

#[derive(Debug, Default)]
struct MemoryState {
    nodes: BTreeMap<PathBuf, Node>,
    protected: HashSet<PathBuf>,
}

/// In-memory tree for unit tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    state: Mutex<MemoryState>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a file, creating every missing parent directory
    pub fn add_file(&self, path: impl AsRef<Path>, contents: &[u8]) {
        let path = path.as_ref();
        let mut state = self.lock();
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            state.nodes.insert(ancestor.to_path_buf(), Node::Dir);
        }
        state.nodes.insert(path.to_path_buf(), Node::File(contents.to_vec()));
    }

    /// Add an empty directory (and its parents)
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        for ancestor in path.as_ref().ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            state.nodes.insert(ancestor.to_path_buf(), Node::Dir);
        }
    }

    /// Make removals of `path` fail with `PermissionDenied`
    pub fn protect(&self, path: impl AsRef<Path>) {
        self.lock().protected.insert(path.as_ref().to_path_buf());
    }

    /// Every file path currently stored, sorted
    pub fn files(&self) -> Vec<PathBuf> {
        self.lock()
            .nodes
            .iter()
            .filter(|(_, node)| matches!(node, Node::File(_)))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Contents of a stored file
    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().nodes.get(path.as_ref()) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(ErrorKind::NotFound, format!("{} not found", path.display()))
}

fn denied(path: &Path) -> io::Error {
    io::Error::new(ErrorKind::PermissionDenied, format!("{} is protected", path.display()))
}

impl FileSystem for MemoryFileSystem {
    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().nodes.get(path), Some(Node::Dir))
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().nodes.contains_key(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let state = self.lock();
        match state.nodes.get(path) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => {
                return Err(io::Error::new(
                    ErrorKind::Other,
                    format!("{} is not a directory", path.display()),
                ))
            }
            None => return Err(not_found(path)),
        }
        if state.protected.contains(path) {
            return Err(denied(path));
        }
        Ok(state
            .nodes
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .map(|(p, node)| DirEntry {
                path: p.clone(),
                is_dir: matches!(node, Node::Dir),
            })
            .collect())
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.lock().nodes.get(path) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Dir) => Err(io::Error::new(
                ErrorKind::Other,
                format!("{} is a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        if state.protected.contains(path) {
            return Err(denied(path));
        }
        match state.nodes.get(path) {
            Some(Node::File(_)) => {
                state.nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(io::Error::new(
                ErrorKind::Other,
                format!("{} is a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        if !matches!(state.nodes.get(path), Some(Node::Dir)) {
            return Err(not_found(path));
        }
        let doomed: Vec<PathBuf> = state
            .nodes
            .keys()
            .filter(|p| p.starts_with(path))
            .cloned()
            .collect();
        if doomed.iter().any(|p| state.protected.contains(p)) {
            return Err(denied(path));
        }
        for p in doomed {
            state.nodes.remove(&p);
        }
        Ok(())
    }

    fn create_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if state.nodes.contains_key(path) {
            return Err(io::Error::new(
                ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }
        let parent_is_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                matches!(state.nodes.get(parent), Some(Node::Dir))
            }
            _ => true,
        };
        if !parent_is_dir {
            return Err(not_found(path));
        }
        state.nodes.insert(path.to_path_buf(), Node::File(contents.to_vec()));
        Ok(())
    }
}
