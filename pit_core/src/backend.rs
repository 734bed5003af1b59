//! Storage backends.
//!
//! A [`Store`](crate::Store) never touches `std::fs` directly; it goes through
//! a [`Backend`] handed to it at construction. [`FsBackend`] is the real
//! filesystem, [`MemoryBackend`] keeps everything in a map for tests.
//!
//! The same trait doubles as the directory reader used when building
//! snapshots, so a working tree can live in either backend.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// What a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A regular file.
    File,
    /// A directory.
    Dir,
    /// Anything else (symlink, socket, device).
    Other,
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name, without any leading path.
    pub name: String,
    /// Kind of the child, symlinks not followed.
    pub kind: NodeKind,
}

/// Filesystem operations needed by the object store, ref store and snapshots.
pub trait Backend: Send + Sync {
    /// Kind of node at `path`, or `None` if nothing is there.
    fn kind(&self, path: &Path) -> Result<Option<NodeKind>>;

    /// Like [`Backend::kind`], but symlinks are followed to their target.
    fn kind_followed(&self, path: &Path) -> Result<Option<NodeKind>> {
        self.kind(path)
    }

    /// Create `path` and any missing parents as directories.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// List the children of a directory, in no particular order.
    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Open a file for reading. The handle is released when dropped.
    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn Read + 'a>>;

    /// Replace the contents of a file atomically. The parent must exist.
    fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Remove a file.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> Result<()>;

    /// Read a whole file into memory.
    fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
        let mut reader = self.open(path)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsBackend;

impl FsBackend {
    /// Create a filesystem backend.
    pub fn new() -> Self {
        FsBackend
    }
}

fn kind_of(file_type: fs::FileType) -> NodeKind {
    if file_type.is_file() {
        NodeKind::File
    } else if file_type.is_dir() {
        NodeKind::Dir
    } else {
        NodeKind::Other
    }
}

impl Backend for FsBackend {
    fn kind(&self, path: &Path) -> Result<Option<NodeKind>> {
        match fs::symlink_metadata(path) {
            Ok(metadata) => Ok(Some(kind_of(metadata.file_type()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn kind_followed(&self, path: &Path) -> Result<Option<NodeKind>> {
        match fs::metadata(path) {
            Ok(metadata) => Ok(Some(kind_of(metadata.file_type()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let name = entry.file_name().into_string().map_err(|raw| {
                Error::invalid_input(format!(
                    "Non UTF-8 file name in {}: {}",
                    path.display(),
                    raw.to_string_lossy()
                ))
            })?;
            entries.push(DirEntry {
                name,
                kind: kind_of(entry.file_type()?),
            });
        }

        Ok(entries)
    }

    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn Read + 'a>> {
        Ok(Box::new(fs::File::open(path)?))
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            Error::invalid_input(format!("No parent directory for {}", path.display()))
        })?;

        // Stage next to the destination so the rename stays on one filesystem
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(data)?;
        temp_file.flush()?;
        temp_file.persist(path)?;

        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        fs::remove_dir(path)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

/// An in-memory filesystem, for tests and embedding.
///
/// Behaves like a real filesystem where it matters to the store: writes need
/// an existing parent directory and only empty directories can be removed.
#[derive(Debug)]
pub struct MemoryBackend {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
}

fn poisoned() -> Error {
    Error::Io {
        source: io::Error::other("memory backend lock poisoned"),
    }
}

fn io_error(kind: io::ErrorKind, what: &str, path: &Path) -> Error {
    Error::Io {
        source: io::Error::new(kind, format!("{}: {}", what, path.display())),
    }
}

impl MemoryBackend {
    /// Create an empty in-memory filesystem containing only `/`.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Node::Dir);
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Write a file, creating its parent directories first.
    pub fn insert_file(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent)?;
        }
        self.write(path, &data.into())
    }

    /// Number of regular files held.
    pub fn file_count(&self) -> usize {
        self.nodes
            .read()
            .map(|nodes| {
                nodes
                    .values()
                    .filter(|node| matches!(node, Node::File(_)))
                    .count()
            })
            .unwrap_or(0)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn kind(&self, path: &Path) -> Result<Option<NodeKind>> {
        let nodes = self.nodes.read().map_err(|_| poisoned())?;
        Ok(nodes.get(path).map(|node| match node {
            Node::Dir => NodeKind::Dir,
            Node::File(_) => NodeKind::File,
        }))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;

        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            match nodes.get(ancestor) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => {
                    return Err(io_error(
                        io::ErrorKind::AlreadyExists,
                        "File exists",
                        ancestor,
                    ));
                }
                None => {
                    nodes.insert(ancestor.to_path_buf(), Node::Dir);
                }
            }
        }

        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let nodes = self.nodes.read().map_err(|_| poisoned())?;

        match nodes.get(path) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => {
                return Err(io_error(io::ErrorKind::Other, "Not a directory", path));
            }
            None => {
                return Err(io_error(io::ErrorKind::NotFound, "No such directory", path));
            }
        }

        let entries = nodes
            .iter()
            .filter(|(child, _)| child.parent() == Some(path))
            .filter_map(|(child, node)| {
                let name = child.file_name()?.to_str()?.to_string();
                let kind = match node {
                    Node::Dir => NodeKind::Dir,
                    Node::File(_) => NodeKind::File,
                };
                Some(DirEntry { name, kind })
            })
            .collect();

        Ok(entries)
    }

    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn Read + 'a>> {
        let nodes = self.nodes.read().map_err(|_| poisoned())?;

        match nodes.get(path) {
            Some(Node::File(data)) => Ok(Box::new(Cursor::new(data.clone()))),
            Some(Node::Dir) => Err(io_error(io::ErrorKind::Other, "Is a directory", path)),
            None => Err(io_error(io::ErrorKind::NotFound, "No such file", path)),
        }
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;

        let parent_is_dir = path
            .parent()
            .is_some_and(|parent| matches!(nodes.get(parent), Some(Node::Dir)));
        if !parent_is_dir {
            return Err(io_error(io::ErrorKind::NotFound, "No parent directory", path));
        }

        if let Some(Node::Dir) = nodes.get(path) {
            return Err(io_error(io::ErrorKind::Other, "Is a directory", path));
        }

        nodes.insert(path.to_path_buf(), Node::File(data.to_vec()));
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;

        match nodes.get(path) {
            Some(Node::File(_)) => {
                nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(io_error(io::ErrorKind::Other, "Is a directory", path)),
            None => Err(io_error(io::ErrorKind::NotFound, "No such file", path)),
        }
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;

        match nodes.get(path) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => {
                return Err(io_error(io::ErrorKind::Other, "Not a directory", path));
            }
            None => {
                return Err(io_error(io::ErrorKind::NotFound, "No such directory", path));
            }
        }

        if nodes.keys().any(|child| child.parent() == Some(path)) {
            return Err(io_error(io::ErrorKind::Other, "Directory not empty", path));
        }

        nodes.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(mut entries: Vec<DirEntry>) -> Vec<String> {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.into_iter().map(|e| e.name).collect()
    }

    #[test]
    fn test_fs_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FsBackend::new();
        let path = temp_dir.path().join("file");

        backend.write(&path, b"first").unwrap();
        backend.write(&path, b"second").unwrap();

        assert_eq!(backend.read_all(&path).unwrap(), b"second");
        assert_eq!(backend.kind(&path).unwrap(), Some(NodeKind::File));
        assert_eq!(names(backend.list_dir(temp_dir.path()).unwrap()), vec!["file"]);
    }

    #[test]
    fn test_fs_kind_missing_and_dir() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FsBackend::new();

        assert_eq!(backend.kind(&temp_dir.path().join("nope")).unwrap(), None);
        assert_eq!(backend.kind(temp_dir.path()).unwrap(), Some(NodeKind::Dir));
    }

    #[test]
    #[cfg(unix)]
    fn test_fs_symlink_is_other() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FsBackend::new();
        let target = temp_dir.path().join("target");
        let link = temp_dir.path().join("link");
        std::fs::write(&target, b"x").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert_eq!(backend.kind(&link).unwrap(), Some(NodeKind::Other));
    }

    #[test]
    fn test_memory_write_requires_parent() {
        let backend = MemoryBackend::new();
        assert!(backend.write(Path::new("/a/b"), b"x").is_err());

        backend.create_dir_all(Path::new("/a")).unwrap();
        backend.write(Path::new("/a/b"), b"x").unwrap();
        assert_eq!(backend.read_all(Path::new("/a/b")).unwrap(), b"x");
    }

    #[test]
    fn test_memory_list_only_direct_children() {
        let backend = MemoryBackend::new();
        backend.insert_file("/root/a", "1").unwrap();
        backend.insert_file("/root/sub/b", "2").unwrap();

        let mut entries = backend.list_dir(Path::new("/root")).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            entries,
            vec![
                DirEntry {
                    name: "a".to_string(),
                    kind: NodeKind::File
                },
                DirEntry {
                    name: "sub".to_string(),
                    kind: NodeKind::Dir
                },
            ]
        );
    }

    #[test]
    fn test_memory_remove_dir_must_be_empty() {
        let backend = MemoryBackend::new();
        backend.insert_file("/d/f", "x").unwrap();

        assert!(backend.remove_dir(Path::new("/d")).is_err());
        backend.remove_file(Path::new("/d/f")).unwrap();
        backend.remove_dir(Path::new("/d")).unwrap();
        assert_eq!(backend.kind(Path::new("/d")).unwrap(), None);
    }

    #[test]
    fn test_memory_create_dir_over_file_fails() {
        let backend = MemoryBackend::new();
        backend.insert_file("/f", "x").unwrap();
        assert!(backend.create_dir_all(Path::new("/f/sub")).is_err());
    }

    #[test]
    fn test_memory_file_count() {
        let backend = MemoryBackend::new();
        backend.insert_file("/a/1", "x").unwrap();
        backend.insert_file("/a/2", "y").unwrap();
        backend.insert_file("/a/2", "z").unwrap();
        assert_eq!(backend.file_count(), 2);
    }
}
