//! A store paired with the working directory it tracks.

use crate::backend::{Backend, FsBackend};
use crate::error::Result;
use crate::hash::Hash;
use crate::refs::HEAD;
use crate::store::Store;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the metadata directory inside a working directory.
pub const REPO_DIR_NAME: &str = ".pit";

/// Create (or adopt) the store rooted at `root`.
pub fn initialize_repository<P: AsRef<Path>>(root: P) -> Result<Store> {
    Store::init(root, FsBackend::new())
}

/// Snapshot `work_dir` into `store` and return the root tree hash.
pub fn snapshot_working_tree<B: Backend>(store: &Store<B>, work_dir: &Path) -> Result<Hash> {
    store.snapshot(&FsBackend::new(), work_dir)
}

/// Working tree state compared with `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Hash of the working tree as it is now.
    pub tree: Hash,
    /// What `HEAD` resolves to, or `None` before the first record.
    pub head: Option<Hash>,
}

impl Status {
    /// Whether the working tree matches `HEAD`.
    pub fn is_clean(&self) -> bool {
        self.head == Some(self.tree)
    }
}

/// A working directory with its `.pit` store.
#[derive(Debug)]
pub struct Repository {
    work_dir: PathBuf,
    store: Store,
}

impl Repository {
    /// Create the `.pit` directory under `work_dir`, or adopt an existing one.
    pub fn init<P: AsRef<Path>>(work_dir: P) -> Result<Self> {
        let work_dir = work_dir.as_ref().to_path_buf();
        let store = initialize_repository(work_dir.join(REPO_DIR_NAME))?;
        info!(path = %work_dir.display(), "initialized repository");
        Ok(Self { work_dir, store })
    }

    /// Open the repository under `work_dir`.
    pub fn open<P: AsRef<Path>>(work_dir: P) -> Result<Self> {
        let work_dir = work_dir.as_ref().to_path_buf();
        let store = Store::open(work_dir.join(REPO_DIR_NAME), FsBackend::new())?;
        Ok(Self { work_dir, store })
    }

    /// The tracked working directory.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// The object store under `.pit`.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Store the current working tree and return its root hash.
    pub fn snapshot_working_tree(&self) -> Result<Hash> {
        snapshot_working_tree(&self.store, &self.work_dir)
    }

    /// Current `HEAD` target, `None` while the branch is unborn.
    pub fn head(&self) -> Result<Option<Hash>> {
        self.store.refs().try_resolve_hash(HEAD)
    }

    /// Snapshot the working tree and compare it with `HEAD`.
    pub fn status(&self) -> Result<Status> {
        let tree = self.snapshot_working_tree()?;
        let head = self.head()?;
        Ok(Status { tree, head })
    }

    /// Snapshot the working tree and move `HEAD` to it.
    pub fn record(&self) -> Result<Hash> {
        let tree = self.snapshot_working_tree()?;
        self.store.refs().update(HEAD, &tree)?;
        info!(%tree, "recorded working tree");
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::refs::Category;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();

        let pit = temp_dir.path().join(".pit");
        assert!(pit.join("objects").is_dir());
        assert!(pit.join("refs/heads").is_dir());
        assert_eq!(
            fs::read_to_string(pit.join("HEAD")).unwrap(),
            "ref: heads/master\n"
        );
        assert_eq!(repo.store().root(), pit);
    }

    #[test]
    fn test_init_twice_keeps_head() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        let recorded = repo.record().unwrap();

        let again = Repository::init(temp_dir.path()).unwrap();
        assert_eq!(again.head().unwrap(), Some(recorded));
    }

    #[test]
    fn test_open_missing_repository() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            Repository::open(temp_dir.path()),
            Err(Error::NotInitialized { .. })
        ));
    }

    #[test]
    fn test_status_before_first_record() {
        let temp_dir = TempDir::new().unwrap();
        Repository::init(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();

        let repo = Repository::open(temp_dir.path()).unwrap();
        let status = repo.status().unwrap();
        assert_eq!(status.head, None);
        assert!(!status.is_clean());
    }

    #[test]
    fn test_record_then_status_is_clean() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir(temp_dir.path().join("dir")).unwrap();
        fs::write(temp_dir.path().join("dir/b.txt"), "b").unwrap();

        let tree = repo.record().unwrap();
        let status = repo.status().unwrap();
        assert_eq!(status.head, Some(tree));
        assert!(status.is_clean());

        // Record moves the branch HEAD points at
        assert_eq!(
            repo.store().refs().get_ref(Category::Heads, "master").unwrap(),
            tree
        );
    }

    #[test]
    fn test_modification_makes_status_dirty() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        repo.record().unwrap();

        fs::write(temp_dir.path().join("a.txt"), "changed").unwrap();
        let status = repo.status().unwrap();
        assert!(!status.is_clean());
        assert_ne!(status.head, Some(status.tree));
    }

    #[test]
    fn test_metadata_changes_do_not_affect_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();

        let first = repo.snapshot_working_tree().unwrap();
        // The snapshot itself added objects under .pit
        let second = repo.snapshot_working_tree().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_head_redirect_to_deleted_object() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        let store = repo.store();

        store.put(b"hello").unwrap();
        store.refs().put_symbolic(HEAD, "aaf4").unwrap();
        assert_eq!(repo.head().unwrap(), Some(Hash::digest("hello")));

        store.delete("aaf4").unwrap();
        assert!(matches!(repo.head(), Err(Error::NotFound { .. })));
        assert!(repo.status().is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_status_with_backslash_file_name() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join("ok.txt"), "ok").unwrap();
        fs::write(temp_dir.path().join("weird\\name.txt"), "weird").unwrap();

        let tree = repo.record().unwrap();
        assert!(repo.status().unwrap().is_clean());

        let entries = repo.store().get_tree(&tree.to_hex()).unwrap();
        assert!(entries.get("weird\\name.txt").is_some());
    }

    #[test]
    fn test_status_serializes_hex() {
        let status = Status {
            tree: Hash::digest("hello"),
            head: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["tree"], "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
        assert!(json["head"].is_null());
    }

    #[test]
    fn test_free_functions() {
        let temp_dir = TempDir::new().unwrap();
        let store = initialize_repository(temp_dir.path().join(".pit")).unwrap();
        fs::write(temp_dir.path().join("hello"), "hello").unwrap();

        let hash = snapshot_working_tree(&store, temp_dir.path()).unwrap();
        let tree = store.get_tree(&hash.to_hex()).unwrap();
        assert_eq!(tree.get("hello").unwrap().hash, Hash::digest("hello"));
    }
}
