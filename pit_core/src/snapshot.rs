//! Directory snapshots and tree object I/O.

use crate::backend::{Backend, NodeKind};
use crate::error::Result;
use crate::hash::Hash;
use crate::store::Store;
use crate::tree::{EntryType, Tree, TreeEntry};
use std::path::Path;
use tracing::{debug, warn};

/// Entries whose name starts with this are never snapshotted.
///
/// Covers the `.pit` metadata directory along with every other dotfile.
pub const RESERVED_PREFIX: &str = ".";

impl<B: Backend> Store<B> {
    /// Store a tree object and return its hash.
    pub fn put_tree(&self, tree: &Tree) -> Result<Hash> {
        self.put(tree.serialize().as_bytes())
    }

    /// Retrieve a tree by digest or prefix.
    pub fn get_tree(&self, prefix: &str) -> Result<Tree> {
        let payload = self.get(prefix)?;
        Tree::parse(std::str::from_utf8(&payload)?)
    }

    /// Build the tree for a directory read through `reader`.
    ///
    /// Children are visited in byte order of their names so identical
    /// directories always produce identical trees. Every file and sub-tree
    /// is stored before its parent references it.
    pub fn build_snapshot<R: Backend + ?Sized>(&self, reader: &R, dir: &Path) -> Result<Tree> {
        let mut children = reader.list_dir(dir)?;
        children.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        let mut entries = Vec::with_capacity(children.len());

        for child in children {
            if child.name.starts_with(RESERVED_PREFIX) {
                continue;
            }

            let child_path = dir.join(&child.name);

            if let Err(e) = TreeEntry::validate_name(&child.name) {
                // Tabs and line breaks cannot be encoded in a tree line
                warn!(path = %child_path.display(), error = %e, "skipping unencodable name");
                continue;
            }

            match child.kind {
                NodeKind::Dir => {
                    let subtree = self.build_snapshot(reader, &child_path)?;
                    let hash = self.put_tree(&subtree)?;
                    entries.push(TreeEntry::new(EntryType::Tree, hash, child.name)?);
                }
                NodeKind::File => {
                    let contents = reader.read_all(&child_path)?;
                    let hash = self.put(&contents)?;
                    entries.push(TreeEntry::new(EntryType::Blob, hash, child.name)?);
                }
                NodeKind::Other => {
                    // Symlinks and special files are not supported
                    warn!(path = %child_path.display(), "skipping special file");
                }
            }
        }

        Tree::new(entries)
    }

    /// Snapshot a directory and return the root tree's hash.
    pub fn snapshot<R: Backend + ?Sized>(&self, reader: &R, dir: &Path) -> Result<Hash> {
        let tree = self.build_snapshot(reader, dir)?;
        let hash = self.put_tree(&tree)?;
        debug!(dir = %dir.display(), %hash, entries = tree.len(), "snapshot taken");
        Ok(hash)
    }
}
