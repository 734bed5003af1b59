//! # Pit Core
//!
//! A minimal content-addressed object store with named references and
//! directory snapshots.
//!
//! Objects are addressed by the SHA-1 digest of their bytes and stored
//! sharded under `objects/<first 2 hex>/<remaining 38 hex>`. Any unambiguous
//! digest prefix can be used to look an object up. References live under
//! `refs/` and may point at a digest or redirect to another ref.
//!
//! ## Example
//!
//! ```no_run
//! use pit_core::{Category, Repository};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = Repository::init("./project")?;
//!
//! // Store a blob and read it back by prefix
//! let hash = repo.store().put(b"hello")?;
//! assert_eq!(repo.store().get(&hash.to_hex()[..4])?, b"hello");
//!
//! // Snapshot the working tree and move HEAD to it
//! let tree = repo.record()?;
//! assert_eq!(repo.store().refs().get_ref(Category::Heads, "master")?, tree);
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod hash;
mod refs;
mod repo;
mod snapshot;
mod store;
mod tree;

pub use backend::{Backend, DirEntry, FsBackend, MemoryBackend, NodeKind};
pub use error::{Error, Result};
pub use hash::{Algorithm, Digestible, HASH_HEX_LEN, Hash, HashPrefix};
pub use refs::{Category, HEAD, MAX_SYMREF_DEPTH, RefStore, RefValue};
pub use repo::{REPO_DIR_NAME, Repository, Status, initialize_repository, snapshot_working_tree};
pub use snapshot::RESERVED_PREFIX;
pub use store::{Location, Store};
pub use tree::{EntryType, Tree, TreeEntry};
