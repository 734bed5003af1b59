//! Store management and object I/O.

use crate::backend::{Backend, DirEntry, FsBackend, NodeKind};
use crate::error::{Error, Result};
use crate::hash::{Algorithm, HASH_HEX_LEN, Hash, HashPrefix, SHARD_LEN};
use crate::refs::RefStore;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Symbolic value written to `HEAD` when a repository is created.
const INITIAL_HEAD: &str = "ref: heads/master\n";

/// Where an object lives, or would live, inside `objects/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Shard directory name (first 2 hex characters).
    pub shard: String,
    /// Leaf file name (remaining 38 hex characters).
    pub leaf: String,
    /// Full path of the leaf file.
    pub path: PathBuf,
}

impl Location {
    /// Rebuild the full digest from the shard and leaf names.
    pub fn hash(&self) -> Result<Hash> {
        Hash::from_hex(&format!("{}{}", self.shard, self.leaf))
    }
}

/// A content-addressed store.
#[derive(Debug)]
pub struct Store<B: Backend = FsBackend> {
    root: PathBuf,
    algorithm: Algorithm,
    backend: B,
}

impl<B: Backend> Store<B> {
    /// Initialize a store at the given path, or adopt an existing one.
    ///
    /// Creates the directory structure:
    /// - `objects/` for storing objects
    /// - `refs/heads/` for branch heads
    /// - `config` file with version and algorithm
    /// - `HEAD` pointing at `heads/master`
    ///
    /// Anything already present is kept, so calling this twice is harmless.
    pub fn init<P: AsRef<Path>>(root: P, backend: B) -> Result<Self> {
        let store = Self {
            root: root.as_ref().to_path_buf(),
            algorithm: Algorithm::Sha1,
            backend,
        };
        store.ensure_initialized()?;
        Ok(store)
    }

    /// Open an existing store at the given path.
    ///
    /// Validates the store structure and reads the configuration.
    pub fn open<P: AsRef<Path>>(root: P, backend: B) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if backend.kind_followed(&root)? != Some(NodeKind::Dir) {
            return Err(Error::not_initialized(&root));
        }

        if backend.kind_followed(&root.join("objects"))? != Some(NodeKind::Dir) {
            return Err(Error::not_initialized(&root));
        }

        // Stores created before the config file existed are SHA-1
        let config_path = root.join("config");
        let algorithm = match backend.kind(&config_path)? {
            Some(NodeKind::File) => {
                let content = std::str::from_utf8(&backend.read_all(&config_path)?)?.to_string();
                Self::parse_config(&content)?
            }
            Some(_) => return Err(Error::corrupt("config", "not a regular file")),
            None => Algorithm::Sha1,
        };

        Ok(Self {
            root,
            algorithm,
            backend,
        })
    }

    /// Create any missing part of the store layout.
    pub fn ensure_initialized(&self) -> Result<()> {
        self.ensure_directory(&self.root)?;
        self.ensure_directory(&self.objects_dir())?;
        self.ensure_directory(&self.refs_dir())?;
        self.ensure_directory(&self.refs_dir().join("heads"))?;

        let config_path = self.root.join("config");
        match self.backend.kind(&config_path)? {
            None => {
                let config_content = format!("version=1\nalgo={}\n", self.algorithm.as_str());
                self.backend.write(&config_path, config_content.as_bytes())?;
            }
            Some(NodeKind::File) => {
                let content = self.backend.read_all(&config_path)?;
                Self::parse_config(std::str::from_utf8(&content)?)?;
            }
            Some(_) => return Err(Error::corrupt("config", "not a regular file")),
        }

        let head_path = self.head_path();
        if self.backend.kind(&head_path)?.is_none() {
            self.backend.write(&head_path, INITIAL_HEAD.as_bytes())?;
        }

        debug!(root = %self.root.display(), "store initialized");
        Ok(())
    }

    fn ensure_directory(&self, path: &Path) -> Result<()> {
        // Layout directories may be symlinks to real directories
        match self.backend.kind_followed(path)? {
            Some(NodeKind::Dir) => Ok(()),
            Some(_) => Err(Error::not_a_directory(path)),
            None => self.backend.create_dir_all(path),
        }
    }

    /// Parse the config file to extract the algorithm.
    fn parse_config(content: &str) -> Result<Algorithm> {
        let mut version = None;
        let mut algo = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "version" => version = Some(value.trim()),
                    "algo" => algo = Some(value.trim()),
                    _ => {}
                }
            }
        }

        if version != Some("1") {
            return Err(Error::corrupt(
                "config",
                format!("unsupported version: {:?}", version),
            ));
        }

        let algo_str = algo.ok_or_else(|| Error::corrupt("config", "missing algo"))?;
        Algorithm::parse(algo_str)
    }

    /// Get the root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the algorithm used by this store.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Get the backend this store reads and writes through.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get the reference store layered over this object store.
    pub fn refs(&self) -> RefStore<'_, B> {
        RefStore::new(self)
    }

    pub(crate) fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    pub(crate) fn refs_dir(&self) -> PathBuf {
        self.root.join("refs")
    }

    pub(crate) fn head_path(&self) -> PathBuf {
        self.root.join("HEAD")
    }

    /// Get the path to an object file given its hash.
    ///
    /// Returns: `objects/{prefix}/{suffix}`
    pub fn object_path(&self, hash: &Hash) -> PathBuf {
        self.objects_dir().join(hash.prefix()).join(hash.suffix())
    }

    fn require_initialized(&self) -> Result<()> {
        if self.backend.kind_followed(&self.objects_dir())? != Some(NodeKind::Dir) {
            return Err(Error::not_initialized(&self.root));
        }
        Ok(())
    }

    /// Store bytes and return their digest.
    ///
    /// Storing content that is already present is a no-op returning the
    /// same digest.
    pub fn put(&self, data: &[u8]) -> Result<Hash> {
        self.require_initialized()?;

        let hash = Hash::hash_bytes(data);
        let location = self.resolve_location(&hash.to_hex(), false)?;

        if self.backend.kind(&location.path)?.is_some() {
            debug!(%hash, "object already present");
            return Ok(hash);
        }

        let shard_dir = self.objects_dir().join(&location.shard);
        match self.backend.kind(&shard_dir)? {
            Some(NodeKind::Dir) => {}
            None => self.backend.create_dir_all(&shard_dir)?,
            Some(_) => {
                return Err(Error::corrupt(
                    format!("shard {}", location.shard),
                    "exists but is not a directory",
                ));
            }
        }

        self.backend.write(&location.path, data)?;
        debug!(%hash, size = data.len(), "stored object");

        Ok(hash)
    }

    /// Store everything a reader yields.
    pub fn put_reader<R: Read>(&self, mut reader: R) -> Result<Hash> {
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        self.put(&payload)
    }

    /// Retrieve the contents of the object a digest or prefix names.
    pub fn get(&self, prefix: &str) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        self.get_to_writer(prefix, &mut payload)?;
        Ok(payload)
    }

    /// Stream an object to a writer, in bounded chunks.
    ///
    /// Returns the number of bytes written.
    pub fn get_to_writer<W: Write>(&self, prefix: &str, mut writer: W) -> Result<u64> {
        let location = self.resolve_location(prefix, true)?;
        let mut reader = self.backend.open(&location.path)?;
        let copied = io::copy(&mut reader, &mut writer)?;
        Ok(copied)
    }

    /// Delete the object a digest or prefix names.
    ///
    /// The shard directory goes too once its last object is gone. Returns
    /// the full digest of the deleted object.
    pub fn delete(&self, prefix: &str) -> Result<Hash> {
        let location = self.resolve_location(prefix, true)?;
        let hash = location.hash()?;

        self.backend.remove_file(&location.path)?;

        let shard_dir = self.objects_dir().join(&location.shard);
        if self.backend.list_dir(&shard_dir)?.is_empty() {
            self.backend.remove_dir(&shard_dir)?;
            debug!(shard = %location.shard, "removed empty shard");
        }

        debug!(%hash, "deleted object");
        Ok(hash)
    }

    /// Check whether an object is stored.
    pub fn exists(&self, hash: &Hash) -> Result<bool> {
        Ok(self.backend.kind(&self.object_path(hash))? == Some(NodeKind::File))
    }

    /// Expand a digest or prefix to the full digest of the object it names.
    pub fn compute_full_hash(&self, prefix: &str) -> Result<Hash> {
        self.resolve_location(prefix, true)?.hash()
    }

    /// Map a digest or unambiguous prefix to its object location.
    ///
    /// A full digest maps directly to its location; with `must_exist` the
    /// object has to be there. A shorter prefix is matched independently
    /// against shard directory names and then against leaf names in the one
    /// matching shard; each level must yield exactly one candidate. Short
    /// prefixes are only accepted with `must_exist`.
    pub fn resolve_location(&self, prefix: &str, must_exist: bool) -> Result<Location> {
        let prefix = HashPrefix::parse(prefix)?;
        self.require_initialized()?;

        if let Some(hash) = prefix.as_full() {
            return self.full_location(&hash, must_exist);
        }

        if !must_exist {
            return Err(Error::invalid_input(format!(
                "Incomplete digest cannot address a new object: {}",
                prefix
            )));
        }

        let (shard_prefix, leaf_prefix) = prefix.split();

        let shard = unique_match(
            self.backend.list_dir(&self.objects_dir())?,
            |entry| {
                entry.kind == NodeKind::Dir
                    && is_hex_name(&entry.name, SHARD_LEN)
                    && entry.name.starts_with(shard_prefix)
            },
            &prefix,
        )?;

        let shard_dir = self.objects_dir().join(&shard.name);
        let leaf = unique_match(
            self.backend.list_dir(&shard_dir)?,
            |entry| {
                is_hex_name(&entry.name, HASH_HEX_LEN - SHARD_LEN)
                    && entry.name.starts_with(leaf_prefix)
            },
            &prefix,
        )?;

        if leaf.kind != NodeKind::File {
            return Err(Error::corrupt(
                format!("object {}{}", shard.name, leaf.name),
                "location is not a regular file",
            ));
        }

        debug!(%prefix, shard = %shard.name, leaf = %leaf.name, "resolved prefix");
        Ok(Location {
            path: shard_dir.join(&leaf.name),
            shard: shard.name,
            leaf: leaf.name,
        })
    }

    fn full_location(&self, hash: &Hash, must_exist: bool) -> Result<Location> {
        let shard_dir = self.objects_dir().join(hash.prefix());
        let location = Location {
            path: shard_dir.join(hash.suffix()),
            shard: hash.prefix(),
            leaf: hash.suffix(),
        };

        let leaf_kind = match self.backend.kind(&shard_dir)? {
            Some(NodeKind::Dir) => self.backend.kind(&location.path)?,
            Some(_) => {
                return Err(Error::corrupt(
                    format!("shard {}", location.shard),
                    "exists but is not a directory",
                ));
            }
            None => None,
        };

        match leaf_kind {
            Some(NodeKind::File) => Ok(location),
            Some(_) => Err(Error::corrupt(
                format!("object {}", hash),
                "location is not a regular file",
            )),
            None if must_exist => Err(Error::not_found(format!("object {}", hash))),
            None => Ok(location),
        }
    }

    /// List every stored object, sorted by digest.
    pub fn list_objects(&self) -> Result<Vec<Hash>> {
        self.require_initialized()?;

        let mut hashes = Vec::new();
        for shard in self.backend.list_dir(&self.objects_dir())? {
            if shard.kind != NodeKind::Dir || !is_hex_name(&shard.name, SHARD_LEN) {
                continue;
            }
            let shard_dir = self.objects_dir().join(&shard.name);
            for leaf in self.backend.list_dir(&shard_dir)? {
                if leaf.kind == NodeKind::File && is_hex_name(&leaf.name, HASH_HEX_LEN - SHARD_LEN)
                {
                    hashes.push(Hash::from_hex(&format!("{}{}", shard.name, leaf.name))?);
                }
            }
        }

        hashes.sort();
        Ok(hashes)
    }
}

/// Whether `name` is exactly `len` lowercase hex characters.
///
/// Staging files and anything else foreign to the layout never match.
fn is_hex_name(name: &str, len: usize) -> bool {
    name.len() == len && name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Pick the single entry accepted by `accept`.
fn unique_match(
    entries: Vec<DirEntry>,
    accept: impl Fn(&DirEntry) -> bool,
    prefix: &HashPrefix,
) -> Result<DirEntry> {
    let mut matches: Vec<DirEntry> = entries.into_iter().filter(|e| accept(e)).collect();

    match matches.len() {
        0 => Err(Error::not_found(format!("object starting with {}", prefix))),
        1 => Ok(matches.remove(0)),
        n => Err(Error::ambiguous(prefix.as_str(), n)),
    }
}
