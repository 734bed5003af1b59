//! Named references: branch heads and `HEAD`.
//!
//! A ref file holds either a full digest or a symbolic redirect of the form
//! `ref: <target>`. Refs live under `refs/<category>/<name>`; `HEAD` sits at
//! the store root.

use crate::backend::{Backend, NodeKind};
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::store::Store;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the distinguished ref at the store root.
pub const HEAD: &str = "HEAD";

/// Prefix marking a symbolic ref value.
const SYMBOLIC_PREFIX: &str = "ref: ";

/// Maximum number of redirects followed before giving up.
pub const MAX_SYMREF_DEPTH: usize = 10;

/// Ref namespaces under `refs/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Branch heads.
    Heads,
}

impl Category {
    /// Directory name under `refs/`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Heads => "heads",
        }
    }

    /// Parse a category name.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "heads" => Ok(Category::Heads),
            _ => Err(Error::invalid_input(format!("Unknown ref category: {}", s))),
        }
    }
}

/// The stored value of a ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    /// Points straight at an object.
    Direct(Hash),
    /// Points at another ref (or object prefix).
    Symbolic(String),
}

impl RefValue {
    fn parse(content: &str, what: &str) -> Result<Self> {
        let content = content.trim();

        if let Some(target) = content.strip_prefix(SYMBOLIC_PREFIX) {
            let target = target.trim();
            if target.is_empty() {
                return Err(Error::corrupt(what, "empty symbolic target"));
            }
            return Ok(RefValue::Symbolic(target.to_string()));
        }

        Hash::from_hex(content)
            .map(RefValue::Direct)
            .map_err(|e| Error::corrupt(what, e.to_string()))
    }

    /// The digest, if this is a direct ref.
    pub fn as_hash(&self) -> Option<&Hash> {
        match self {
            RefValue::Direct(hash) => Some(hash),
            RefValue::Symbolic(_) => None,
        }
    }
}

impl fmt::Display for RefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefValue::Direct(hash) => write!(f, "{}", hash),
            RefValue::Symbolic(target) => write!(f, "{}{}", SYMBOLIC_PREFIX, target),
        }
    }
}

/// Whether a ref path names a ref file rather than an object.
fn is_ref_file_path(path: &str) -> bool {
    path == HEAD || path.contains('/')
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_input("Ref name cannot be empty"));
    }

    if name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.chars().any(char::is_whitespace)
    {
        return Err(Error::invalid_input(format!(
            "Invalid ref name: {} (must not contain .., path separators or whitespace)",
            name
        )));
    }

    Ok(())
}

/// Manages refs in a store.
pub struct RefStore<'a, B: Backend> {
    store: &'a Store<B>,
}

impl<'a, B: Backend> RefStore<'a, B> {
    /// Create a new RefStore for the given store.
    pub(crate) fn new(store: &'a Store<B>) -> Self {
        Self { store }
    }

    fn category_dir(&self, category: Category) -> PathBuf {
        self.store.refs_dir().join(category.as_str())
    }

    fn ref_file(&self, category: Category, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.category_dir(category).join(name))
    }

    /// Map `HEAD` or `<category>/<name>` to its file.
    fn path_file(&self, ref_path: &str) -> Result<PathBuf> {
        if ref_path == HEAD {
            return Ok(self.store.head_path());
        }

        let (category, name) = ref_path.split_once('/').ok_or_else(|| {
            Error::invalid_input(format!("Ref path must be HEAD or <category>/<name>: {}", ref_path))
        })?;
        self.ref_file(Category::parse(category)?, name)
    }

    fn read_file(&self, path: &Path, what: &str) -> Result<RefValue> {
        match self.store.backend().kind(path)? {
            Some(NodeKind::File) => {}
            Some(_) => return Err(Error::corrupt(what, "not a regular file")),
            None => return Err(Error::not_found(format!("ref {}", what))),
        }

        let content = self.store.backend().read_all(path)?;
        let content = std::str::from_utf8(&content)
            .map_err(|e| Error::corrupt(what, e.to_string()))?;
        RefValue::parse(content, what)
    }

    fn write_file(&self, path: &Path, value: &RefValue) -> Result<()> {
        if let Some(parent) = path.parent()
            && self.store.backend().kind(parent)?.is_none()
        {
            self.store.backend().create_dir_all(parent)?;
        }
        self.store
            .backend()
            .write(path, format!("{}\n", value).as_bytes())
    }

    /// Point a ref at a digest, replacing any previous value.
    pub fn put_ref(&self, category: Category, name: &str, hash: &Hash) -> Result<()> {
        let path = self.ref_file(category, name)?;
        self.write_file(&path, &RefValue::Direct(*hash))?;
        debug!(category = category.as_str(), name, %hash, "ref updated");
        Ok(())
    }

    /// Read a ref that must hold a digest.
    pub fn get_ref(&self, category: Category, name: &str) -> Result<Hash> {
        let path = self.ref_file(category, name)?;
        let what = format!("{}/{}", category.as_str(), name);

        match self.read_file(&path, &what)? {
            RefValue::Direct(hash) => Ok(hash),
            RefValue::Symbolic(target) => Err(Error::corrupt(
                what,
                format!("expected a digest, found a redirect to {}", target),
            )),
        }
    }

    /// Remove a ref.
    pub fn delete_ref(&self, category: Category, name: &str) -> Result<()> {
        let path = self.ref_file(category, name)?;

        if self.store.backend().kind(&path)?.is_none() {
            return Err(Error::not_found(format!(
                "ref {}/{}",
                category.as_str(),
                name
            )));
        }

        self.store.backend().remove_file(&path)?;
        debug!(category = category.as_str(), name, "ref deleted");
        Ok(())
    }

    /// List the refs in a category, sorted by name.
    pub fn list(&self, category: Category) -> Result<Vec<(String, RefValue)>> {
        let dir = self.category_dir(category);
        let mut refs = Vec::new();

        if self.store.backend().kind(&dir)? != Some(NodeKind::Dir) {
            return Ok(refs);
        }

        for entry in self.store.backend().list_dir(&dir)? {
            // Dotfiles are staging leftovers from interrupted writes
            if entry.kind != NodeKind::File
                || entry.name.starts_with('.')
                || validate_name(&entry.name).is_err()
            {
                continue;
            }
            let what = format!("{}/{}", category.as_str(), entry.name);
            let value = self.read_file(&dir.join(&entry.name), &what)?;
            refs.push((entry.name, value));
        }

        refs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(refs)
    }

    /// Read the raw value of `HEAD` or `<category>/<name>`.
    pub fn read(&self, ref_path: &str) -> Result<RefValue> {
        let path = self.path_file(ref_path)?;
        self.read_file(&path, ref_path)
    }

    /// Make a ref redirect to another ref.
    pub fn put_symbolic(&self, ref_path: &str, target: &str) -> Result<()> {
        let target = target.trim();
        if target.is_empty() || target.chars().any(char::is_whitespace) {
            return Err(Error::invalid_input(format!(
                "Invalid symbolic target: {:?}",
                target
            )));
        }

        let path = self.path_file(ref_path)?;
        self.write_file(&path, &RefValue::Symbolic(target.to_string()))?;
        debug!(ref_path, target, "symbolic ref updated");
        Ok(())
    }

    /// Resolve a ref path.
    ///
    /// `HEAD` and paths containing `/` are read as ref files; anything else
    /// is taken as a digest prefix and expanded through the object store.
    /// With `recursive`, redirects are followed until a digest is reached;
    /// a chain longer than [`MAX_SYMREF_DEPTH`] is reported as corrupt.
    pub fn resolve(&self, ref_path: &str, recursive: bool) -> Result<RefValue> {
        let mut current = ref_path.trim().to_string();

        for _ in 0..=MAX_SYMREF_DEPTH {
            let value = if is_ref_file_path(&current) {
                self.read(&current)?
            } else {
                RefValue::Direct(self.store.compute_full_hash(&current)?)
            };

            match value {
                RefValue::Symbolic(target) if recursive => {
                    debug!(from = %current, to = %target, "following symbolic ref");
                    current = target;
                }
                value => return Ok(value),
            }
        }

        Err(Error::corrupt(
            ref_path,
            format!("more than {} symbolic redirects", MAX_SYMREF_DEPTH),
        ))
    }

    /// Resolve a ref path all the way to a digest.
    pub fn resolve_hash(&self, ref_path: &str) -> Result<Hash> {
        match self.resolve(ref_path, true)? {
            RefValue::Direct(hash) => Ok(hash),
            RefValue::Symbolic(target) => Err(Error::corrupt(
                ref_path,
                format!("unresolved redirect to {}", target),
            )),
        }
    }

    /// Like [`RefStore::resolve_hash`], but a missing ref file anywhere in
    /// the chain yields `None`.
    ///
    /// A redirect to an object prefix that no longer matches is still
    /// `NotFound`.
    pub fn try_resolve_hash(&self, ref_path: &str) -> Result<Option<Hash>> {
        let mut current = ref_path.trim().to_string();

        for _ in 0..=MAX_SYMREF_DEPTH {
            if !is_ref_file_path(&current) {
                return self.store.compute_full_hash(&current).map(Some);
            }

            match self.read(&current) {
                Ok(RefValue::Direct(hash)) => return Ok(Some(hash)),
                Ok(RefValue::Symbolic(target)) => current = target,
                Err(e) if e.is_not_found() => return Ok(None),
                Err(e) => return Err(e),
            }
        }

        Err(Error::corrupt(
            ref_path,
            format!("more than {} symbolic redirects", MAX_SYMREF_DEPTH),
        ))
    }

    /// Point the ref at the end of a redirect chain at `hash`.
    ///
    /// Updating `HEAD` while it redirects to `heads/master` moves the
    /// branch, creating it if it does not exist yet.
    pub fn update(&self, ref_path: &str, hash: &Hash) -> Result<()> {
        let mut current = ref_path.trim().to_string();

        for _ in 0..=MAX_SYMREF_DEPTH {
            if !is_ref_file_path(&current) {
                return Err(Error::invalid_input(format!(
                    "Cannot update {}: it names an object, not a ref",
                    current
                )));
            }

            let path = self.path_file(&current)?;
            let next = match self.read_file(&path, &current) {
                Ok(RefValue::Symbolic(target)) => Some(target),
                Ok(RefValue::Direct(_)) => None,
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };

            match next {
                Some(target) => current = target,
                None => {
                    self.write_file(&path, &RefValue::Direct(*hash))?;
                    debug!(ref_path = %current, %hash, "ref updated");
                    return Ok(());
                }
            }
        }

        Err(Error::corrupt(
            ref_path,
            format!("more than {} symbolic redirects", MAX_SYMREF_DEPTH),
        ))
    }
}
