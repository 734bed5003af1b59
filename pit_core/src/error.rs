//! Error types for pit_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using pit_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// UTF-8 encoding error.
    #[error("UTF-8 error: {source}")]
    Utf8Error {
        #[from]
        source: std::str::Utf8Error,
    },

    /// Store root or its objects directory is missing.
    #[error("Not a pit repository: {path}")]
    NotInitialized { path: PathBuf },

    /// A path that must be a directory exists as something else.
    #[error("Path exists but is not a directory: {path}")]
    AlreadyExistsAsNonDirectory { path: PathBuf },

    /// Malformed digest, prefix, ref name or other caller input.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// No object or reference matches.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// More than one object matches a prefix.
    #[error("Ambiguous digest prefix {prefix}: {candidates} candidates")]
    Ambiguous { prefix: String, candidates: usize },

    /// A stored object, ref or tree fails structural validation.
    #[error("Corrupt {what}: {reason}")]
    Corrupt { what: String, reason: String },

    /// Tree text does not parse.
    #[error("Malformed tree entry on line {line}: {reason}")]
    MalformedEntry { line: usize, reason: String },

    /// Unsupported algorithm.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },
}

impl Error {
    /// Create a NotInitialized error.
    pub fn not_initialized(path: impl Into<PathBuf>) -> Self {
        Error::NotInitialized { path: path.into() }
    }

    /// Create an AlreadyExistsAsNonDirectory error.
    pub fn not_a_directory(path: impl Into<PathBuf>) -> Self {
        Error::AlreadyExistsAsNonDirectory { path: path.into() }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create a NotFound error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    /// Create an Ambiguous error.
    pub fn ambiguous(prefix: impl Into<String>, candidates: usize) -> Self {
        Error::Ambiguous {
            prefix: prefix.into(),
            candidates,
        }
    }

    /// Create a Corrupt error.
    pub fn corrupt(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Create a MalformedEntry error.
    pub fn malformed_entry(line: usize, reason: impl Into<String>) -> Self {
        Error::MalformedEntry {
            line,
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedAlgorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Whether this error means "nothing matched".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Process exit code for the CLI boundary.
    ///
    /// Every error kind maps to its own non-zero code so scripts can tell a
    /// missing object apart from an ambiguous prefix.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Io { .. } | Error::Utf8Error { .. } => 1,
            Error::NotInitialized { .. } => 2,
            Error::AlreadyExistsAsNonDirectory { .. } => 3,
            Error::InvalidInput { .. } | Error::UnsupportedAlgorithm { .. } => 4,
            Error::NotFound { .. } => 5,
            Error::Ambiguous { .. } => 6,
            Error::Corrupt { .. } => 7,
            Error::MalformedEntry { .. } => 8,
        }
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}
