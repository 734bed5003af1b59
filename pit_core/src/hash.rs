//! Hashing functionality using SHA-1.

use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use sha1::{Digest, Sha1};
use std::fmt;
use std::io::Read;

/// Hash digest size in bytes (SHA-1 produces 160-bit hashes).
pub const HASH_SIZE: usize = 20;

/// Length of a full digest in hex characters.
pub const HASH_HEX_LEN: usize = HASH_SIZE * 2;

/// Width of the shard directory name in hex characters.
pub const SHARD_LEN: usize = 2;

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// SHA-1 with 160-bit output.
    Sha1,
}

impl Algorithm {
    /// Returns the string representation of the algorithm (for config files).
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha1 => "sha1",
        }
    }

    /// Parse algorithm from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "sha1" => Ok(Algorithm::Sha1),
            _ => Err(Error::unsupported_algorithm(s)),
        }
    }

    /// Length of a digest produced by this algorithm, in hex characters.
    pub fn hex_len(&self) -> usize {
        match self {
            Algorithm::Sha1 => HASH_HEX_LEN,
        }
    }
}

/// Input that can be content-addressed.
///
/// Implemented for raw bytes and for text; text is hashed as its UTF-8
/// encoding. Other types (booleans, numbers) deliberately have no impl.
pub trait Digestible {
    /// The exact bytes that identify this content.
    fn content_bytes(&self) -> &[u8];
}

impl Digestible for [u8] {
    fn content_bytes(&self) -> &[u8] {
        self
    }
}

impl<const N: usize> Digestible for [u8; N] {
    fn content_bytes(&self) -> &[u8] {
        self
    }
}

impl Digestible for Vec<u8> {
    fn content_bytes(&self) -> &[u8] {
        self
    }
}

impl Digestible for str {
    fn content_bytes(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Digestible for String {
    fn content_bytes(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<T: Digestible + ?Sized> Digestible for &T {
    fn content_bytes(&self) -> &[u8] {
        (**self).content_bytes()
    }
}

/// A 20-byte SHA-1 hash digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    /// Create a Hash from raw bytes.
    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    /// Create a Hash from a hex string (40 hex characters, any case).
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if hex_str.len() != HASH_HEX_LEN {
            return Err(Error::invalid_input(format!(
                "Expected {} hex characters, got {}",
                HASH_HEX_LEN,
                hex_str.len()
            )));
        }

        let bytes = hex::decode(hex_str.to_ascii_lowercase())
            .map_err(|e| Error::invalid_input(format!("Invalid hex: {}", e)))?;

        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(&bytes);
        Ok(Hash(hash))
    }

    /// Convert to hex string (40 lowercase characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get the first 2 hex characters (for directory sharding).
    pub fn prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// Get the remaining 38 hex characters (for filename).
    pub fn suffix(&self) -> String {
        hex::encode(&self.0[1..])
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Digest bytes or text.
    pub fn digest<T: Digestible + ?Sized>(input: &T) -> Self {
        Self::hash_bytes(input.content_bytes())
    }

    /// Digest a value that may be absent.
    ///
    /// Absent input is rejected rather than hashed as an empty sequence.
    pub fn digest_opt<T: Digestible + ?Sized>(input: Option<&T>) -> Result<Self> {
        input
            .map(|value| Self::digest(value))
            .ok_or_else(|| Error::invalid_input("Cannot digest an absent value"))
    }

    /// Hash raw bytes using SHA-1.
    pub fn hash_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(&hasher.finalize());
        Hash(hash)
    }

    /// Hash data from a reader using SHA-1.
    pub fn hash_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut hasher = Sha1::new();
        std::io::copy(&mut reader, &mut hasher)?;
        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(&hasher.finalize());
        Ok(Hash(hash))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// A full or partial digest, as typed by a user.
///
/// Always lowercase hex, between 1 and 40 characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashPrefix(String);

impl HashPrefix {
    /// Validate and normalize a digest prefix.
    pub fn parse(input: &str) -> Result<Self> {
        let prefix = input.trim().to_ascii_lowercase();

        if prefix.is_empty() {
            return Err(Error::invalid_input("Digest prefix cannot be empty"));
        }

        if prefix.len() > HASH_HEX_LEN {
            return Err(Error::invalid_input(format!(
                "Digest prefix is {} characters, at most {} allowed",
                prefix.len(),
                HASH_HEX_LEN
            )));
        }

        if !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::invalid_input(format!(
                "Digest prefix contains non-hex characters: {}",
                input.trim()
            )));
        }

        Ok(HashPrefix(prefix))
    }

    /// The normalized prefix text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of hex characters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; an empty prefix cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The full digest, if every character is present.
    pub fn as_full(&self) -> Option<Hash> {
        if self.0.len() == HASH_HEX_LEN {
            Hash::from_hex(&self.0).ok()
        } else {
            None
        }
    }

    /// Split into the shard-level and leaf-level parts.
    ///
    /// The leaf part is empty for prefixes of 1 or 2 characters.
    pub fn split(&self) -> (&str, &str) {
        self.0.split_at(self.0.len().min(SHARD_LEN))
    }
}

impl fmt::Display for HashPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Hash> for HashPrefix {
    fn from(hash: Hash) -> Self {
        HashPrefix(hash.to_hex())
    }
}
