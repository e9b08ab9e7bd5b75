use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::Error;

/// SHA-256 hash used for content addressing
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    /// zero hash (useful as sentinel)
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// parse from hex string
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let bytes = hex::decode(s).map_err(|_| Error::InvalidHashHex(s.to_string()))?;
        if bytes.len() != 32 {
            return Err(Error::InvalidHashHex(s.to_string()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// abbreviated hex form for log lines
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl std::str::FromStr for Hash {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// compute blob hash: plain SHA-256 of the content
pub fn compute_blob_hash(content: &[u8]) -> Hash {
    Hash(Sha256::digest(content).into())
}

/// streaming blob hasher for large files
pub struct BlobHasher {
    hasher: Sha256,
}

impl BlobHasher {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// feed content bytes
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// finalize and return hash
    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl Default for BlobHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// hasher for snapshot identities
///
/// format:
///   for each file, in path order:
///     len: 8 bytes LE
///     content: bytes
///   header_len: 8 bytes LE
///   header: serialized (tree, description, parent)
///
/// callers are responsible for feeding files in path-sorted order; the
/// length prefixes keep file boundaries unambiguous.
pub struct SnapshotHasher {
    hasher: Sha256,
    files: usize,
}

impl SnapshotHasher {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            files: 0,
        }
    }

    /// start the next file of `len` bytes
    pub fn begin_file(&mut self, len: u64) {
        self.hasher.update(len.to_le_bytes());
        self.files += 1;
    }

    /// feed content bytes of the current file
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// number of files fed so far
    pub fn files(&self) -> usize {
        self.files
    }

    /// append the serialized header and return the snapshot hash
    pub fn finalize(mut self, header: &[u8]) -> Hash {
        self.hasher.update((header.len() as u64).to_le_bytes());
        self.hasher.update(header);
        Hash(self.hasher.finalize().into())
    }
}

impl Default for SnapshotHasher {
    fn default() -> Self {
        Self::new()
    }
}
