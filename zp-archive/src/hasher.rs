//! File and byte hashing across the supported algorithms.
//!
//! Whole-file algorithms (`md5`, `sha*`) digest the bytes of a file. Tree
//! algorithms (`tree`, `tree256`) name a git object format: for a project
//! snapshot they are computed over the extracted content by [`crate::tree`],
//! for any other file they fall back to the underlying digest of the file.

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ArchiveError, Result};

const CHUNK_SIZE: usize = 8192;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    /// Git tree id with SHA-1 objects
    Tree,
    /// Git tree id with SHA-256 objects
    Tree256,
}

/// Object format of a git tree hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectFormat {
    Sha1,
    Sha256,
}

impl ObjectFormat {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Whole-file algorithm with the same digest width.
    pub const fn digest_algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Sha1 => HashAlgorithm::Sha1,
            Self::Sha256 => HashAlgorithm::Sha256,
        }
    }
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 8] = [
        Self::Md5,
        Self::Sha1,
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Tree,
        Self::Tree256,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Tree => "tree",
            Self::Tree256 => "tree256",
        }
    }

    /// Object format for tree algorithms, `None` for whole-file ones.
    pub const fn tree_format(&self) -> Option<ObjectFormat> {
        match self {
            Self::Tree => Some(ObjectFormat::Sha1),
            Self::Tree256 => Some(ObjectFormat::Sha256),
            _ => None,
        }
    }

    pub const fn is_tree(&self) -> bool {
        self.tree_format().is_some()
    }

    /// The algorithm that actually digests bytes for this label.
    pub const fn digest_algorithm(&self) -> HashAlgorithm {
        match self.tree_format() {
            Some(format) => format.digest_algorithm(),
            None => *self,
        }
    }

    /// Parse a comma-separated list, ignoring blanks.
    pub fn parse_list(list: &str) -> Result<Vec<HashAlgorithm>> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(HashAlgorithm::from_str)
            .collect()
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|algo| algo.name() == lowered)
            .ok_or_else(|| ArchiveError::UnknownAlgorithm(s.to_string()))
    }
}

/// A computed hash, both bare and prefixed with its algorithm label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHash {
    pub value: String,
    pub formatted_value: String,
}

impl FileHash {
    pub fn new(algorithm: HashAlgorithm, value: impl Into<String>) -> Self {
        let value = value.into();
        let formatted_value = format!("{algorithm}:{value}");
        Self {
            value,
            formatted_value,
        }
    }
}

enum DigestState {
    Md5(Md5),
    Sha1(Sha1),
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl DigestState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm.digest_algorithm() {
            HashAlgorithm::Md5 => Self::Md5(Md5::new()),
            HashAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            HashAlgorithm::Sha224 => Self::Sha224(Sha224::new()),
            HashAlgorithm::Sha384 => Self::Sha384(Sha384::new()),
            HashAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
            _ => Self::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha1(h) => h.update(data),
            Self::Sha224(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Md5(h) => hex::encode(h.finalize()),
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha224(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha384(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Compute the hash of an in-memory byte slice.
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> FileHash {
    let mut state = DigestState::new(algorithm);
    state.update(data);
    FileHash::new(algorithm, state.finalize_hex())
}

/// Stream a file through the digest for `algorithm`.
///
/// Tree algorithms digest the file with their object format's width and keep
/// the tree label.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<FileHash> {
    let mut file = File::open(path)?;
    let mut state = DigestState::new(algorithm);
    let mut buffer = [0; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        state.update(&buffer[..bytes_read]);
    }

    Ok(FileHash::new(algorithm, state.finalize_hex()))
}
