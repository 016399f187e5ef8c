use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ArchiveError;
use crate::hasher::{FileHash, HashAlgorithm};

/// Fixed note attached to every identifier.
pub const IDENTIFIER_DESCRIPTION: &str = "sorted by hash value";

/// Container format of the project snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum ArchiveFormat {
    #[default]
    #[serde(rename = "zip")]
    #[value(name = "zip")]
    Zip,
    #[serde(rename = "tar")]
    #[value(name = "tar")]
    Tar,
    #[serde(rename = "tar.gz")]
    #[value(name = "tar.gz")]
    TarGz,
}

impl ArchiveFormat {
    pub const fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }

    pub const fn is_tar(&self) -> bool {
        matches!(self, ArchiveFormat::Tar | ArchiveFormat::TarGz)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar" => Ok(ArchiveFormat::Tar),
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            other => Err(ArchiveError::InvalidFormat(other.to_string())),
        }
    }
}

/// What an archived file represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// The compiled main artifact, e.g. the PDF
    MainFile,
    /// Snapshot of the tagged project tree
    Project,
    /// Detached signature of another entry
    Signature,
}

impl EntryType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntryType::MainFile => "main_file",
            EntryType::Project => "project",
            EntryType::Signature => "signature",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One archived file and its hashes.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveEntry {
    pub file_path: PathBuf,
    /// Logical name without extension, e.g. `demo-v1.0.0`
    pub filename: String,
    pub extension: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub persist: bool,
    pub is_preview: bool,
    pub is_signature: bool,
    pub hashes: BTreeMap<HashAlgorithm, FileHash>,
    /// Tree hashes computed from the extracted snapshot, moved into `hashes`
    /// once file hashes are computed.
    #[serde(skip)]
    pub tree_hashes: BTreeMap<HashAlgorithm, String>,
}

impl ArchiveEntry {
    pub fn new(
        file_path: impl Into<PathBuf>,
        filename: impl Into<String>,
        extension: impl Into<String>,
        entry_type: EntryType,
        persist: bool,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            filename: filename.into(),
            extension: extension.into(),
            entry_type,
            persist,
            is_preview: false,
            is_signature: entry_type == EntryType::Signature,
            hashes: BTreeMap::new(),
            tree_hashes: BTreeMap::new(),
        }
    }

    pub fn with_preview(mut self, is_preview: bool) -> Self {
        self.is_preview = is_preview;
        self
    }

    /// Name of the file on disk, e.g. `demo-v1.0.0.tar.gz`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.filename, self.extension)
    }

    pub fn hash(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.hashes.get(&algorithm).map(|h| h.value.as_str())
    }

    /// Whether the identifier selector names this entry's extension or type.
    pub fn matches_selector<S: AsRef<str>>(&self, selector: &[S]) -> bool {
        selector.iter().any(|s| {
            let s = s.as_ref();
            s == self.extension || s == self.entry_type.as_str()
        })
    }
}

/// Composite content fingerprint for one algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub algorithm: HashAlgorithm,
    pub value: String,
    pub formatted_value: String,
    /// Per-file values folded into `value`, sorted
    pub files: Vec<String>,
    pub description: String,
}
