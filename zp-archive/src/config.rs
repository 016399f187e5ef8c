use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::args::{self, GPG_DEFAULT_ARGS, GZIP_DEFAULT_ARGS, TAR_DEFAULT_ARGS};
use crate::entry::ArchiveFormat;
use crate::error::{ArchiveError, Result};
use crate::hasher::HashAlgorithm;

/// Project-relative location of the configuration file.
pub const CONFIG_FILE: &str = ".config/zp.toml";

/// Configuration file contents. Every field is optional.
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct FileConfig {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub archive: ArchiveSection,

    #[serde(default)]
    pub identifier: IdentifierSection,

    #[serde(default)]
    pub gpg: GpgSection,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct ProjectSection {
    pub name: Option<String>,
    pub compile_dir: Option<PathBuf>,
    pub main_file: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct ArchiveSection {
    pub types: Option<Vec<String>>,
    pub persist_types: Option<Vec<String>>,
    pub dir: Option<PathBuf>,
    pub format: Option<ArchiveFormat>,
    #[serde(default)]
    pub tar_extra_args: Vec<String>,
    #[serde(default)]
    pub gzip_extra_args: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct IdentifierSection {
    pub enabled: Option<bool>,
    pub types: Option<Vec<String>>,
    pub hash_algorithms: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct GpgSection {
    pub sign: Option<bool>,
    pub uid: Option<String>,
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl FileConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(FileConfig::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: FileConfig = toml::from_str(&content)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// User-wide configuration file path
    pub fn user_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("zp.toml"))
    }

    /// Load `explicit` if given, else the project file, else the user file.
    pub fn discover(project_root: Option<&Path>, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ArchiveError::Config(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            return Self::load(path);
        }

        let candidates = project_root
            .map(|root| root.join(CONFIG_FILE))
            .into_iter()
            .chain(Self::user_path());
        for candidate in candidates {
            if candidate.exists() {
                return Self::load(&candidate);
            }
        }
        Ok(FileConfig::default())
    }
}

/// Values given on the command line. `None` and empty lists defer to the
/// configuration file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Overrides {
    pub project_name: Option<String>,
    pub compile_dir: Option<PathBuf>,
    pub main_file: Option<String>,
    pub archive_types: Option<Vec<String>>,
    pub persist_types: Option<Vec<String>>,
    pub archive_dir: Option<PathBuf>,
    pub archive_format: Option<ArchiveFormat>,
    pub tar_args: Vec<String>,
    pub gzip_args: Vec<String>,
    pub identifier_enabled: Option<bool>,
    pub identifier_types: Option<Vec<String>>,
    pub hash_algorithms: Option<Vec<HashAlgorithm>>,
    pub gpg_sign: Option<bool>,
    pub gpg_uid: Option<String>,
    pub gpg_overwrite: Option<bool>,
    pub gpg_args: Vec<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub project_root: PathBuf,
    pub project_name: String,
    pub compile_dir: PathBuf,
    /// Main artifact stem, `main` for `main.pdf`
    pub main_file: String,
    /// Main artifact extension, `pdf` for `main.pdf`
    pub main_file_extension: String,
    pub archive_types: Vec<String>,
    pub persist_types: Vec<String>,
    pub archive_dir: Option<PathBuf>,
    pub archive_format: ArchiveFormat,
    pub tar_args: Vec<String>,
    pub gzip_args: Vec<String>,
    pub identifier_enabled: bool,
    pub identifier_types: Vec<String>,
    pub hash_algorithms: Vec<HashAlgorithm>,
    pub gpg_sign: bool,
    pub gpg_uid: Option<String>,
    pub gpg_overwrite: bool,
    pub gpg_args: Vec<String>,
}

fn default_main_file() -> String {
    "main.pdf".to_string()
}

fn default_archive_types() -> Vec<String> {
    vec!["project".to_string()]
}

fn default_hash_algorithms() -> Vec<HashAlgorithm> {
    vec![HashAlgorithm::Sha256]
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Drop repeated algorithms, keeping the first occurrence.
fn distinct(algorithms: Vec<HashAlgorithm>) -> Vec<HashAlgorithm> {
    let mut seen = Vec::with_capacity(algorithms.len());
    for algorithm in algorithms {
        if !seen.contains(&algorithm) {
            seen.push(algorithm);
        }
    }
    seen
}

fn concat(file: &[String], cli: &[String]) -> Vec<String> {
    file.iter().chain(cli).cloned().collect()
}

impl ArchiveConfig {
    /// Combine command line, file and built-in defaults, in that precedence.
    ///
    /// Extra tool arguments accumulate: file arguments are merged over the
    /// defaults, then command line arguments over the result.
    pub fn resolve(project_root: &Path, file: FileConfig, overrides: Overrides) -> Result<Self> {
        let FileConfig {
            project,
            archive,
            identifier,
            gpg,
        } = file;

        let project_name = non_empty(overrides.project_name)
            .or_else(|| non_empty(project.name))
            .or_else(|| {
                project_root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .ok_or_else(|| {
                ArchiveError::Config("project name is required outside a named directory".to_string())
            })?;

        let compile_dir = overrides
            .compile_dir
            .or(project.compile_dir)
            .map(|dir| project_root.join(dir))
            .unwrap_or_else(|| project_root.to_path_buf());

        let main_file = non_empty(overrides.main_file)
            .or_else(|| non_empty(project.main_file))
            .unwrap_or_else(default_main_file);
        let (main_stem, main_extension) = main_file
            .split_once('.')
            .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
            .map(|(stem, ext)| (stem.to_string(), ext.to_string()))
            .ok_or_else(|| {
                ArchiveError::Config(format!("main file '{main_file}' has no extension"))
            })?;

        let archive_types = overrides
            .archive_types
            .or(archive.types)
            .unwrap_or_else(default_archive_types);
        let persist_types = overrides
            .persist_types
            .or(archive.persist_types)
            .unwrap_or_default();
        let archive_dir = overrides
            .archive_dir
            .or(archive.dir)
            .map(|dir| project_root.join(dir));

        if !persist_types.is_empty() && archive_dir.is_none() {
            return Err(ArchiveError::Config(
                "archive dir is required when persist types are set".to_string(),
            ));
        }

        let hash_algorithms = distinct(match overrides.hash_algorithms {
            Some(algorithms) => algorithms,
            None => match identifier.hash_algorithms {
                Some(names) => names
                    .iter()
                    .map(|name| name.parse())
                    .collect::<Result<Vec<HashAlgorithm>>>()?,
                None => default_hash_algorithms(),
            },
        });

        Ok(Self {
            project_root: project_root.to_path_buf(),
            project_name,
            compile_dir,
            main_file: main_stem,
            main_file_extension: main_extension,
            archive_types,
            persist_types,
            archive_dir,
            archive_format: overrides
                .archive_format
                .or(archive.format)
                .unwrap_or_default(),
            tar_args: args::merge_reproducible_args(
                "tar",
                &TAR_DEFAULT_ARGS,
                &concat(&archive.tar_extra_args, &overrides.tar_args),
            ),
            gzip_args: args::merge_reproducible_args(
                "gzip",
                &GZIP_DEFAULT_ARGS,
                &concat(&archive.gzip_extra_args, &overrides.gzip_args),
            ),
            identifier_enabled: overrides
                .identifier_enabled
                .or(identifier.enabled)
                .unwrap_or(false),
            identifier_types: overrides
                .identifier_types
                .or(identifier.types)
                .unwrap_or_default(),
            hash_algorithms,
            gpg_sign: overrides.gpg_sign.or(gpg.sign).unwrap_or(false),
            gpg_uid: non_empty(overrides.gpg_uid).or_else(|| non_empty(gpg.uid)),
            gpg_overwrite: overrides.gpg_overwrite.or(gpg.overwrite).unwrap_or(false),
            gpg_args: args::merge_args(&GPG_DEFAULT_ARGS, &concat(&gpg.extra_args, &overrides.gpg_args)),
        })
    }

    /// Main artifact file name inside the compile dir, e.g. `main.pdf`.
    pub fn main_file_name(&self) -> String {
        format!("{}.{}", self.main_file, self.main_file_extension)
    }

    pub fn archives(&self, kind: &str) -> bool {
        self.archive_types.iter().any(|t| t == kind)
    }

    pub fn persists(&self, kind: &str) -> bool {
        self.persist_types.iter().any(|t| t == kind)
    }

    /// Identifier hashing is on and has something to select.
    pub fn identifiers_requested(&self) -> bool {
        self.identifier_enabled && !self.identifier_types.is_empty()
    }

    /// Algorithms beyond the baseline that every entry must carry.
    pub fn identifier_algorithms(&self) -> &[HashAlgorithm] {
        if self.identifiers_requested() {
            &self.hash_algorithms
        } else {
            &[]
        }
    }
}

/// Nearest ancestor of `start` (inclusive) that contains `.git`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}
