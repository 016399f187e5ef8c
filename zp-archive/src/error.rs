use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Main file not found at {}. Make sure compilation completed successfully", path.display())]
    MainFileNotFound { path: PathBuf },

    #[error("Reference '{reference}' does not resolve in {}", repo.display())]
    RefNotFound { reference: String, repo: PathBuf },

    #[error("Content directory already contains .git: {}", path.display())]
    NestedRepository { path: PathBuf },

    #[error("Command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("'{tool}' not found on PATH")]
    ToolMissing { tool: String },

    #[error("Tree hash '{algorithm}' was not pre-computed for project entry {filename}; archive steps ran out of order")]
    TreeHashNotPrecomputed { algorithm: String, filename: String },

    #[error("Hash '{algorithm}' missing on entry {filename}")]
    MissingHash { algorithm: String, filename: String },

    #[error("Unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Unsupported archive format: {0}. Expected one of: zip, tar, tar.gz")]
    InvalidFormat(String),

    #[error("Archive entry escapes extraction root: {0}")]
    UnsafeEntry(String),

    #[error("Signature file already exists: {}. Enable overwrite to replace it", path.display())]
    SignatureExists { path: PathBuf },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Publication failed: {0}")]
    Publication(String),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
