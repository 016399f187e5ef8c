//! # zp-archive
//!
//! Reproducible release archives and content identifiers.
//!
//! ## Overview
//!
//! `zp-archive` turns a tagged project tree into deterministic archive files
//! and computes identifiers that let anyone check, later and independently,
//! that a published file matches the tagged source.
//!
//! ## Features
//!
//! - Zip snapshots via `git archive`, from the local repository or a remote
//! - Byte-reproducible `tar` and `tar.gz` conversion
//! - md5/sha* file hashes and git-compatible tree hashes (`tree`, `tree256`)
//!   that do not depend on the container format
//! - Composite identifiers folded from several files
//! - Detached GPG signatures and a publication info file
//!
//! ## Usage
//!
//! ```bash
//! # Snapshot a tag and print its checksums
//! zp-archive archive --tag v1.0.0 --hash tree256
//!
//! # Same, from the remote origin, as tar.gz
//! zp-archive archive --tag v1.0.0 --no-cache --format tar.gz
//!
//! # Build the configured release files with identifiers
//! zp-archive bundle --tag v1.0.0 --identifier --identifier-types project
//! ```
//!
//! ## Configuration
//!
//! Settings are read from `.config/zp.toml` in the project, falling back to
//! `zp.toml` in the user configuration directory. Command line flags take
//! precedence over the file.

/// The archive pipeline and the standalone snapshot report
pub mod archiver;

/// Default and user argument merging for external tools
pub mod args;

/// Command-line interface definitions
pub mod cli;

/// Subprocess execution
pub mod command;

/// Configuration file handling and resolution
pub mod config;

/// Logging setup and step reporting
pub mod context;

/// Extraction and tar repackaging of snapshots
pub mod converter;

/// Archive entries, formats and identifiers
pub mod entry;

/// Error types and error handling utilities
pub mod error;

/// File and byte hashing
pub mod hasher;

/// File hashes and identifier folding
pub mod identifier;

/// Publication decision and publication info file
pub mod publish;

/// Detached signatures
pub mod signing;

/// Zip snapshots of tagged project trees
pub mod snapshot;

/// Git-compatible tree hashing
pub mod tree;
