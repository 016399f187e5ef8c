//! The archive pipeline: collect release files, normalise the project
//! snapshot, hash everything and fold identifiers.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::ArchiveConfig;
use crate::context::Context;
use crate::converter::{ArchiveExtractor, Extractor, FormatConverter};
use crate::entry::{ArchiveEntry, ArchiveFormat, EntryType, Identifier};
use crate::error::{ArchiveError, Result};
use crate::hasher::{self, HashAlgorithm};
use crate::identifier;
use crate::snapshot::{self, ArchiveBuilder, GitCli, Snapshot, VcsSnapshot};

/// Files produced for one tag.
///
/// Entries that are not persisted live under `scratch` and are removed when
/// the output is dropped.
#[derive(Debug)]
pub struct ArchiveOutput {
    pub entries: Vec<ArchiveEntry>,
    pub identifiers: Option<Vec<Identifier>>,
    pub scratch: TempDir,
}

/// Where the standalone archive command takes its snapshot from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    /// The local repository at the project root
    Local,
    /// The `origin` remote of the local repository, fetched fresh
    Origin,
    Remote(String),
}

#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub tag: String,
    pub source: SnapshotSource,
    pub output_dir: Option<PathBuf>,
    /// Algorithms requested on top of the configured ones
    pub extra_algorithms: Vec<HashAlgorithm>,
}

/// Final snapshot and its hashes, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotReport {
    pub path: PathBuf,
    pub format: ArchiveFormat,
    pub hashes: Vec<(HashAlgorithm, String)>,
}

impl SnapshotReport {
    /// `label:  value` lines with labels padded to the same width.
    pub fn render(&self) -> String {
        let pad = self
            .hashes
            .iter()
            .map(|(a, _)| a.name().len())
            .chain(std::iter::once("Archive".len()))
            .max()
            .unwrap_or_default();

        let mut out = format!("{:<pad$}:  {}\n", "Archive", self.path.display());
        for (algorithm, value) in &self.hashes {
            out.push_str(&format!("{:<pad$}:  {}\n", algorithm.name(), value));
        }
        out
    }
}

/// Drives the archive builder, the format converter and the hashers for one
/// resolved configuration.
pub struct Archiver<'a, V = GitCli, E = ArchiveExtractor> {
    ctx: &'a Context,
    config: &'a ArchiveConfig,
    builder: ArchiveBuilder<V>,
    converter: FormatConverter<E>,
}

impl<'a> Archiver<'a> {
    pub fn new(ctx: &'a Context, config: &'a ArchiveConfig) -> Self {
        Self::with_parts(ctx, config, ArchiveBuilder::new(), FormatConverter::new())
    }
}

impl<'a, V: VcsSnapshot, E: Extractor> Archiver<'a, V, E> {
    pub fn with_parts(
        ctx: &'a Context,
        config: &'a ArchiveConfig,
        builder: ArchiveBuilder<V>,
        converter: FormatConverter<E>,
    ) -> Self {
        Self {
            ctx,
            config,
            builder,
            converter,
        }
    }

    fn destination<'p>(&'p self, persist: bool, scratch: &'p Path) -> &'p Path {
        match (&self.config.archive_dir, persist) {
            (Some(dir), true) => dir.as_path(),
            _ => scratch,
        }
    }

    /// Build every configured archive for `tag`, hash it and compute the
    /// identifiers. Any failure aborts the whole run.
    pub fn archive(&self, tag: &str) -> Result<ArchiveOutput> {
        let config = self.config;
        let scratch = tempfile::Builder::new().prefix("zp-archive-").tempdir()?;
        let mut entries = Vec::new();

        if config.archives(&config.main_file_extension) {
            entries.push(self.archive_main_file(tag, scratch.path())?);
        }

        if config.archives("project") {
            entries.push(self.archive_project(tag, scratch.path())?);
        }

        let algorithms = config.identifier_algorithms();

        if let Some(project) = entries
            .iter_mut()
            .find(|e| e.entry_type == EntryType::Project)
        {
            let processed = self.converter.process_project_archive(
                &project.file_path,
                &project.filename,
                algorithms,
                config.archive_format,
                &config.tar_args,
                &config.gzip_args,
            )?;
            project.file_path = processed.path;
            project.extension = processed.format.extension().to_string();
            project.tree_hashes = processed.tree_hashes;
        }

        self.ctx.step("Computing hashes");
        identifier::compute_file_hashes(&mut entries, algorithms)?;

        let identifiers = if config.identifiers_requested() {
            identifier::compute_identifiers(
                &entries,
                &config.identifier_types,
                &config.hash_algorithms,
            )?
        } else {
            None
        };

        if let Some(identifiers) = &identifiers {
            for id in identifiers {
                self.ctx.detail(&format!("identifier {}", id.formatted_value));
            }
        }
        self.ctx.step_ok(&format!("{} file(s) archived for {}", entries.len(), tag));

        Ok(ArchiveOutput {
            entries,
            identifiers,
            scratch,
        })
    }

    fn archive_main_file(&self, tag: &str, scratch: &Path) -> Result<ArchiveEntry> {
        let config = self.config;
        let source = config.compile_dir.join(config.main_file_name());
        if !source.is_file() {
            return Err(ArchiveError::MainFileNotFound { path: source });
        }

        let extension = &config.main_file_extension;
        let persist = config.persists(extension);
        let filename = snapshot::archive_name(&config.project_name, tag);
        let dir = self.destination(persist, scratch);
        fs::create_dir_all(dir)?;
        let target = dir.join(format!("{filename}.{extension}"));

        self.ctx.step(&format!(
            "Copying {} to {}",
            config.main_file_name(),
            target.display()
        ));
        fs::copy(&source, &target)?;

        Ok(ArchiveEntry::new(target, filename, extension.as_str(), EntryType::MainFile, persist)
            .with_preview(true))
    }

    fn archive_project(&self, tag: &str, scratch: &Path) -> Result<ArchiveEntry> {
        let config = self.config;
        let persist = config.persists("project");
        let dir = self.destination(persist, scratch);

        self.ctx.step(&format!("Archiving project at {tag}"));
        let Snapshot {
            file_path,
            archive_name,
            format,
        } = self
            .builder
            .build_zip(&config.project_root, tag, &config.project_name, dir)?;

        let is_preview = config.main_file_extension == format.extension();
        Ok(
            ArchiveEntry::new(file_path, archive_name, format.extension(), EntryType::Project, persist)
                .with_preview(is_preview),
        )
    }

    /// Standalone archive: snapshot a tag, normalise it and hash it without
    /// any release bookkeeping.
    pub fn snapshot_report(&self, request: &SnapshotRequest) -> Result<SnapshotReport> {
        let config = self.config;
        let mut extra = config.hash_algorithms.clone();
        for algorithm in &request.extra_algorithms {
            if !extra.contains(algorithm) {
                extra.push(*algorithm);
            }
        }
        let algorithms = identifier::with_baseline(&extra);

        // kept after the run, the report points into it
        let output_dir = match &request.output_dir {
            Some(dir) => dir.clone(),
            None => tempfile::Builder::new()
                .prefix("zp-archive-")
                .tempdir()?
                .into_path(),
        };

        let snapshot = match &request.source {
            SnapshotSource::Remote(url) => self.builder.build_zip_from_remote(
                url,
                &request.tag,
                &config.project_name,
                &output_dir,
            )?,
            SnapshotSource::Origin => {
                let url = snapshot::remote_url(&config.project_root)?;
                self.ctx.step(&format!("Cloning from {url}"));
                self.builder.build_zip_from_remote(
                    &url,
                    &request.tag,
                    &config.project_name,
                    &output_dir,
                )?
            }
            SnapshotSource::Local => self
                .builder
                .build_zip(&config.project_root, &request.tag, &config.project_name, &output_dir)
                .inspect_err(|_| {
                    tracing::warn!(
                        "Hint: use --no-cache to archive from the remote origin without touching the local repo"
                    )
                })?,
        };

        let tree_algorithms: Vec<HashAlgorithm> =
            algorithms.iter().copied().filter(HashAlgorithm::is_tree).collect();
        let processed = self.converter.process_project_archive(
            &snapshot.file_path,
            &snapshot.archive_name,
            &tree_algorithms,
            config.archive_format,
            &config.tar_args,
            &config.gzip_args,
        )?;

        let mut hashes = Vec::with_capacity(algorithms.len());
        for algorithm in algorithms {
            let value = match processed.tree_hashes.get(&algorithm) {
                Some(tree) => tree.clone(),
                None => hasher::hash_file(&processed.path, algorithm)?.value,
            };
            hashes.push((algorithm, value));
        }

        Ok(SnapshotReport {
            path: processed.path,
            format: processed.format,
            hashes,
        })
    }
}
