//! Extraction of project snapshots and their repackaging as tar or tar.gz.
//!
//! A snapshot zip is extracted at most once per call to
//! [`FormatConverter::process_project_archive`]; the same extracted tree feeds
//! every requested tree hash and the tar conversion.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::command::{self, REPRODUCIBLE_ENV};
use crate::entry::ArchiveFormat;
use crate::error::{ArchiveError, Result};
use crate::hasher::HashAlgorithm;
use crate::tree;

/// Unpacks an archive into a scratch directory.
pub trait Extractor {
    /// Extract `archive` into `scratch_dir` and return the content root.
    fn extract(&self, archive: &Path, scratch_dir: &Path) -> Result<PathBuf>;
}

/// Extractor for `.zip`, `.tar`, `.tar.gz` and `.tgz` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveExtractor;

impl Extractor for ArchiveExtractor {
    fn extract(&self, archive: &Path, scratch_dir: &Path) -> Result<PathBuf> {
        let name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ArchiveError::InvalidFormat(archive.display().to_string()))?;

        if name.ends_with(".zip") {
            extract_zip(archive, scratch_dir)?;
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            let decoder = flate2::read::GzDecoder::new(File::open(archive)?);
            tar::Archive::new(decoder).unpack(scratch_dir)?;
        } else if name.ends_with(".tar") {
            tar::Archive::new(File::open(archive)?).unpack(scratch_dir)?;
        } else {
            return Err(ArchiveError::InvalidFormat(name.to_string()));
        }

        content_root(scratch_dir)
    }
}

/// The single top-level directory of an extraction, or the root itself.
fn content_root(scratch_dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(scratch_dir)?.collect::<io::Result<Vec<_>>>()?;
    if let [only] = entries.as_slice() {
        if only.file_type()?.is_dir() {
            return Ok(only.path());
        }
    }
    Ok(scratch_dir.to_path_buf())
}

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let relative = file
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafeEntry(file.name().to_string()))?;
        let outpath = dest_dir.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }

        let mode = file.unix_mode();
        if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
            let mut target = String::new();
            io::Read::read_to_string(&mut file, &mut target)?;
            create_symlink(&target, &outpath)?;
            continue;
        }

        let mut outfile = File::create(&outpath)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = mode {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode & 0o777))?;
            }
        }
    }

    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &str, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_symlink(target: &str, link: &Path) -> Result<()> {
    fs::write(link, target)?;
    Ok(())
}

/// Package `content_dir` as `output_path` with the system `tar` (and `gzip`
/// when `compress` is set).
///
/// The directory's own name becomes the archive prefix. `tar_args` and
/// `gzip_args` are the merged argument lists; the tools always run under
/// [`REPRODUCIBLE_ENV`].
pub fn pack_tar(
    content_dir: &Path,
    output_path: &Path,
    compress: bool,
    tar_args: &[String],
    gzip_args: &[String],
) -> Result<()> {
    let parent = content_dir.parent().unwrap_or(content_dir);
    let dirname = content_dir
        .file_name()
        .ok_or_else(|| ArchiveError::UnsafeEntry(content_dir.display().to_string()))?;

    // gzip replaces `<name>.tar` with `<name>.tar.gz`
    let tar_path = if compress {
        output_path.with_extension("")
    } else {
        output_path.to_path_buf()
    };

    // gzip refuses to overwrite an existing output
    for stale in [output_path, tar_path.as_path()] {
        if stale.exists() {
            tracing::debug!("Replacing existing {}", stale.display());
            fs::remove_file(stale)?;
        }
    }

    let mut tar = Command::new("tar");
    tar.envs(REPRODUCIBLE_ENV)
        .args(tar_args)
        .arg("-cf")
        .arg(&tar_path)
        .arg("-C")
        .arg(parent)
        .arg(dirname);
    command::run(&mut tar)?;

    if compress {
        let mut gzip = Command::new("gzip");
        gzip.envs(REPRODUCIBLE_ENV).args(gzip_args).arg(&tar_path);
        command::run(&mut gzip)?;
    }

    tracing::info!("Created archive: {}", output_path.display());
    Ok(())
}

/// Outcome of post-processing a project snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedArchive {
    pub path: PathBuf,
    pub format: ArchiveFormat,
    pub tree_hashes: BTreeMap<HashAlgorithm, String>,
}

/// Computes tree hashes and converts snapshots between container formats.
#[derive(Debug, Default, Clone)]
pub struct FormatConverter<E = ArchiveExtractor> {
    extractor: E,
}

impl FormatConverter<ArchiveExtractor> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: Extractor> FormatConverter<E> {
    pub fn with_extractor(extractor: E) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn extract(&self, archive: &Path, scratch_dir: &Path) -> Result<PathBuf> {
        self.extractor.extract(archive, scratch_dir)
    }

    /// Hash and/or repackage a snapshot zip.
    ///
    /// Returns the zip unchanged when no tree hash and no tar format are
    /// requested. Otherwise the zip is extracted once into a temporary
    /// directory; after a successful tar conversion the zip is removed.
    pub fn process_project_archive(
        &self,
        zip_path: &Path,
        filename: &str,
        tree_algorithms: &[HashAlgorithm],
        target_format: ArchiveFormat,
        tar_args: &[String],
        gzip_args: &[String],
    ) -> Result<ProcessedArchive> {
        let tree_algorithms: Vec<HashAlgorithm> =
            tree_algorithms.iter().copied().filter(HashAlgorithm::is_tree).collect();

        let passthrough = ProcessedArchive {
            path: zip_path.to_path_buf(),
            format: ArchiveFormat::Zip,
            tree_hashes: BTreeMap::new(),
        };
        if tree_algorithms.is_empty() && !target_format.is_tar() {
            return Ok(passthrough);
        }

        let scratch = tempfile::tempdir()?;
        let content_dir = self.extract(zip_path, scratch.path())?;

        let mut tree_hashes = BTreeMap::new();
        for algorithm in tree_algorithms {
            if let Some(format) = algorithm.tree_format() {
                tree_hashes.insert(algorithm, tree::hash_tree(&content_dir, format)?);
            }
        }

        if !target_format.is_tar() {
            return Ok(ProcessedArchive {
                tree_hashes,
                ..passthrough
            });
        }

        let parent = zip_path.parent().unwrap_or_else(|| Path::new("."));
        let tar_path = parent.join(format!("{}.{}", filename, target_format.extension()));
        pack_tar(
            &content_dir,
            &tar_path,
            target_format == ArchiveFormat::TarGz,
            tar_args,
            gzip_args,
        )?;
        fs::remove_file(zip_path)?;

        Ok(ProcessedArchive {
            path: tar_path,
            format: target_format,
            tree_hashes,
        })
    }
}
