//! Zip snapshots of a tagged project tree, from a local clone or a remote.

use git2::Repository;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use crate::command::{self, REPRODUCIBLE_ENV};
use crate::entry::ArchiveFormat;
use crate::error::{ArchiveError, Result};

/// Version control operations needed to snapshot a tag.
pub trait VcsSnapshot {
    /// Write the tree at `reference` in `repo_dir` as a zip at `output`, every
    /// path prefixed with `prefix/`.
    fn snapshot_to_zip(&self, repo_dir: &Path, reference: &str, prefix: &str, output: &Path)
        -> Result<()>;

    /// Shallow-fetch `tag` from `url` into a throwaway repository.
    fn fetch_tag(&self, url: &str, tag: &str) -> Result<ScratchClone>;
}

/// A temporary repository that is removed when dropped.
#[derive(Debug)]
pub struct ScratchClone {
    _dir: TempDir,
    repo: PathBuf,
}

impl ScratchClone {
    pub fn path(&self) -> &Path {
        &self.repo
    }
}

/// [`VcsSnapshot`] backed by the `git` executable.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCli;

impl GitCli {
    fn git(cwd: &Path) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(cwd);
        cmd
    }
}

impl VcsSnapshot for GitCli {
    fn snapshot_to_zip(
        &self,
        repo_dir: &Path,
        reference: &str,
        prefix: &str,
        output: &Path,
    ) -> Result<()> {
        // zip entry times are written in local time
        let mut cmd = Self::git(repo_dir);
        cmd.envs(REPRODUCIBLE_ENV)
            .arg("archive")
            .arg("--format=zip")
            .arg(format!("--prefix={prefix}/"))
            .arg("-o")
            .arg(output)
            .arg(reference);
        command::run(&mut cmd)?;
        Ok(())
    }

    fn fetch_tag(&self, url: &str, tag: &str) -> Result<ScratchClone> {
        let dir = tempfile::tempdir()?;
        let repo = dir.path().join("repo");
        let refspec = format!("refs/tags/{tag}:refs/tags/{tag}");

        command::run(Self::git(dir.path()).arg("init").arg("--quiet").arg(&repo))?;
        command::run(Self::git(&repo).args(["remote", "add", "origin", url]))?;
        command::run(Self::git(&repo).args(["fetch", "--depth=1", "origin", &refspec]))?;

        Ok(ScratchClone { _dir: dir, repo })
    }
}

/// A freshly written project snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub file_path: PathBuf,
    /// `{project}-{tag}`, also the directory prefix inside the archive
    pub archive_name: String,
    pub format: ArchiveFormat,
}

pub fn archive_name(project_name: &str, tag: &str) -> String {
    format!("{project_name}-{tag}")
}

/// Builds zip snapshots through a [`VcsSnapshot`].
#[derive(Debug, Default, Clone)]
pub struct ArchiveBuilder<V = GitCli> {
    vcs: V,
}

impl ArchiveBuilder<GitCli> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: VcsSnapshot> ArchiveBuilder<V> {
    pub fn with_vcs(vcs: V) -> Self {
        Self { vcs }
    }

    /// Snapshot `tag` of the local repository at `source_root` into
    /// `destination/{project}-{tag}.zip`.
    pub fn build_zip(
        &self,
        source_root: &Path,
        tag: &str,
        project_name: &str,
        destination: &Path,
    ) -> Result<Snapshot> {
        let repo = Repository::open(source_root)?;
        repo.revparse_single(tag)
            .map_err(|_| ArchiveError::RefNotFound {
                reference: tag.to_string(),
                repo: source_root.to_path_buf(),
            })?;

        let (archive_name, output) = prepare_output(project_name, tag, destination)?;
        self.vcs
            .snapshot_to_zip(source_root, tag, &archive_name, &output)?;

        tracing::info!("Created archive: {}", output.display());
        Ok(Snapshot {
            file_path: output,
            archive_name,
            format: ArchiveFormat::Zip,
        })
    }

    /// Snapshot `tag` of the repository at `remote_url`, fetched into a
    /// scratch clone that is removed afterwards.
    pub fn build_zip_from_remote(
        &self,
        remote_url: &str,
        tag: &str,
        project_name: &str,
        destination: &Path,
    ) -> Result<Snapshot> {
        tracing::info!("Fetching {} from {}", tag, remote_url);
        let (archive_name, output) = prepare_output(project_name, tag, destination)?;
        let clone = self.vcs.fetch_tag(remote_url, tag)?;
        self.vcs
            .snapshot_to_zip(clone.path(), tag, &archive_name, &output)?;

        tracing::info!("Created archive: {}", output.display());
        Ok(Snapshot {
            file_path: output,
            archive_name,
            format: ArchiveFormat::Zip,
        })
    }
}

fn prepare_output(project_name: &str, tag: &str, destination: &Path) -> Result<(String, PathBuf)> {
    fs::create_dir_all(destination)?;
    let name = archive_name(project_name, tag);
    // git runs in the repository, so the output path must not be relative
    let output = fs::canonicalize(destination)?.join(format!("{name}.zip"));
    Ok((name, output))
}

/// URL of the `origin` remote of the repository at `project_root`.
pub fn remote_url(project_root: &Path) -> Result<String> {
    let repo = Repository::open(project_root)?;
    let remote = repo.find_remote("origin")?;
    remote
        .url()
        .map(str::to_string)
        .ok_or_else(|| ArchiveError::Config("remote 'origin' has no usable URL".to_string()))
}
