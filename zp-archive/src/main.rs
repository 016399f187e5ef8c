use anyhow::{Context as _, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use zp_archive::archiver::{ArchiveOutput, Archiver, SnapshotRequest, SnapshotSource};
use zp_archive::cli::{ArchiveCommand, BundleCommand, Cli, Command};
use zp_archive::config::{self, ArchiveConfig, FileConfig, Overrides};
use zp_archive::context::Context;
use zp_archive::entry::IDENTIFIER_DESCRIPTION;
use zp_archive::publish::{self, PublicationInfo, PublishDecision, Publisher, RecordFile, RecordHandle};
use zp_archive::signing::{self, GpgCli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let work_dir = match &cli.work_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let project_root = config::find_project_root(&work_dir);

    // Installed before config resolution so its warnings are shown
    let label = project_root
        .as_deref()
        .unwrap_or(work_dir.as_path())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Context::init(label, cli.debug);

    let file = FileConfig::discover(project_root.as_deref(), cli.config.as_deref())
        .context("Failed to load configuration")?;

    match &cli.command {
        Command::Archive(cmd) => run_archive(cmd, &work_dir, project_root, file),
        Command::Bundle(cmd) => run_bundle(cmd, project_root, file),
    }
}

fn run_archive(
    cmd: &ArchiveCommand,
    work_dir: &Path,
    project_root: Option<PathBuf>,
    file: FileConfig,
) -> Result<()> {
    let root = match project_root {
        Some(root) => root,
        None if cmd.remote.is_none() => {
            anyhow::bail!("Cannot find project root (no .git directory found)")
        }
        None if cmd.packaging.project_name.is_none() => {
            anyhow::bail!("--project-name is required when using --remote outside a git repository")
        }
        None => work_dir.to_path_buf(),
    };

    let config = ArchiveConfig::resolve(&root, file, Overrides::from(cmd))?;
    let ctx = Context::new(&config.project_name);

    let source = match (&cmd.remote, cmd.no_cache) {
        (Some(url), _) => SnapshotSource::Remote(url.clone()),
        (None, true) => SnapshotSource::Origin,
        (None, false) => SnapshotSource::Local,
    };

    let report = Archiver::new(&ctx, &config)
        .snapshot_report(&SnapshotRequest {
            tag: cmd.tag.clone(),
            source,
            output_dir: cmd.output_dir.clone(),
            extra_algorithms: cmd.hash.clone(),
        })
        .context("Error during archive")?;

    println!();
    print!("{}", report.render());
    Ok(())
}

fn run_bundle(
    cmd: &BundleCommand,
    project_root: Option<PathBuf>,
    file: FileConfig,
) -> Result<()> {
    let root = project_root.context("Cannot find project root (no .git directory found)")?;
    let config = ArchiveConfig::resolve(&root, file, Overrides::from(cmd))?;
    let ctx = Context::new(&config.project_name);

    ctx.step(&format!("Archiving {} {}", config.project_name, cmd.tag));
    let ArchiveOutput {
        mut entries,
        identifiers,
        scratch,
    } = Archiver::new(&ctx, &config)
        .archive(&cmd.tag)
        .context("Error during archive")?;

    if config.gpg_sign {
        let signer = GpgCli::new(config.gpg_uid.clone());
        let signatures =
            signing::sign_entries(&entries, &signer, &config.gpg_args, config.gpg_overwrite)
                .context("GPG signing failed")?;
        entries.extend(signatures);
    }

    println!();
    for entry in &entries {
        let location = if entry.persist { "" } else { " (temporary)" };
        println!("{}{}", entry.file_path.display(), location);
        for hash in entry.hashes.values() {
            println!("    {}", hash.formatted_value);
        }
    }

    if let Some(identifiers) = &identifiers {
        println!(
            "\nIdentifiers ({} *{})",
            config.identifier_types.join("+"),
            IDENTIFIER_DESCRIPTION
        );
        for value in publish::alternate_identifiers(identifiers) {
            println!("    {}", value);
        }
    }

    if let Some(path) = &cmd.previous_record {
        let handle = match (&cmd.doi, &cmd.record_url) {
            (Some(doi), Some(record_url)) => Some(RecordHandle {
                doi: doi.clone(),
                record_url: record_url.clone(),
            }),
            _ => None,
        };
        let publisher = RecordFile::new(path, handle.clone());
        let failed = || format!("Failed to update published record {}", path.display());

        if handle.is_some() {
            let outcome = publish::publish_if_needed(
                &publisher,
                &cmd.tag,
                &entries,
                identifiers.as_deref(),
                cmd.force,
            )
            .with_context(failed)?;
            print_decision(&cmd.tag, &outcome.decision);
            if outcome.published {
                println!("Recorded '{}' in {}", cmd.tag, path.display());
            }
        } else {
            let previous = publisher.latest_record().with_context(failed)?;
            print_decision(
                &cmd.tag,
                &PublishDecision::decide(&cmd.tag, &entries, previous.as_ref()),
            );
        }
    }

    if let Some(dir) = &cmd.info_json {
        let doi = cmd.doi.as_deref().context("--doi is required with --info-json")?;
        let record_url = cmd
            .record_url
            .as_deref()
            .context("--record-url is required with --info-json")?;
        let info = PublicationInfo::build(doi, record_url, &entries, identifiers.as_deref())?;
        let path = info.write_to(dir)?;
        println!("\nPublication info: {}", path.display());
    }

    if entries.iter().any(|e| !e.persist) {
        ctx.detail(&format!("Removing temporary files in {}", scratch.path().display()));
    }
    drop(scratch);

    Ok(())
}

fn print_decision(tag: &str, decision: &PublishDecision) {
    match decision {
        PublishDecision::UpToDate { reason } => println!("\n{reason}. No publication needed."),
        PublishDecision::Publish {
            new_files,
            removed_files,
        } => println!(
            "\nNew version '{}': {} new/modified file(s), {} removed file(s)",
            tag, new_files, removed_files
        ),
    }
}
