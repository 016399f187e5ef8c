use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;
use crate::entry::ArchiveFormat;
use crate::hasher::HashAlgorithm;

#[derive(Parser, Debug, Clone)]
#[clap(
    name = "zp-archive",
    version,
    about = "Build reproducible release archives and content identifiers",
    long_about = None
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,

    /// Configuration file path (default: .config/zp.toml in the project,
    /// then the user config directory)
    #[clap(long, env = "ZP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[clap(long, global = true)]
    pub debug: bool,

    /// Directory to run in (default: current directory)
    #[clap(long, global = true)]
    pub work_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Snapshot a tag and print its checksums.
    ///
    /// The project name is embedded in the archive prefix, so it must be the
    /// same across runs for hashes to match.
    Archive(ArchiveCommand),

    /// Build every configured release file, hash it and compute identifiers
    Bundle(BundleCommand),
}

/// Options shared by both subcommands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PackagingArgs {
    /// Project name for the archive prefix (default: project directory name)
    #[clap(long)]
    pub project_name: Option<String>,

    /// Project archive format
    #[clap(short, long, value_enum)]
    pub format: Option<ArchiveFormat>,

    /// Extra tar argument, repeatable (e.g. --tar-arg=--mtime=2020-01-01)
    #[clap(long = "tar-arg", allow_hyphen_values = true)]
    pub tar_args: Vec<String>,

    /// Extra gzip argument, repeatable (e.g. --gzip-arg=--fast)
    #[clap(long = "gzip-arg", allow_hyphen_values = true)]
    pub gzip_args: Vec<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ArchiveCommand {
    /// Git tag to archive
    #[clap(short, long)]
    pub tag: String,

    /// Output directory (default: a new zp-archive-* directory under the system temp dir)
    #[clap(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Git remote URL to fetch the tag from instead of the local repository
    #[clap(long, conflicts_with = "no_cache")]
    pub remote: Option<String>,

    /// Fetch the tag from the origin remote instead of the local repository
    /// (useful when the tag has not been fetched locally)
    #[clap(long)]
    pub no_cache: bool,

    /// Additional hash algorithms, comma-separated (e.g. sha512,tree,tree256)
    #[clap(long = "hash", value_delimiter = ',')]
    pub hash: Vec<HashAlgorithm>,

    #[clap(flatten)]
    pub packaging: PackagingArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct BundleCommand {
    /// Release tag
    #[clap(short, long)]
    pub tag: String,

    /// Directory holding the compiled main file, relative to the project root
    #[clap(long)]
    pub compile_dir: Option<PathBuf>,

    /// Main file name with extension (e.g. main.pdf)
    #[clap(long)]
    pub main_file: Option<String>,

    /// Types to archive, comma-separated (e.g. pdf,project)
    #[clap(long, value_delimiter = ',')]
    pub archive_types: Option<Vec<String>>,

    /// Types to keep in the archive dir, comma-separated
    #[clap(long, value_delimiter = ',')]
    pub persist_types: Option<Vec<String>>,

    /// Directory for persisted archives
    #[clap(long)]
    pub archive_dir: Option<PathBuf>,

    /// Compute identifiers over the selected files
    #[clap(long)]
    pub identifier: bool,

    /// File types or extensions folded into identifiers (e.g. pdf,project)
    #[clap(long, value_delimiter = ',')]
    pub identifier_types: Option<Vec<String>>,

    /// Identifier hash algorithms, comma-separated
    #[clap(long, value_delimiter = ',')]
    pub hash_algorithms: Option<Vec<HashAlgorithm>>,

    /// Sign every file with a detached GPG signature
    #[clap(long)]
    pub sign: bool,

    /// GPG key UID (default: gpg's default key)
    #[clap(long)]
    pub gpg_uid: Option<String>,

    /// Overwrite existing signature files
    #[clap(long)]
    pub gpg_overwrite: bool,

    /// Extra gpg argument, repeatable (use --gpg-arg=--no-armor for binary .sig)
    #[clap(long = "gpg-arg", allow_hyphen_values = true)]
    pub gpg_args: Vec<String>,

    /// JSON file holding the latest published record. The release is compared
    /// against it, and with --doi and --record-url a new version is recorded
    /// in it.
    #[clap(long)]
    pub previous_record: Option<PathBuf>,

    /// Record a new version even when the files match the previous record
    #[clap(long, requires = "previous_record", requires = "doi")]
    pub force: bool,

    /// Write the publication info file into this directory
    #[clap(long, requires = "doi")]
    pub info_json: Option<PathBuf>,

    /// DOI of the published version
    #[clap(long, requires = "record_url")]
    pub doi: Option<String>,

    /// URL of the published record
    #[clap(long)]
    pub record_url: Option<String>,

    #[clap(flatten)]
    pub packaging: PackagingArgs,
}

fn set(flag: bool) -> Option<bool> {
    flag.then_some(true)
}

impl From<&PackagingArgs> for Overrides {
    fn from(args: &PackagingArgs) -> Self {
        Overrides {
            project_name: args.project_name.clone(),
            archive_format: args.format,
            tar_args: args.tar_args.clone(),
            gzip_args: args.gzip_args.clone(),
            ..Overrides::default()
        }
    }
}

impl From<&ArchiveCommand> for Overrides {
    fn from(cmd: &ArchiveCommand) -> Self {
        Overrides::from(&cmd.packaging)
    }
}

impl From<&BundleCommand> for Overrides {
    fn from(cmd: &BundleCommand) -> Self {
        Overrides {
            compile_dir: cmd.compile_dir.clone(),
            main_file: cmd.main_file.clone(),
            archive_types: cmd.archive_types.clone(),
            persist_types: cmd.persist_types.clone(),
            archive_dir: cmd.archive_dir.clone(),
            identifier_enabled: set(cmd.identifier),
            identifier_types: cmd.identifier_types.clone(),
            hash_algorithms: cmd.hash_algorithms.clone(),
            gpg_sign: set(cmd.sign),
            gpg_uid: cmd.gpg_uid.clone(),
            gpg_overwrite: set(cmd.gpg_overwrite),
            gpg_args: cmd.gpg_args.clone(),
            ..Overrides::from(&cmd.packaging)
        }
    }
}
