//! Detached signatures for archived files.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::command;
use crate::entry::{ArchiveEntry, EntryType};
use crate::error::{ArchiveError, Result};
use crate::identifier;

/// Produces a detached signature of one file.
pub trait Signer {
    fn sign(&self, file: &Path, signature: &Path, args: &[String]) -> Result<()>;
}

/// [`Signer`] backed by the `gpg` executable.
#[derive(Debug, Default, Clone)]
pub struct GpgCli {
    pub uid: Option<String>,
}

impl GpgCli {
    pub fn new(uid: Option<String>) -> Self {
        Self { uid }
    }
}

impl Signer for GpgCli {
    fn sign(&self, file: &Path, signature: &Path, args: &[String]) -> Result<()> {
        let mut cmd = Command::new("gpg");
        cmd.arg("--batch").arg("--yes").arg("--detach-sign");
        if let Some(uid) = &self.uid {
            cmd.arg("--local-user").arg(uid);
        }
        cmd.args(args).arg("--output").arg(signature).arg(file);
        command::run(&mut cmd)?;

        let mut verify = Command::new("gpg");
        verify.arg("--batch").arg("--verify").arg(signature).arg(file);
        command::run(&mut verify)?;
        Ok(())
    }
}

/// `asc` for ASCII-armored signatures, `sig` for binary ones.
pub fn signature_extension<S: AsRef<str>>(args: &[S]) -> &'static str {
    if args.iter().any(|a| a.as_ref() == "--armor") {
        "asc"
    } else {
        "sig"
    }
}

/// Sign every non-signature entry and return the new signature entries.
///
/// Each signature sits next to its file as `{name}.{ext}.{asc|sig}` and keeps
/// the signed entry's `persist` flag. Baseline hashes are computed for it.
pub fn sign_entries<S: Signer + ?Sized>(
    entries: &[ArchiveEntry],
    signer: &S,
    args: &[String],
    overwrite: bool,
) -> Result<Vec<ArchiveEntry>> {
    let sig_ext = signature_extension(args);
    tracing::info!(
        "Signing files ({})",
        if sig_ext == "asc" { "ASCII-armored" } else { "binary" }
    );

    let mut signatures = Vec::new();
    for entry in entries.iter().filter(|e| !e.is_signature) {
        let signed_name = entry.file_name();
        let sig_path = signature_path(&entry.file_path, sig_ext);

        if sig_path.exists() && !overwrite {
            return Err(ArchiveError::SignatureExists { path: sig_path });
        }

        tracing::debug!("Signing {}", signed_name);
        signer.sign(&entry.file_path, &sig_path, args)?;

        signatures.push(ArchiveEntry::new(
            sig_path,
            signed_name,
            sig_ext,
            EntryType::Signature,
            entry.persist,
        ));
    }

    identifier::compute_file_hashes(&mut signatures, &[])?;
    Ok(signatures)
}

fn signature_path(file: &Path, sig_ext: &str) -> PathBuf {
    let mut name = file.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(sig_ext);
    file.with_file_name(name)
}
