//! Subprocess execution with command-line logging.

use std::io::ErrorKind;
use std::process::Command;

use crate::error::{ArchiveError, Result};

/// Environment forced on packaging tools so their output does not depend on
/// the host locale, timezone or clock.
pub const REPRODUCIBLE_ENV: [(&str, &str); 3] =
    [("LC_ALL", "C"), ("TZ", "UTC"), ("SOURCE_DATE_EPOCH", "0")];

/// Render a command the way it would be typed in a shell.
pub fn display(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `cmd` to completion and return its trimmed stdout.
///
/// A missing executable becomes [`ArchiveError::ToolMissing`]; a non-zero exit
/// becomes [`ArchiveError::CommandFailed`] carrying the tool's stderr.
pub fn run(cmd: &mut Command) -> Result<String> {
    let rendered = display(cmd);
    tracing::debug!("$ {}", rendered);

    let output = cmd.output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ArchiveError::ToolMissing {
                tool: cmd.get_program().to_string_lossy().into_owned(),
            }
        } else {
            ArchiveError::Io(e)
        }
    })?;

    if !output.status.success() {
        return Err(ArchiveError::CommandFailed {
            command: rendered,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_program_and_args() {
        let mut cmd = Command::new("git");
        cmd.arg("archive").arg("--format=zip");
        assert_eq!(display(&cmd), "git archive --format=zip");
    }

    #[test]
    fn test_missing_tool() {
        let mut cmd = Command::new("zp-archive-no-such-tool");
        match run(&mut cmd) {
            Err(ArchiveError::ToolMissing { tool }) => assert_eq!(tool, "zp-archive-no-such-tool"),
            other => panic!("expected ToolMissing, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_carries_stderr() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo boom >&2; exit 3");
        match run(&mut cmd) {
            Err(ArchiveError::CommandFailed { stderr, .. }) => assert_eq!(stderr, "boom"),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_stdout_is_trimmed() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo '  hello  '");
        assert_eq!(run(&mut cmd).unwrap(), "hello");
    }
}
