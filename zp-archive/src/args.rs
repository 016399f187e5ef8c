//! Merging default tool arguments with user-supplied ones.
//!
//! Arguments are keyed so that a user value replaces the default with the same
//! key in place, and `--no-X` removes a default `--X` instead of being passed on.

/// Arguments that make `tar` output byte-reproducible.
pub const TAR_DEFAULT_ARGS: [&str; 8] = [
    "--sort=name",
    "--format=posix",
    "--pax-option=exthdr.name=%d/PaxHeaders/%f,delete=atime,delete=ctime",
    "--mtime=1970-01-01 00:00:00Z",
    "--numeric-owner",
    "--owner=0",
    "--group=0",
    "--mode=go+u,go-w",
];

/// Arguments that strip the original name and timestamp from gzip output.
pub const GZIP_DEFAULT_ARGS: [&str; 2] = ["--no-name", "--best"];

/// Detached signatures are ASCII-armored unless the user passes `--no-armor`.
pub const GPG_DEFAULT_ARGS: [&str; 1] = ["--armor"];

/// Key under which an argument is deduplicated.
///
/// `--key=value` and `--flag` key on the long name, `-j4` on `-j`,
/// `NAME=value` on `NAME`; anything else keys on itself.
fn arg_key(arg: &str) -> &str {
    if let Some(long) = arg.strip_prefix("--") {
        return long.split('=').next().unwrap_or(long);
    }
    if arg.starts_with('-') && arg.len() > 2 {
        let end = arg.char_indices().nth(2).map_or(arg.len(), |(i, _)| i);
        return &arg[..end];
    }
    if let Some((name, _)) = arg.split_once('=') {
        return name;
    }
    arg
}

/// Merge `user` arguments over `defaults`.
///
/// Keys keep the position of their first insertion; the last value for a key
/// wins. A user `--no-X` deletes key `X` and is not emitted.
pub fn merge_args<D, U>(defaults: &[D], user: &[U]) -> Vec<String>
where
    D: AsRef<str>,
    U: AsRef<str>,
{
    fn insert(merged: &mut Vec<(String, String)>, arg: &str) {
        let key = arg_key(arg);
        match merged.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = arg.to_string(),
            None => merged.push((key.to_string(), arg.to_string())),
        }
    }

    let mut merged: Vec<(String, String)> = Vec::new();

    for arg in defaults {
        insert(&mut merged, arg.as_ref());
    }

    for arg in user {
        let arg = arg.as_ref();
        if let Some(negated) = arg.strip_prefix("--no-") {
            merged.retain(|(k, _)| k != negated);
            continue;
        }
        insert(&mut merged, arg);
    }

    merged.into_iter().map(|(_, v)| v).collect()
}

/// Merge arguments for a packaging tool whose defaults guarantee reproducible
/// output. Overriding a default is allowed but logged as a risk.
pub fn merge_reproducible_args<D, U>(tool: &str, defaults: &[D], user: &[U]) -> Vec<String>
where
    D: AsRef<str>,
    U: AsRef<str>,
{
    let merged = merge_args(defaults, user);
    let unchanged = merged.len() == defaults.len()
        && merged.iter().zip(defaults).all(|(m, d)| m == d.as_ref());
    if !unchanged {
        tracing::warn!(
            "Custom {} args detected, this may affect archive reproducibility: {}",
            tool,
            merged.join(" ")
        );
    }
    merged
}
