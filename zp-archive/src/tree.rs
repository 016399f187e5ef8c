//! Git-compatible tree hashing of a directory on disk.
//!
//! The result equals what `git add --all && git write-tree` reports for the
//! same content, without writing any object database. Only what git records
//! takes part: file bytes, the owner executable bit, symlink targets and the
//! directory layout. Timestamps, ownership and empty directories do not.
//!
//! `.gitignore` files in the content are hashed like any other file and never
//! applied, so a tree holding force-added ignored files gets a different id
//! than `git add --all && git write-tree` would give it.

use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use crate::error::{ArchiveError, Result};
use crate::hasher::ObjectFormat;

const MODE_FILE: &str = "100644";
const MODE_EXECUTABLE: &str = "100755";
const MODE_SYMLINK: &str = "120000";
const MODE_TREE: &str = "40000";

enum ObjectHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl ObjectHasher {
    fn start(format: ObjectFormat, kind: &str, len: u64) -> Self {
        let mut hasher = match format {
            ObjectFormat::Sha1 => Self::Sha1(Sha1::new()),
            ObjectFormat::Sha256 => Self::Sha256(Sha256::new()),
        };
        hasher.update(format!("{kind} {len}\0").as_bytes());
        hasher
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    fn finish(self) -> Vec<u8> {
        match self {
            Self::Sha1(h) => h.finalize().to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
        }
    }
}

struct TreeEntry {
    name: Vec<u8>,
    mode: &'static str,
    id: Vec<u8>,
}

impl TreeEntry {
    fn is_tree(&self) -> bool {
        self.mode == MODE_TREE
    }

    /// Git sorts tree entries as if directory names ended with `/`.
    fn cmp_git(&self, other: &Self) -> Ordering {
        let suffix = |e: &Self| if e.is_tree() { &b"/"[..] } else { &b""[..] };
        self.name
            .iter()
            .chain(suffix(self))
            .cmp(other.name.iter().chain(suffix(other)))
    }
}

fn object_id(format: ObjectFormat, kind: &str, body: &[u8]) -> Vec<u8> {
    let mut hasher = ObjectHasher::start(format, kind, body.len() as u64);
    hasher.update(body);
    hasher.finish()
}

fn blob_id(format: ObjectFormat, path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let mut hasher = ObjectHasher::start(format, "blob", len);
    let mut buffer = [0; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finish())
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

/// Id of the tree for `dir`, or `None` when it holds nothing git would track.
fn write_tree(dir: &Path, format: ObjectFormat) -> Result<Option<Vec<u8>>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == ".git" {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type()?;

        let (mode, id) = if file_type.is_symlink() {
            let target = fs::read_link(&path)?;
            let id = object_id(format, "blob", target.as_os_str().as_encoded_bytes());
            (MODE_SYMLINK, id)
        } else if file_type.is_dir() {
            match write_tree(&path, format)? {
                Some(id) => (MODE_TREE, id),
                None => continue,
            }
        } else if file_type.is_file() {
            let mode = if is_executable(&entry.metadata()?) {
                MODE_EXECUTABLE
            } else {
                MODE_FILE
            };
            (mode, blob_id(format, &path)?)
        } else {
            continue;
        };

        entries.push(TreeEntry {
            name: name.as_encoded_bytes().to_vec(),
            mode,
            id,
        });
    }

    if entries.is_empty() {
        return Ok(None);
    }

    entries.sort_by(TreeEntry::cmp_git);

    let mut body = Vec::new();
    for entry in &entries {
        body.extend_from_slice(entry.mode.as_bytes());
        body.push(b' ');
        body.extend_from_slice(&entry.name);
        body.push(0);
        body.extend_from_slice(&entry.id);
    }

    Ok(Some(object_id(format, "tree", &body)))
}

/// Hex tree id of `content_dir` in the given object format.
///
/// Fails with [`ArchiveError::NestedRepository`] if `content_dir` already
/// contains a `.git` entry.
pub fn hash_tree(content_dir: &Path, format: ObjectFormat) -> Result<String> {
    if content_dir.join(".git").exists() {
        return Err(ArchiveError::NestedRepository {
            path: content_dir.to_path_buf(),
        });
    }

    let id = match write_tree(content_dir, format)? {
        Some(id) => id,
        None => object_id(format, "tree", &[]),
    };

    tracing::debug!(
        "Tree hash ({}) of {}: {}",
        format.name(),
        content_dir.display(),
        hex::encode(&id)
    );
    Ok(hex::encode(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn hello_world(dir: &Path) {
        fs::write(dir.join("a.txt"), "hello").unwrap();
        fs::write(dir.join("b.txt"), "world").unwrap();
    }

    #[test]
    fn test_matches_git_write_tree() {
        let dir = tempdir().unwrap();
        hello_world(dir.path());

        assert_eq!(
            hash_tree(dir.path(), ObjectFormat::Sha1).unwrap(),
            "e30b5202a91c72788d1ce94a3918edb647d2f48c"
        );
        assert_eq!(
            hash_tree(dir.path(), ObjectFormat::Sha256).unwrap(),
            "ce6dd7bad75e1d7870c9516bd8942c448b8b37cef9aa5e33ba66a8c2f3512734"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_nested_executable_and_empty_dirs() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        hello_world(dir.path());
        let deep = dir.path().join("sub").join("deep");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("x.sh"), "x").unwrap();
        fs::set_permissions(deep.join("x.sh"), fs::Permissions::from_mode(0o755)).unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();

        assert_eq!(
            hash_tree(dir.path(), ObjectFormat::Sha1).unwrap(),
            "aaaba807ae8fd2e5ec156e19eb2a961d036df9cb"
        );
        assert_eq!(
            hash_tree(dir.path(), ObjectFormat::Sha256).unwrap(),
            "08156f4845ca13072242e69276817955e13c4ebf6f2b7b7ed7c8c8ef6a25d08c"
        );
    }

    #[test]
    fn test_empty_directory_is_git_empty_tree() {
        let dir = tempdir().unwrap();
        assert_eq!(
            hash_tree(dir.path(), ObjectFormat::Sha1).unwrap(),
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_metadata_does_not_matter() {
        use std::os::unix::fs::PermissionsExt;

        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        hello_world(first.path());
        hello_world(second.path());
        fs::set_permissions(second.path().join("a.txt"), fs::Permissions::from_mode(0o600))
            .unwrap();

        assert_eq!(
            hash_tree(first.path(), ObjectFormat::Sha256).unwrap(),
            hash_tree(second.path(), ObjectFormat::Sha256).unwrap()
        );
    }

    #[test]
    fn test_directory_sorts_after_dotted_sibling() {
        let a = TreeEntry {
            name: b"a".to_vec(),
            mode: MODE_TREE,
            id: Vec::new(),
        };
        let a_txt = TreeEntry {
            name: b"a.txt".to_vec(),
            mode: MODE_FILE,
            id: Vec::new(),
        };
        assert_eq!(a_txt.cmp_git(&a), Ordering::Less);

        let a_file = TreeEntry {
            name: b"a".to_vec(),
            mode: MODE_FILE,
            id: Vec::new(),
        };
        assert_eq!(a_file.cmp_git(&a_txt), Ordering::Less);
    }

    #[test]
    fn test_nested_repository_rejected() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        assert!(matches!(
            hash_tree(dir.path(), ObjectFormat::Sha1),
            Err(ArchiveError::NestedRepository { .. })
        ));
    }
}
