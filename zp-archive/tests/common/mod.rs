//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use git2::{Oid, Repository, Signature};
use std::fs;
use std::path::Path;

/// Create a repository in `dir` holding `files`, commit them and tag the
/// commit. Returns the id of the committed tree.
pub fn tagged_repo(dir: &Path, files: &[(&str, &str)], tag: &str) -> Oid {
    let repo = Repository::init(dir).expect("Failed to init repository");

    let mut index = repo.index().unwrap();
    for (name, content) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        index.add_path(Path::new(name)).unwrap();
    }
    index.write().unwrap();

    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    // Fixed time so every fixture commit is identical
    let sig = Signature::new("Test User", "test@example.com", &git2::Time::new(1_700_000_000, 0)).unwrap();
    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
        .unwrap();
    let commit = repo.find_object(oid, None).unwrap();
    repo.tag_lightweight(tag, &commit, false).unwrap();

    tree_id
}

/// The two-file `demo` project used across tests.
pub fn demo_repo(dir: &Path) -> Oid {
    tagged_repo(dir, &[("a.txt", "hello"), ("b.txt", "world")], "v1.0.0")
}
