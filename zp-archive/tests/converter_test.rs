//! Format conversion and tree hashing over real snapshots.

mod common;

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use zp_archive::args::{GZIP_DEFAULT_ARGS, TAR_DEFAULT_ARGS};
use zp_archive::converter::{ArchiveExtractor, Extractor, FormatConverter};
use zp_archive::entry::ArchiveFormat;
use zp_archive::error::{ArchiveError, Result};
use zp_archive::hasher::{HashAlgorithm, ObjectFormat};
use zp_archive::snapshot::ArchiveBuilder;
use zp_archive::tree;

/// Extractor that counts how often it runs.
#[derive(Default)]
struct CountingExtractor {
    calls: Cell<usize>,
}

impl Extractor for CountingExtractor {
    fn extract(&self, archive: &Path, scratch_dir: &Path) -> Result<PathBuf> {
        self.calls.set(self.calls.get() + 1);
        ArchiveExtractor.extract(archive, scratch_dir)
    }
}

/// Extractor that remembers the scratch directory it was handed.
#[derive(Default)]
struct ScratchWatcher {
    scratch: RefCell<Option<PathBuf>>,
}

impl Extractor for ScratchWatcher {
    fn extract(&self, archive: &Path, scratch_dir: &Path) -> Result<PathBuf> {
        *self.scratch.borrow_mut() = Some(scratch_dir.to_path_buf());
        ArchiveExtractor.extract(archive, scratch_dir)
    }
}

fn tar_args() -> Vec<String> {
    TAR_DEFAULT_ARGS.iter().map(|s| s.to_string()).collect()
}

fn gzip_args() -> Vec<String> {
    GZIP_DEFAULT_ARGS.iter().map(|s| s.to_string()).collect()
}

/// Snapshot of the demo project as `out/demo-v1.0.0.zip`.
fn demo_snapshot(out: &Path) -> (TempDir, PathBuf) {
    let repo = TempDir::new().unwrap();
    common::demo_repo(repo.path());
    let snapshot = ArchiveBuilder::new()
        .build_zip(repo.path(), "v1.0.0", "demo", out)
        .unwrap();
    (repo, snapshot.file_path)
}

#[test]
fn test_single_extraction_for_all_tree_hashes_and_tar() {
    let out = TempDir::new().unwrap();
    let (_repo, zip_path) = demo_snapshot(out.path());

    let converter = FormatConverter::with_extractor(CountingExtractor::default());
    let processed = converter
        .process_project_archive(
            &zip_path,
            "demo-v1.0.0",
            &[HashAlgorithm::Tree, HashAlgorithm::Tree256],
            ArchiveFormat::TarGz,
            &tar_args(),
            &gzip_args(),
        )
        .unwrap();

    assert_eq!(converter.extractor().calls.get(), 1);
    assert_eq!(processed.tree_hashes.len(), 2);
    assert_eq!(processed.format, ArchiveFormat::TarGz);
    assert_eq!(
        processed.path,
        out.path().canonicalize().unwrap().join("demo-v1.0.0.tar.gz")
    );
    assert!(processed.path.exists());
    assert!(!zip_path.exists());
}

#[test]
fn test_nothing_requested_is_a_no_op() {
    let out = TempDir::new().unwrap();
    let (_repo, zip_path) = demo_snapshot(out.path());
    let before = fs::read(&zip_path).unwrap();

    let converter = FormatConverter::with_extractor(CountingExtractor::default());
    let processed = converter
        .process_project_archive(&zip_path, "demo-v1.0.0", &[], ArchiveFormat::Zip, &[], &[])
        .unwrap();

    assert_eq!(converter.extractor().calls.get(), 0);
    assert_eq!(processed.path, zip_path);
    assert!(processed.tree_hashes.is_empty());
    assert_eq!(fs::read(&zip_path).unwrap(), before);
}

#[test]
fn test_tree_hash_matches_committed_tree() {
    let out = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    let tree_id = common::tagged_repo(
        repo.path(),
        &[
            ("a.txt", "hello"),
            ("docs/guide.md", "# Guide\n"),
            ("src/lib.rs", "pub fn f() {}\n"),
        ],
        "v2.0.0",
    );
    let snapshot = ArchiveBuilder::new()
        .build_zip(repo.path(), "v2.0.0", "demo", out.path())
        .unwrap();

    let processed = FormatConverter::new()
        .process_project_archive(
            &snapshot.file_path,
            &snapshot.archive_name,
            &[HashAlgorithm::Tree],
            ArchiveFormat::Zip,
            &[],
            &[],
        )
        .unwrap();

    assert_eq!(processed.tree_hashes[&HashAlgorithm::Tree], tree_id.to_string());
}

#[test]
fn test_tree_hash_is_format_invariant() {
    let mut tree256 = Vec::new();

    for format in [ArchiveFormat::Zip, ArchiveFormat::Tar, ArchiveFormat::TarGz] {
        let out = TempDir::new().unwrap();
        let (_repo, zip_path) = demo_snapshot(out.path());
        let processed = FormatConverter::new()
            .process_project_archive(
                &zip_path,
                "demo-v1.0.0",
                &[HashAlgorithm::Tree256],
                format,
                &tar_args(),
                &gzip_args(),
            )
            .unwrap();
        assert_eq!(processed.format, format);

        // re-extract the converted file and hash it again
        let scratch = TempDir::new().unwrap();
        let content = ArchiveExtractor.extract(&processed.path, scratch.path()).unwrap();
        assert_eq!(content.file_name().unwrap(), "demo-v1.0.0");
        let rehashed = tree::hash_tree(&content, ObjectFormat::Sha256).unwrap();

        assert_eq!(rehashed, processed.tree_hashes[&HashAlgorithm::Tree256]);
        tree256.push(rehashed);
    }

    assert!(tree256.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(
        tree256[0],
        "ce6dd7bad75e1d7870c9516bd8942c448b8b37cef9aa5e33ba66a8c2f3512734"
    );
}

#[test]
fn test_tar_gz_is_byte_reproducible() {
    let mut outputs = Vec::new();

    for _ in 0..2 {
        let out = TempDir::new().unwrap();
        let (_repo, zip_path) = demo_snapshot(out.path());
        let processed = FormatConverter::new()
            .process_project_archive(
                &zip_path,
                "demo-v1.0.0",
                &[],
                ArchiveFormat::TarGz,
                &tar_args(),
                &gzip_args(),
            )
            .unwrap();
        outputs.push(fs::read(&processed.path).unwrap());
    }

    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_failed_tar_keeps_zip_and_removes_scratch() {
    let out = TempDir::new().unwrap();
    let (_repo, zip_path) = demo_snapshot(out.path());
    let mut bad_args = tar_args();
    bad_args.push("--bogus-flag".to_string());

    let converter = FormatConverter::with_extractor(ScratchWatcher::default());
    let result = converter.process_project_archive(
        &zip_path,
        "demo-v1.0.0",
        &[HashAlgorithm::Tree256],
        ArchiveFormat::TarGz,
        &bad_args,
        &gzip_args(),
    );

    assert!(matches!(result, Err(ArchiveError::CommandFailed { .. })));
    assert!(zip_path.exists());
    assert!(!out.path().join("demo-v1.0.0.tar.gz").exists());

    let scratch = converter.extractor().scratch.borrow().clone().unwrap();
    assert!(!scratch.exists());
}

#[test]
fn test_existing_tar_gz_is_replaced() {
    let out = TempDir::new().unwrap();
    let (_repo, zip_path) = demo_snapshot(out.path());
    let dir = zip_path.parent().unwrap();
    fs::write(dir.join("demo-v1.0.0.tar.gz"), b"stale").unwrap();
    fs::write(dir.join("demo-v1.0.0.tar"), b"stale").unwrap();

    let processed = FormatConverter::new()
        .process_project_archive(
            &zip_path,
            "demo-v1.0.0",
            &[HashAlgorithm::Tree256],
            ArchiveFormat::TarGz,
            &tar_args(),
            &gzip_args(),
        )
        .unwrap();

    assert_ne!(fs::read(&processed.path).unwrap(), b"stale");
    assert!(!dir.join("demo-v1.0.0.tar").exists());

    let scratch = TempDir::new().unwrap();
    let content = ArchiveExtractor.extract(&processed.path, scratch.path()).unwrap();
    assert_eq!(
        tree::hash_tree(&content, ObjectFormat::Sha256).unwrap(),
        processed.tree_hashes[&HashAlgorithm::Tree256]
    );
}
