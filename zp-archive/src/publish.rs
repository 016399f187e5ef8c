//! Deciding whether a release differs from what is already published, and
//! describing a publication for downstream consumers.
//!
//! The archival service itself sits behind [`Publisher`]; no wire protocol
//! lives in this crate.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::entry::{ArchiveEntry, Identifier};
use crate::error::{ArchiveError, Result};
use crate::hasher::HashAlgorithm;

/// Name of the publication info file.
pub const PUBLICATION_INFO_FILE: &str = "zenodo_publication_info.json";

/// A file of a published record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedFile {
    pub key: String,
    /// `md5:<hex>`
    pub checksum: String,
}

/// Where a published version lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHandle {
    pub doi: String,
    pub record_url: String,
}

/// The latest published version of a concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedRecord {
    pub version: String,
    #[serde(default)]
    pub files: Vec<PublishedFile>,
    #[serde(flatten)]
    pub handle: RecordHandle,
}

impl PublishedRecord {
    /// Load a record description from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn md5s(&self) -> BTreeSet<String> {
        self.files
            .iter()
            .filter(|f| !f.checksum.is_empty())
            .map(|f| f.checksum.trim_start_matches("md5:").to_string())
            .collect()
    }
}

/// Archival repository holding versioned records.
pub trait Publisher {
    fn latest_record(&self) -> Result<Option<PublishedRecord>>;

    fn publish(
        &self,
        tag: &str,
        entries: &[ArchiveEntry],
        identifiers: Option<&[Identifier]>,
    ) -> Result<RecordHandle>;
}

/// Outcome of comparing a release against the latest published record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishDecision {
    UpToDate { reason: String },
    Publish { new_files: usize, removed_files: usize },
}

impl PublishDecision {
    /// Compare by version name first, then by the set of md5 checksums.
    pub fn decide(tag: &str, entries: &[ArchiveEntry], previous: Option<&PublishedRecord>) -> Self {
        let new_md5s: BTreeSet<String> = entries
            .iter()
            .filter_map(|e| e.hash(HashAlgorithm::Md5))
            .map(str::to_string)
            .collect();

        let Some(previous) = previous else {
            return PublishDecision::Publish {
                new_files: new_md5s.len(),
                removed_files: 0,
            };
        };

        if previous.version == tag {
            return PublishDecision::UpToDate {
                reason: format!("Version '{tag}' is already published"),
            };
        }

        let previous_md5s = previous.md5s();
        if previous_md5s == new_md5s {
            return PublishDecision::UpToDate {
                reason: format!("Files are identical to published version '{}'", previous.version),
            };
        }

        PublishDecision::Publish {
            new_files: new_md5s.difference(&previous_md5s).count(),
            removed_files: previous_md5s.difference(&new_md5s).count(),
        }
    }

    pub fn is_up_to_date(&self) -> bool {
        matches!(self, PublishDecision::UpToDate { .. })
    }
}

/// What [`publish_if_needed`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub decision: PublishDecision,
    pub published: bool,
    /// The new record, or the previous one when nothing was published
    pub record: Option<RecordHandle>,
}

/// Publish `entries` under `tag` unless the latest record already matches.
/// `force` publishes even then.
pub fn publish_if_needed<P: Publisher + ?Sized>(
    publisher: &P,
    tag: &str,
    entries: &[ArchiveEntry],
    identifiers: Option<&[Identifier]>,
    force: bool,
) -> Result<PublishOutcome> {
    let previous = publisher.latest_record()?;
    let decision = PublishDecision::decide(tag, entries, previous.as_ref());

    match &decision {
        PublishDecision::UpToDate { reason } => {
            tracing::info!("{}", reason);
            if !force {
                return Ok(PublishOutcome {
                    decision,
                    published: false,
                    record: previous.map(|r| r.handle),
                });
            }
            tracing::warn!("Forcing publication of {}", tag);
        }
        PublishDecision::Publish {
            new_files,
            removed_files,
        } => {
            tracing::info!(
                "New version '{}': {} new/modified file(s), {} removed file(s)",
                tag,
                new_files,
                removed_files
            );
        }
    }

    let record = publisher.publish(tag, entries, identifiers)?;
    tracing::info!("Published {} as {}", tag, record.doi);
    Ok(PublishOutcome {
        decision,
        published: true,
        record: Some(record),
    })
}

/// [`Publisher`] that keeps the latest record in a local JSON file.
///
/// The upload itself happens elsewhere; `publish` records the new version
/// under `handle` so the next run compares against it.
#[derive(Debug, Clone)]
pub struct RecordFile {
    path: PathBuf,
    handle: Option<RecordHandle>,
}

impl RecordFile {
    pub fn new(path: impl Into<PathBuf>, handle: Option<RecordHandle>) -> Self {
        Self {
            path: path.into(),
            handle,
        }
    }
}

impl Publisher for RecordFile {
    fn latest_record(&self) -> Result<Option<PublishedRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        PublishedRecord::load(&self.path).map(Some)
    }

    fn publish(
        &self,
        tag: &str,
        entries: &[ArchiveEntry],
        _identifiers: Option<&[Identifier]>,
    ) -> Result<RecordHandle> {
        let handle = self.handle.clone().ok_or_else(|| {
            ArchiveError::Publication(format!(
                "version '{tag}' needs publishing; pass its DOI and record URL to record it"
            ))
        })?;

        let record = PublishedRecord {
            version: tag.to_string(),
            files: entries
                .iter()
                .filter(|e| !e.is_signature)
                .filter_map(|e| {
                    e.hash(HashAlgorithm::Md5).map(|md5| PublishedFile {
                        key: e.file_name(),
                        checksum: format!("md5:{md5}"),
                    })
                })
                .collect(),
            handle: handle.clone(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_string_pretty(&record)?;
        json.push('\n');
        fs::write(&self.path, json)?;
        Ok(handle)
    }
}

/// Formatted identifier values, as recorded in alternate-identifier metadata.
pub fn alternate_identifiers(identifiers: &[Identifier]) -> Vec<String> {
    identifiers.iter().map(|i| i.formatted_value.clone()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicationFile {
    pub key: String,
    #[serde(flatten)]
    pub hashes: BTreeMap<HashAlgorithm, String>,
}

/// Contents of the publication info file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicationInfo {
    pub doi: String,
    pub record_url: String,
    pub files: Vec<PublicationFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifiers: Option<Vec<Identifier>>,
}

impl PublicationInfo {
    /// Describe a publication. Signature entries are left out and an empty
    /// identifier list is omitted.
    pub fn build(
        doi: &str,
        record_url: &str,
        entries: &[ArchiveEntry],
        identifiers: Option<&[Identifier]>,
    ) -> Result<Self> {
        if doi.trim().is_empty() || record_url.trim().is_empty() {
            return Err(ArchiveError::Publication(
                "a DOI and a record URL are required for the publication info".to_string(),
            ));
        }

        let files = entries
            .iter()
            .filter(|e| !e.is_signature)
            .map(|e| PublicationFile {
                key: e
                    .file_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| e.file_name()),
                hashes: e.hashes.iter().map(|(a, h)| (*a, h.value.clone())).collect(),
            })
            .collect();

        Ok(Self {
            doi: format!("https://doi.org/{}", doi.trim_start_matches("https://doi.org/")),
            record_url: record_url.to_string(),
            files,
            identifiers: identifiers.filter(|ids| !ids.is_empty()).map(<[_]>::to_vec),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Write [`PUBLICATION_INFO_FILE`] into `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(PUBLICATION_INFO_FILE);
        fs::write(&path, self.to_json()?)?;
        tracing::info!("Wrote publication info: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryType;
    use crate::hasher::FileHash;
    use std::cell::Cell;
    use tempfile::tempdir;

    fn entry(name: &str, ext: &str, entry_type: EntryType, md5: &str) -> ArchiveEntry {
        let mut e = ArchiveEntry::new(format!("/out/{name}.{ext}"), name, ext, entry_type, true);
        e.hashes.insert(HashAlgorithm::Md5, FileHash::new(HashAlgorithm::Md5, md5));
        e
    }

    fn record(version: &str, md5s: &[&str]) -> PublishedRecord {
        PublishedRecord {
            version: version.to_string(),
            files: md5s
                .iter()
                .map(|m| PublishedFile {
                    key: format!("{m}.bin"),
                    checksum: format!("md5:{m}"),
                })
                .collect(),
            handle: RecordHandle {
                doi: "10.5281/zenodo.1".to_string(),
                record_url: "https://zenodo.org/records/1".to_string(),
            },
        }
    }

    #[test]
    fn test_same_version_is_up_to_date() {
        let entries = vec![entry("demo-v1", "pdf", EntryType::MainFile, "aa")];
        let decision = PublishDecision::decide("v1", &entries, Some(&record("v1", &["zz"])));
        assert!(decision.is_up_to_date());
    }

    #[test]
    fn test_identical_files_are_up_to_date() {
        let entries = vec![
            entry("demo-v2", "pdf", EntryType::MainFile, "aa"),
            entry("demo-v2", "zip", EntryType::Project, "bb"),
        ];
        let decision = PublishDecision::decide("v2", &entries, Some(&record("v1", &["bb", "aa"])));
        assert!(decision.is_up_to_date());
    }

    #[test]
    fn test_counts_new_and_removed_files() {
        let entries = vec![
            entry("demo-v2", "pdf", EntryType::MainFile, "aa"),
            entry("demo-v2", "zip", EntryType::Project, "cc"),
        ];
        let decision = PublishDecision::decide("v2", &entries, Some(&record("v1", &["aa", "bb", "dd"])));
        assert_eq!(
            decision,
            PublishDecision::Publish {
                new_files: 1,
                removed_files: 2
            }
        );
    }

    #[test]
    fn test_first_publication() {
        let entries = vec![entry("demo-v1", "pdf", EntryType::MainFile, "aa")];
        assert_eq!(
            PublishDecision::decide("v1", &entries, None),
            PublishDecision::Publish {
                new_files: 1,
                removed_files: 0
            }
        );
    }

    struct FakePublisher {
        latest: Option<PublishedRecord>,
        calls: Cell<usize>,
    }

    impl Publisher for FakePublisher {
        fn latest_record(&self) -> Result<Option<PublishedRecord>> {
            Ok(self.latest.clone())
        }

        fn publish(&self, tag: &str, _: &[ArchiveEntry], _: Option<&[Identifier]>) -> Result<RecordHandle> {
            self.calls.set(self.calls.get() + 1);
            Ok(RecordHandle {
                doi: format!("10.5281/zenodo.{tag}"),
                record_url: "https://zenodo.org/records/2".to_string(),
            })
        }
    }

    #[test]
    fn test_publish_if_needed_skips_and_forces() {
        let entries = vec![entry("demo-v1", "pdf", EntryType::MainFile, "aa")];
        let publisher = FakePublisher {
            latest: Some(record("v1", &["aa"])),
            calls: Cell::new(0),
        };

        let skipped = publish_if_needed(&publisher, "v1", &entries, None, false).unwrap();
        assert!(!skipped.published);
        assert_eq!(skipped.record.unwrap().doi, "10.5281/zenodo.1");
        assert_eq!(publisher.calls.get(), 0);

        let forced = publish_if_needed(&publisher, "v1", &entries, None, true).unwrap();
        assert!(forced.published);
        assert_eq!(publisher.calls.get(), 1);
    }

    #[test]
    fn test_record_file_tracks_latest_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records/latest.json");
        let handle = RecordHandle {
            doi: "10.5281/zenodo.2".to_string(),
            record_url: "https://zenodo.org/records/2".to_string(),
        };
        let publisher = RecordFile::new(&path, Some(handle.clone()));
        let entries = vec![
            entry("demo-v1", "pdf", EntryType::MainFile, "aa"),
            entry("demo-v1.pdf", "asc", EntryType::Signature, "ss"),
        ];

        let first = publish_if_needed(&publisher, "v1", &entries, None, false).unwrap();
        assert!(first.published);
        assert_eq!(first.record, Some(handle));

        let stored = PublishedRecord::load(&path).unwrap();
        assert_eq!(stored.version, "v1");
        assert_eq!(
            stored.files,
            vec![PublishedFile {
                key: "demo-v1.pdf".to_string(),
                checksum: "md5:aa".to_string(),
            }]
        );

        // same files under a new tag
        let again = publish_if_needed(&publisher, "v2", &entries, None, false).unwrap();
        assert!(!again.published);
        assert!(again.decision.is_up_to_date());
    }

    #[test]
    fn test_record_file_without_handle_refuses_to_record() {
        let dir = tempdir().unwrap();
        let publisher = RecordFile::new(dir.path().join("latest.json"), None);
        let entries = vec![entry("demo-v1", "pdf", EntryType::MainFile, "aa")];

        assert!(publisher.latest_record().unwrap().is_none());
        assert!(matches!(
            publish_if_needed(&publisher, "v1", &entries, None, false),
            Err(ArchiveError::Publication(_))
        ));
    }

    #[test]
    fn test_publication_info_json() {
        let entries = vec![
            entry("demo-v1", "pdf", EntryType::MainFile, "aa"),
            entry("demo-v1.pdf", "asc", EntryType::Signature, "ss"),
        ];
        let identifiers = vec![Identifier {
            algorithm: HashAlgorithm::Sha256,
            value: "ff".to_string(),
            formatted_value: "sha256:ff".to_string(),
            files: vec!["ff".to_string()],
            description: "sorted by hash value".to_string(),
        }];

        let info = PublicationInfo::build(
            "10.5281/zenodo.1",
            "https://zenodo.org/records/1",
            &entries,
            Some(&identifiers),
        )
        .unwrap();
        let dir = tempdir().unwrap();
        let path = info.write_to(dir.path()).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("}\n"));
        let json: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(json["doi"], "https://doi.org/10.5281/zenodo.1");
        assert_eq!(json["files"].as_array().unwrap().len(), 1);
        assert_eq!(json["files"][0]["key"], "demo-v1.pdf");
        assert_eq!(json["files"][0]["md5"], "aa");
        assert_eq!(json["identifiers"][0]["type"], "sha256");
        assert_eq!(alternate_identifiers(&identifiers), vec!["sha256:ff"]);
    }

    #[test]
    fn test_publication_info_omits_empty_identifiers() {
        let entries = vec![entry("demo-v1", "pdf", EntryType::MainFile, "aa")];
        let info = PublicationInfo::build("10.1/x", "https://r", &entries, Some(&[])).unwrap();
        assert!(!info.to_json().unwrap().contains("identifiers"));
        assert!(PublicationInfo::build("", "https://r", &entries, None).is_err());
    }

    #[test]
    fn test_record_loads_from_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("record.json");
        fs::write(
            &path,
            r#"{"version":"v1","doi":"10.1/x","record_url":"https://r","files":[{"key":"a.pdf","checksum":"md5:aa"}]}"#,
        )
        .unwrap();

        let record = PublishedRecord::load(&path).unwrap();
        assert_eq!(record.version, "v1");
        assert_eq!(record.handle.doi, "10.1/x");
        assert_eq!(record.md5s().into_iter().collect::<Vec<_>>(), vec!["aa"]);
    }
}
