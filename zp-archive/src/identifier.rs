//! Per-file hashes and the composite identifiers folded from them.

use crate::entry::{ArchiveEntry, EntryType, Identifier, IDENTIFIER_DESCRIPTION};
use crate::error::{ArchiveError, Result};
use crate::hasher::{self, HashAlgorithm};

/// Hashes every entry carries, whatever else is requested.
pub const BASELINE_ALGORITHMS: [HashAlgorithm; 2] = [HashAlgorithm::Md5, HashAlgorithm::Sha256];

/// Baseline algorithms followed by `extra`, first occurrence wins.
pub fn with_baseline(extra: &[HashAlgorithm]) -> Vec<HashAlgorithm> {
    let mut algorithms = Vec::with_capacity(BASELINE_ALGORITHMS.len() + extra.len());
    for algorithm in BASELINE_ALGORITHMS.iter().chain(extra) {
        if !algorithms.contains(algorithm) {
            algorithms.push(*algorithm);
        }
    }
    algorithms
}

/// Fill `hashes` on every entry with the baseline plus `extra` algorithms.
///
/// A tree algorithm on a project entry takes the value pre-computed from the
/// extracted snapshot. On any other entry it digests the file with the
/// matching width and keeps the tree label.
pub fn compute_file_hashes(entries: &mut [ArchiveEntry], extra: &[HashAlgorithm]) -> Result<()> {
    let algorithms = with_baseline(extra);

    for entry in entries.iter_mut() {
        for &algorithm in &algorithms {
            if entry.hashes.contains_key(&algorithm) {
                continue;
            }

            let hash = if algorithm.is_tree() && entry.entry_type == EntryType::Project {
                let value = entry.tree_hashes.remove(&algorithm).ok_or_else(|| {
                    ArchiveError::TreeHashNotPrecomputed {
                        algorithm: algorithm.to_string(),
                        filename: entry.file_name(),
                    }
                })?;
                hasher::FileHash::new(algorithm, value)
            } else {
                hasher::hash_file(&entry.file_path, algorithm)?
            };

            tracing::debug!("{} {}: {}", entry.file_name(), algorithm, hash.value);
            entry.hashes.insert(algorithm, hash);
        }
    }

    Ok(())
}

/// Fold the hashes of selected entries into one identifier per algorithm.
///
/// An entry is selected when its extension or type is in `selector`. Returns
/// `None` if nothing is selected. With a single selected entry the identifier
/// is that entry's own hash; otherwise it is the digest of the sorted values
/// concatenated, using the algorithm's digest width.
pub fn compute_identifiers<S: AsRef<str>>(
    entries: &[ArchiveEntry],
    selector: &[S],
    algorithms: &[HashAlgorithm],
) -> Result<Option<Vec<Identifier>>> {
    let selected: Vec<&ArchiveEntry> = entries
        .iter()
        .filter(|entry| entry.matches_selector(selector))
        .collect();

    if selected.is_empty() {
        return Ok(None);
    }

    let mut identifiers = Vec::with_capacity(algorithms.len());
    for &algorithm in algorithms {
        let mut files = selected
            .iter()
            .map(|entry| {
                entry
                    .hash(algorithm)
                    .map(str::to_string)
                    .ok_or_else(|| ArchiveError::MissingHash {
                        algorithm: algorithm.to_string(),
                        filename: entry.file_name(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        files.sort();

        let value = match files.as_slice() {
            [only] => only.clone(),
            _ => hasher::hash_bytes(algorithm.digest_algorithm(), files.concat().as_bytes()).value,
        };

        identifiers.push(Identifier {
            algorithm,
            formatted_value: format!("{algorithm}:{value}"),
            value,
            files,
            description: IDENTIFIER_DESCRIPTION.to_string(),
        });
    }

    Ok(Some(identifiers))
}
