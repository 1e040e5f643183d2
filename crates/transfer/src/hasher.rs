//! Content hashing for the upload manifest.

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::HashError;
use crate::types::{FileEntry, FileManifest};

/// Lowercase hex SHA-256 of `data`; the blob's identity on the remote.
pub fn checksum_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hashes every entry and groups identical contents under one digest.
///
/// Each file is read exactly once. A path listed more than once is hashed
/// once. Any read failure or size mismatch aborts the whole run; no partial
/// manifest is returned.
pub async fn hash_files<I>(entries: I) -> Result<FileManifest, HashError>
where
    I: IntoIterator<Item = FileEntry>,
{
    let mut manifest = FileManifest::new();
    let mut seen = HashSet::new();

    for entry in entries {
        if !seen.insert(entry.path.clone()) {
            continue;
        }

        let data = tokio::fs::read(&entry.path)
            .await
            .map_err(|source| HashError::Io {
                path: entry.path.clone(),
                source,
            })?;

        let actual = data.len() as u64;
        if actual != entry.size {
            return Err(HashError::SizeMismatch {
                path: entry.path,
                expected: entry.size,
                actual,
            });
        }

        let digest = checksum_bytes(&data);
        trace!(path = %entry.path.display(), %digest, size = actual, "hashed file");
        manifest.insert(digest, actual, entry.path);
    }

    debug!(
        files = manifest.total_files(),
        digests = manifest.len(),
        bytes = manifest.total_bytes(),
        "hashes calculated"
    );

    Ok(manifest)
}
