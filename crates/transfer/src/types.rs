use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;

/// A source file handed over by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Size reported by discovery; re-checked while hashing.
    pub size: u64,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

/// Content-addressed blob: one digest, one or more local paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashedFile {
    /// Hex SHA-256 of the file's bytes.
    pub digest: String,
    pub size: u64,
    pub names: BTreeSet<PathBuf>,
}

impl HashedFile {
    /// Path the blob's bytes are read from when uploading.
    pub fn source_path(&self) -> Option<&PathBuf> {
        self.names.iter().next()
    }
}

/// Digest-keyed map of every blob in a deployment.
///
/// Built once by the hasher and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FileManifest {
    files: BTreeMap<String, HashedFile>,
}

impl FileManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `path` under `digest`, creating the entry if needed.
    pub(crate) fn insert(&mut self, digest: String, size: u64, path: PathBuf) {
        self.files
            .entry(digest.clone())
            .or_insert_with(|| HashedFile {
                digest,
                size,
                names: BTreeSet::new(),
            })
            .names
            .insert(path);
    }

    /// Number of distinct digests.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, digest: &str) -> Option<&HashedFile> {
        self.files.get(digest)
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.files.contains_key(digest)
    }

    /// Iterates blobs in digest order.
    pub fn iter(&self) -> impl Iterator<Item = &HashedFile> {
        self.files.values()
    }

    pub fn digests(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Number of local paths across all blobs.
    pub fn total_files(&self) -> usize {
        self.files.values().map(|f| f.names.len()).sum()
    }

    /// Bytes that would be transferred if every blob were uploaded.
    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|f| f.size).sum()
    }
}
