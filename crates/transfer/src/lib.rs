//! Content-addressed hashing and upload bookkeeping.
//!
//! The hasher turns a list of files into a [`FileManifest`] keyed by SHA-256
//! digest; the [`UploadTracker`] follows each digest through its upload.

mod hasher;
mod tracker;
mod types;

use std::path::PathBuf;

pub use hasher::{checksum_bytes, hash_files};
pub use tracker::{UploadState, UploadTracker};
pub use types::{FileEntry, FileManifest, HashedFile};

/// Errors produced while hashing local files.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} changed while hashing: expected {expected} bytes, read {actual}", path.display())]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("{} changed since it was hashed: expected {expected}, got {actual}", path.display())]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

/// Errors produced by upload bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("unknown digest: {0}")]
    UnknownDigest(String),

    #[error("invalid upload transition for {digest}: {from} -> {to}")]
    InvalidTransition {
        digest: String,
        from: &'static str,
        to: &'static str,
    },
}
