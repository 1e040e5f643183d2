//! File discovery.
//!
//! Discovery is pluggable: callers that honour ignore files supply their
//! own [`FileDiscovery`]. [`WalkDiscovery`] lists every regular file under
//! the root and applies no filtering.

use std::path::Path;

use stagehand_transfer::FileEntry;

/// Produces the ordered list of files to deploy from a directory.
pub trait FileDiscovery: Send + Sync {
    fn discover(&self, root: &Path) -> std::io::Result<Vec<FileEntry>>;
}

/// Recursive directory walk, sorted by path.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkDiscovery;

impl FileDiscovery for WalkDiscovery {
    fn discover(&self, root: &Path) -> std::io::Result<Vec<FileEntry>> {
        let mut files = Vec::new();
        walk_dir(root, &mut files)?;
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

fn walk_dir(current: &Path, files: &mut Vec<FileEntry>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            walk_dir(&path, files)?;
        } else if metadata.is_file() {
            files.push(FileEntry::new(path, metadata.len()));
        }
    }

    Ok(())
}
