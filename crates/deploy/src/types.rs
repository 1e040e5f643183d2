use std::path::{Path, PathBuf};

use crate::config::ClientConfig;

/// What to deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployPath {
    /// Every file under a directory; names are relative to it.
    Directory(PathBuf),
    /// A single file, deployed under its base name.
    File(PathBuf),
    /// An explicit list of files, each deployed under its base name.
    Files(Vec<PathBuf>),
}

impl DeployPath {
    /// Classifies `path` by looking at the filesystem.
    ///
    /// Anything that is not a directory (including a path that does not
    /// exist yet) is treated as a single file; the read error then surfaces
    /// from the run itself.
    pub fn detect(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            DeployPath::Directory(path)
        } else {
            DeployPath::File(path)
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, DeployPath::Directory(_))
    }

    /// Directory names are made relative to, if any.
    pub fn root(&self) -> Option<&Path> {
        match self {
            DeployPath::Directory(root) => Some(root),
            _ => None,
        }
    }

    pub(crate) fn is_missing(&self) -> bool {
        match self {
            DeployPath::Directory(p) | DeployPath::File(p) => p.as_os_str().is_empty(),
            DeployPath::Files(paths) => paths.iter().any(|p| p.as_os_str().is_empty()),
        }
    }
}

impl From<PathBuf> for DeployPath {
    fn from(path: PathBuf) -> Self {
        DeployPath::detect(path)
    }
}

impl From<&Path> for DeployPath {
    fn from(path: &Path) -> Self {
        DeployPath::detect(path)
    }
}

impl From<&str> for DeployPath {
    fn from(path: &str) -> Self {
        DeployPath::detect(path)
    }
}

impl From<Vec<PathBuf>> for DeployPath {
    fn from(paths: Vec<PathBuf>) -> Self {
        DeployPath::Files(paths)
    }
}

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct DeploymentOptions {
    /// Bearer token. Required.
    pub token: Option<String>,
    /// Scopes every request to a team.
    pub team_id: Option<String>,
    /// Project name used when the metadata does not set one.
    pub default_name: Option<String>,
    /// Extra top-level fields for the create-deployment body.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub config: ClientConfig,
}

impl DeploymentOptions {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn team_id(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = Some(name.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn detect_classifies_by_filesystem() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("index.html");
        std::fs::write(&file, b"hi").unwrap();

        assert!(DeployPath::detect(dir.path()).is_directory());
        assert_eq!(DeployPath::detect(&file), DeployPath::File(file.clone()));
        assert_eq!(DeployPath::detect(dir.path()).root(), Some(dir.path()));
        assert_eq!(DeployPath::File(file.clone()).root(), None);
        assert!(DeployPath::from(file.as_path()).root().is_none());
        assert!(DeployPath::from(dir.path().to_path_buf()).is_directory());
    }

    #[test]
    fn missing_paths() {
        assert!(DeployPath::File(PathBuf::new()).is_missing());
        assert!(DeployPath::Directory(PathBuf::new()).is_missing());
        assert!(!DeployPath::Files(vec![]).is_missing());
        assert!(DeployPath::from(vec![PathBuf::from("a"), PathBuf::new()]).is_missing());
        assert!(!DeployPath::File("a.txt".into()).is_missing());
    }

    #[test]
    fn options_builder() {
        let options = DeploymentOptions::new("tok")
            .team_id("team_1")
            .default_name("site")
            .metadata("target", "production".into());
        assert_eq!(options.token.as_deref(), Some("tok"));
        assert_eq!(options.team_id.as_deref(), Some("team_1"));
        assert_eq!(options.default_name.as_deref(), Some("site"));
        assert_eq!(options.metadata["target"], "production");
    }
}
