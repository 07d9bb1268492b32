//! Directory a run operates in
//!
//! Relative paths from configuration (chart references, value files, scripts,
//! the fetched `charts/` directory) are resolved against the workspace root, so a
//! dependency directory can be processed without changing the process working
//! directory.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::current()
    }
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The process working directory
    pub fn current() -> Self {
        Self::new(".")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path relative to the root
    ///
    /// Absolute paths, and every path when the root is `.`, come back unchanged.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() || self.root.as_os_str().is_empty() || self.root == Path::new(".") {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.resolve(path).exists()
    }

    /// Where fetched chart archives are written
    pub fn charts_dir(&self) -> PathBuf {
        self.resolve("charts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_in_current_dir() {
        let ws = Workspace::current();
        assert_eq!(ws.resolve("values/web.yaml"), PathBuf::from("values/web.yaml"));
        assert_eq!(ws.charts_dir(), PathBuf::from("charts"));
    }

    #[test]
    fn test_resolve_in_dependency_dir() {
        let ws = Workspace::new("deps/infra");
        assert_eq!(
            ws.resolve("values/web.yaml"),
            PathBuf::from("deps/infra/values/web.yaml")
        );
        assert_eq!(ws.resolve("/abs/chart"), PathBuf::from("/abs/chart"));
    }
}
