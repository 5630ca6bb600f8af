//! Per-request scratch directory.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

const PREFIX: &str = "pdflight_";

/// File locations inside a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    /// Upload as received
    pub input: PathBuf,
    /// Ghostscript output
    pub compressed: PathBuf,
    /// Second-stage (qpdf or ocrmypdf) output
    pub output: PathBuf,
}

impl WorkspacePaths {
    pub fn under(dir: &Path) -> Self {
        Self {
            input: dir.join("input.pdf"),
            compressed: dir.join("light.pdf"),
            output: dir.join("output.pdf"),
        }
    }
}

/// Temporary directory owned by exactly one request.
///
/// The directory and everything in it is removed when the workspace is
/// dropped, so every early return, error, or cancelled request cleans up.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: TempDir,
    paths: WorkspacePaths,
}

impl TempWorkspace {
    /// Create a fresh workspace under `parent`, or the system temp dir.
    pub fn create(parent: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        let paths = WorkspacePaths::under(dir.path());

        debug!(path = %dir.path().display(), "Created workspace");
        Ok(Self { dir, paths })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    pub async fn write_input(&self, data: &[u8]) -> io::Result<()> {
        tokio::fs::write(&self.paths.input, data).await
    }

    /// Remove the workspace now, logging instead of failing on errors.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "Removed workspace"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove workspace"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workspace_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();

        let workspace = TempWorkspace::create(Some(parent.path())).unwrap();
        let root = workspace.path().to_path_buf();
        assert!(root.starts_with(parent.path()));
        assert!(
            root.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(PREFIX)
        );

        workspace.write_input(b"%PDF-1.4").await.unwrap();
        assert!(workspace.paths().input.exists());

        drop(workspace);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_close_removes_directory() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = TempWorkspace::create(Some(parent.path())).unwrap();
        let root = workspace.path().to_path_buf();
        tokio::fs::write(&workspace.paths().output, b"x").await.unwrap();

        workspace.close();
        assert!(!root.exists());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_workspaces_are_distinct() {
        let parent = tempfile::tempdir().unwrap();
        let a = TempWorkspace::create(Some(parent.path())).unwrap();
        let b = TempWorkspace::create(Some(parent.path())).unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(a.paths().compressed, a.path().join("light.pdf"));
    }
}
