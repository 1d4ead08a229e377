#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Small fixtures shared by the workspace's integration tests — currently
//! just a scratch directory for a Unix control socket, since both the
//! negotiator and the store end up binding one in their own test suites.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A path inside a temp directory, with the directory kept alive alongside
/// it so the path isn't cleaned up out from under a running test.
pub struct TempPath {
    _dir: TempDir,
    path: PathBuf,
}

impl TempPath {
    /// Borrows the path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A fresh, not-yet-bound path named `name` inside a fresh temp directory.
///
/// # Panics
///
/// Panics if a temp directory cannot be created.
#[must_use]
pub fn temp_path(name: &str) -> TempPath {
    let dir = tempfile::tempdir().expect("create temp dir for test fixture");
    let path = dir.path().join(name);
    TempPath { _dir: dir, path }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_lands_inside_a_live_directory() {
        let fixture = temp_path("control.sock");
        assert_eq!(fixture.path().file_name().unwrap(), "control.sock");
        assert!(fixture.path().parent().unwrap().is_dir());
    }
}
