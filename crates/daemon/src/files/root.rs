//! Join-and-resolve of client paths onto the served root.

use std::path::{Component, Path, PathBuf};

/// The single directory tree a file service exposes.
///
/// Client paths are normalised lexically as if they were rooted at `/`:
/// `.` components are dropped and `..` never climbs above the root. The
/// result is then joined onto the root. Symlinks are not inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRoot {
    root: PathBuf,
}

impl SandboxRoot {
    /// Create a sandbox over `root`. The path should be absolute.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a client-supplied path to a local path under the root.
    pub fn resolve(&self, client_path: &str) -> PathBuf {
        self.root.join(normalize(client_path))
    }

    /// Whether a client path names the root itself.
    pub fn is_root(&self, client_path: &str) -> bool {
        normalize(client_path).as_os_str().is_empty()
    }
}

/// Lexically clean a client path into a relative path with no `.` or `..`.
fn normalize(client_path: &str) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in Path::new(client_path).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::ParentDir => {
                clean.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    clean
}
