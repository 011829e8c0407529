//! Directory entry metadata.

use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::time::SystemTime;

use protocol::FileEntry;

/// A directory entry with metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Size in bytes as reported by the filesystem.
    pub size: u64,
    /// Last modified timestamp.
    pub modified: SystemTime,
    /// Whether this is a directory.
    pub is_dir: bool,
    /// Unix mode (file type and permission bits).
    pub mode: u32,
}

impl DirectoryEntry {
    /// Build an entry from a name and its metadata.
    pub fn from_metadata(name: impl Into<String>, metadata: &Metadata) -> Self {
        Self {
            name: name.into(),
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            is_dir: metadata.is_dir(),
            mode: metadata.mode(),
        }
    }

    /// Permission bits only.
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    /// Convert to protocol FileEntry.
    pub fn to_protocol(&self) -> FileEntry {
        let modified = self
            .modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        FileEntry {
            name: self.name.clone(),
            size: self.size,
            mode: self.mode,
            modified,
            is_dir: self.is_dir,
        }
    }
}
