//! Translation of a client [`OpenIntent`] into a local open.
//!
//! The access mode is chosen from the read/write bits. Append, create,
//! exclusive and truncate are passed through as raw open flags so they reach
//! `open(2)` exactly as requested, whatever the access mode.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::fcntl::OFlag;
use protocol::OpenIntent;

/// Permission bits for files created through the file service.
pub const CREATE_MODE: u32 = 0o600;

/// Local access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    /// Pick the access mode for an intent. An intent with neither bit set
    /// opens read-only.
    pub fn from_intent(intent: &OpenIntent) -> Self {
        match (intent.read, intent.write) {
            (true, true) => AccessMode::ReadWrite,
            (false, true) => AccessMode::WriteOnly,
            (true, false) | (false, false) => AccessMode::ReadOnly,
        }
    }

    pub fn readable(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

/// A fully translated open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenPlan {
    /// Access mode.
    pub access: AccessMode,
    /// Extra open flags (`O_APPEND`, `O_CREAT`, `O_EXCL`, `O_TRUNC`).
    pub flags: OFlag,
}

impl OpenPlan {
    pub fn from_intent(intent: &OpenIntent) -> Self {
        let mut flags = OFlag::empty();
        if intent.append {
            flags |= OFlag::O_APPEND;
        }
        if intent.create {
            flags |= OFlag::O_CREAT;
        }
        if intent.exclusive {
            flags |= OFlag::O_EXCL;
        }
        if intent.truncate {
            flags |= OFlag::O_TRUNC;
        }

        Self {
            access: AccessMode::from_intent(intent),
            flags,
        }
    }

    /// Build the `OpenOptions` for this plan.
    ///
    /// `OpenOptions::create`/`append`/`truncate` are not used:
    /// they reject some combinations (truncate without write) and `append`
    /// implies write access. The raw flags keep the request verbatim.
    pub fn options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options
            .read(self.access.readable())
            .write(self.access.writable())
            .custom_flags(self.flags.bits())
            .mode(CREATE_MODE);
        options
    }

    /// Open `path` according to this plan.
    pub fn open(&self, path: &Path) -> io::Result<File> {
        self.options().open(path)
    }
}
