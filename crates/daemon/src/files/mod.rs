//! Remote file service for sandboxed directory access.
//!
//! This module answers the three file-service requests a remote peer can
//! make against the served root:
//! - `List`: enumerate a directory into a pageable [`ListCursor`]
//! - `Stat`: describe a single path as a one-entry [`ListCursor`]
//! - `Read`: open a file according to the client's [`OpenIntent`]
//!
//! Every request is independent. The service holds no per-request state, so
//! one instance is shared by all sessions.
//!
//! [`OpenIntent`]: protocol::OpenIntent

pub mod cursor;
pub mod entry;
pub mod open;
pub mod root;
pub mod service;

pub use cursor::{ListCursor, ListPage};
pub use entry::DirectoryEntry;
pub use open::{AccessMode, OpenPlan};
pub use root::SandboxRoot;
pub use service::{FileResponse, FileServiceError, RemoteFileService};
