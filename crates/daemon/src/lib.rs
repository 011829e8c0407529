//! # filemover daemon library
//!
//! Serves one directory tree to remote peers and lets an interactive user
//! pick files from it to send.
//!
//! ## Overview
//!
//! - **Remote file service**: list, stat and open requests against a
//!   sandboxed root, with paged directory listings
//! - **Selection sessions**: a per-session state machine for browsing a
//!   curated file list and triggering a send
//! - **Send dispatcher**: an independent task that sends a snapshot of the
//!   selection and reports back to its session
//! - **Session server**: TCP transport carrying framed protocol envelopes
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Session Server                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │   Hello{Files}                     Hello{Interactive}        │
//! │        │                                  │                  │
//! │  ┌─────▼──────────┐              ┌────────▼───────────┐      │
//! │  │ Message Router │              │ Selection Session  │      │
//! │  └─────┬──────────┘              └────────┬───────────┘      │
//! │        │                                  │ spawn            │
//! │  ┌─────▼──────────────┐          ┌────────▼───────────┐      │
//! │  │ RemoteFileService  │          │  Send Dispatcher   │      │
//! │  └────────────────────┘          └────────────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::files::RemoteFileService;
//!
//! let service = RemoteFileService::new("/srv/share");
//! let cursor = service.list("/").unwrap();
//! let page = cursor.page(0, 10);
//! for entry in page.entries {
//!     println!("{}", entry.name);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Sandboxed file service
//! - [`selection`]: Selection state machine, session loop and dispatcher
//! - [`router`]: Per-session routing of file-service messages
//! - [`transport`]: Framed envelope streams
//! - [`server`]: TCP session server
//! - [`session`]: Live session registry
//! - [`ui`]: Local terminal driver

pub mod config;
pub mod files;
pub mod router;
pub mod selection;
pub mod server;
pub mod session;
pub mod transport;
pub mod ui;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export files types for convenience
pub use files::{DirectoryEntry, FileServiceError, ListCursor, RemoteFileService};

// Re-export selection types for convenience
pub use selection::{
    CandidateFileList, DispatchReport, Phase, RootSink, SelectionSession, SelectionState,
    SendDispatcher, SessionEvent, TransferError, TransferSink,
};

// Re-export router types for convenience
pub use router::{MessageRouter, RouterError, RouterResult};

// Re-export server types for convenience
pub use server::{ServerError, SessionServer};
pub use session::{SessionId, SessionRegistry};
pub use transport::FrameStream;
