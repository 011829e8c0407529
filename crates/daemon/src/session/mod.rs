//! Session bookkeeping.
//!
//! Live sessions are tracked in a [`SessionRegistry`] so the server can
//! enforce its session limit and report what is connected.

pub mod registry;

pub use registry::{SessionGuard, SessionId, SessionInfo, SessionRegistry};
