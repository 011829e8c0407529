//! Interactive file selection.
//!
//! One [`SelectionSession`] runs per interactive session. It owns a
//! [`SelectionState`], applies [`SessionEvent`]s one at a time, and hands the
//! selected files to a [`SendDispatcher`] running as its own task. The
//! dispatcher reports back through the session's event queue.

pub mod candidates;
pub mod dispatcher;
pub mod event;
pub mod session;
pub mod state;
pub mod view;

pub use candidates::CandidateFileList;
pub use dispatcher::{
    DispatchReport, FailedFile, RootSink, SendDispatcher, SentFile, TransferError, TransferSink,
};
pub use event::{input_for_key, SessionEvent};
pub use session::{SelectionSession, SessionStep};
pub use state::{Effect, Phase, SelectionState};
pub use view::render;
