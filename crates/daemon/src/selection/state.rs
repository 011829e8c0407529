//! The selection state machine.
//!
//! [`SelectionState::apply`] is pure apart from logging: it mutates the state
//! and returns an [`Effect`] for the caller to carry out.

use std::collections::BTreeMap;

use protocol::InputEvent;
use tracing::{debug, info, warn};

use super::dispatcher::DispatchReport;
use super::event::SessionEvent;

/// Lifecycle phase of a selection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Browsing,
    Sending,
    Sent,
}

/// What the owner of a state must do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Nothing beyond re-rendering.
    None,
    /// Start a dispatcher over this snapshot of the selection.
    Dispatch(BTreeMap<usize, String>),
    /// End the session.
    Quit,
}

/// Cursor, selection and phase of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    choices: Vec<String>,
    cursor: usize,
    selected: BTreeMap<usize, String>,
    phase: Phase,
    report: Option<DispatchReport>,
}

impl SelectionState {
    /// Start browsing over a fixed list of choices.
    pub fn new(choices: Vec<String>) -> Self {
        Self {
            choices,
            cursor: 0,
            selected: BTreeMap::new(),
            phase: Phase::Browsing,
            report: None,
        }
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected(&self) -> &BTreeMap<usize, String> {
        &self.selected
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains_key(&index)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Report of the finished dispatch, once in [`Phase::Sent`].
    pub fn report(&self) -> Option<&DispatchReport> {
        self.report.as_ref()
    }

    /// Apply one event.
    pub fn apply(&mut self, event: SessionEvent) -> Effect {
        match (self.phase, event) {
            (_, SessionEvent::Input(InputEvent::Quit)) => Effect::Quit,

            (Phase::Browsing, SessionEvent::Input(input)) => self.browse(input),

            (Phase::Sending, SessionEvent::TransferComplete(report)) => {
                info!(
                    sent = report.sent.len(),
                    failed = report.failed.len(),
                    "Transfer complete"
                );
                self.report = Some(report);
                self.phase = Phase::Sent;
                Effect::None
            }

            (phase, SessionEvent::TransferComplete(_)) => {
                warn!(?phase, "Dropping transfer completion outside of sending");
                Effect::None
            }

            (phase, SessionEvent::Input(input)) => {
                debug!(?phase, ?input, "Ignoring input");
                Effect::None
            }
        }
    }

    fn browse(&mut self, input: InputEvent) -> Effect {
        match input {
            InputEvent::MoveUp => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            InputEvent::MoveDown => {
                if self.cursor + 1 < self.choices.len() {
                    self.cursor += 1;
                }
            }
            InputEvent::ToggleSelect => {
                if let Some(name) = self.choices.get(self.cursor) {
                    if self.selected.remove(&self.cursor).is_none() {
                        self.selected.insert(self.cursor, name.clone());
                    }
                }
            }
            InputEvent::SendTrigger => {
                if self.selected.is_empty() {
                    info!("Send requested with nothing selected");
                    return Effect::None;
                }
                debug!(files = self.selected.len(), "Starting send");
                self.phase = Phase::Sending;
                return Effect::Dispatch(self.selected.clone());
            }
            InputEvent::Quit => return Effect::Quit,
        }
        Effect::None
    }
}
