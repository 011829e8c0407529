//! Per-session event loop.

use std::io;
use std::path::Path;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::candidates::CandidateFileList;
use super::dispatcher::{SendDispatcher, TransferSink};
use super::event::SessionEvent;
use super::state::{Effect, SelectionState};
use super::view::render;

/// Capacity of a session's event queue.
const EVENT_QUEUE_CAPACITY: usize = 64;

/// Whether the loop continues after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    Continue,
    Quit,
}

/// One interactive selection session.
///
/// Events arrive on an `mpsc` queue, one at a time. The session keeps only a
/// weak handle on its own queue, so the loop ends once every input sender and
/// every in-flight dispatcher is gone.
pub struct SelectionSession<S> {
    state: SelectionState,
    dispatcher: SendDispatcher<S>,
    events_rx: mpsc::Receiver<SessionEvent>,
    events_tx: mpsc::WeakSender<SessionEvent>,
    in_flight: Option<JoinHandle<()>>,
}

impl<S: TransferSink> SelectionSession<S> {
    /// Create a session over fixed choices.
    ///
    /// Returns the session and the sender used to feed it input.
    pub fn new(
        choices: Vec<String>,
        dispatcher: SendDispatcher<S>,
    ) -> (Self, mpsc::Sender<SessionEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let session = Self {
            state: SelectionState::new(choices),
            dispatcher,
            events_rx: rx,
            events_tx: tx.downgrade(),
            in_flight: None,
        };
        (session, tx)
    }

    /// Create a session whose choices are the candidates present in `root`.
    pub fn open(
        candidates: &CandidateFileList,
        root: &Path,
        dispatcher: SendDispatcher<S>,
    ) -> io::Result<(Self, mpsc::Sender<SessionEvent>)> {
        let choices = candidates.choices_in(root)?;
        debug!(
            candidates = candidates.len(),
            choices = choices.len(),
            "Opening selection session"
        );
        Ok(Self::new(choices, dispatcher))
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// The current view.
    pub fn view(&self) -> String {
        render(&self.state)
    }

    /// Apply one event and carry out its effect.
    pub fn handle(&mut self, event: SessionEvent) -> SessionStep {
        match self.state.apply(event) {
            Effect::None => SessionStep::Continue,
            Effect::Quit => SessionStep::Quit,
            Effect::Dispatch(snapshot) => {
                let events = self.events_tx.upgrade();
                if events.is_none() {
                    warn!("Session queue closed, send will not report back");
                }
                self.in_flight = Some(self.dispatcher.spawn(snapshot, events));
                SessionStep::Continue
            }
        }
    }

    /// Run until quit or until no more events can arrive.
    ///
    /// The initial view and the view after every processed event are sent to
    /// `views`. A closed `views` channel also ends the session. Returns the
    /// final state.
    pub async fn run(mut self, views: mpsc::Sender<String>) -> SelectionState {
        if views.send(self.view()).await.is_err() {
            return self.state;
        }

        while let Some(event) = self.events_rx.recv().await {
            if self.handle(event) == SessionStep::Quit {
                info!("Selection session quit");
                break;
            }
            if views.send(self.view()).await.is_err() {
                debug!("View receiver closed, ending selection session");
                break;
            }
        }

        if let Some(handle) = self.in_flight.take() {
            if !handle.is_finished() {
                debug!("Leaving in-flight send to finish on its own");
            }
        }

        self.state
    }
}
