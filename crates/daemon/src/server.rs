//! TCP session server.
//!
//! Each accepted connection becomes a session. The first envelope must be a
//! `Hello` naming the session kind:
//! - `Files`: requests are answered by a [`MessageRouter`]
//! - `Interactive`: a [`SelectionSession`] is started, `Input` messages are fed
//!   into it and every rendered view is sent back as a `View`

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use protocol::messages::{Hello, View};
use protocol::{ErrorCode, ErrorMessage, InputEvent, Message, ProtocolError, SessionKind};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::files::{FileServiceError, RemoteFileService};
use crate::router::MessageRouter;
use crate::selection::{
    CandidateFileList, DispatchReport, SelectionSession, SendDispatcher, TransferSink,
};
use crate::session::{SessionGuard, SessionRegistry};
use crate::transport::FrameStream;

/// Capacity of the view queue between a selection session and its writer.
const VIEW_QUEUE_CAPACITY: usize = 16;

/// Errors raised while serving sessions.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("expected Hello as first message, got {0}")]
    Handshake(String),

    #[error("failed to start selection session: {0}")]
    Selection(#[source] FileServiceError),

    #[error("session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Everything a session task needs, cloned per connection.
struct SessionContext<S> {
    service: Arc<RemoteFileService>,
    candidates: CandidateFileList,
    dispatcher: SendDispatcher<S>,
}

impl<S> Clone for SessionContext<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            candidates: self.candidates.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

/// Accepts TCP connections and runs one task per session.
pub struct SessionServer<S> {
    listener: TcpListener,
    context: SessionContext<S>,
    registry: Arc<SessionRegistry>,
    max_sessions: usize,
}

impl<S: TransferSink> SessionServer<S> {
    /// Bind the server to `addr`.
    pub async fn bind(
        addr: &str,
        service: Arc<RemoteFileService>,
        candidates: CandidateFileList,
        dispatcher: SendDispatcher<S>,
        max_sessions: usize,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            context: SessionContext {
                service,
                candidates,
                dispatcher,
            },
            registry: Arc::new(SessionRegistry::new()),
            max_sessions,
        })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The registry of live sessions.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        info!(
            addr = ?self.listener.local_addr().ok(),
            root = %self.context.service.root().display(),
            "Session server listening"
        );

        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
            };

            if self.registry.count() >= self.max_sessions {
                warn!(%peer, max = self.max_sessions, "Session limit reached, refusing connection");
                tokio::spawn(refuse(stream));
                continue;
            }

            let guard = self.registry.register(peer);
            let context = self.context.clone();
            let token = shutdown.child_token();
            tokio::spawn(async move {
                let id = guard.id();
                if let Err(e) = serve_connection(stream, guard, context, token).await {
                    warn!(session_id = %id, %peer, error = %e, "Session ended with error");
                }
            });
        }

        for session in self.registry.list() {
            debug!(
                session_id = %session.id,
                peer = %session.peer,
                kind = ?session.kind,
                "Session still open at shutdown"
            );
        }
        info!(
            files = self.registry.count_kind(SessionKind::Files),
            interactive = self.registry.count_kind(SessionKind::Interactive),
            "Session server stopped"
        );
        Ok(())
    }
}

async fn refuse(stream: TcpStream) {
    let mut frames = FrameStream::new(stream);
    let busy = ErrorMessage {
        code: ErrorCode::Unknown,
        message: "server busy".to_string(),
        context: None,
        recoverable: true,
    };
    if let Err(e) = frames.send(Message::Error(busy)).await {
        debug!(error = %e, "Failed to notify refused peer");
    }
}

async fn serve_connection<S: TransferSink>(
    stream: TcpStream,
    guard: SessionGuard,
    context: SessionContext<S>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let mut frames = FrameStream::new(stream);

    let first = tokio::select! {
        _ = shutdown.cancelled() => return Ok(()),
        envelope = frames.recv() => envelope?,
    };
    let Some(envelope) = first else {
        return Ok(());
    };

    let Hello { kind, client } = match envelope.payload {
        Message::Hello(hello) => hello,
        other => {
            let err = ServerError::Handshake(message_name(&other).to_string());
            let reply = ErrorMessage {
                code: ErrorCode::InvalidRequest,
                message: err.to_string(),
                context: None,
                recoverable: false,
            };
            frames.reply(envelope.sequence, Message::Error(reply)).await?;
            return Err(err);
        }
    };

    info!(session_id = %guard.id(), ?kind, client = ?client, "Session started");
    guard.identify(kind, client);

    match kind {
        SessionKind::Files => serve_files(frames, context.service, shutdown).await,
        SessionKind::Interactive => {
            serve_interactive(frames, envelope.sequence, context, shutdown).await
        }
    }
}

async fn serve_files(
    mut frames: FrameStream<TcpStream>,
    service: Arc<RemoteFileService>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let mut router = MessageRouter::new(service);

    loop {
        let envelope = tokio::select! {
            _ = shutdown.cancelled() => break,
            envelope = frames.recv() => match envelope? {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let sequence = envelope.sequence;
        match router.route(envelope.payload).await {
            Ok(Some(response)) => frames.reply(sequence, response).await?,
            Ok(None) => {}
            Err(e) => {
                debug!(error = %e, "Request failed");
                frames
                    .reply(sequence, Message::Error(e.to_error_message(None)))
                    .await?;
            }
        }
    }

    debug!(
        cursors = router.open_cursors(),
        handles = router.open_handles(),
        "File session closed"
    );
    Ok(())
}

async fn serve_interactive<S: TransferSink>(
    mut frames: FrameStream<TcpStream>,
    hello_sequence: u64,
    context: SessionContext<S>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let opened = SelectionSession::open(
        &context.candidates,
        context.service.root(),
        context.dispatcher,
    );
    let (session, input_tx) = match opened {
        Ok(pair) => pair,
        Err(e) => {
            let err = FileServiceError::from_io("/", e);
            let reply = err.to_error_message(Some("interactive session"));
            frames.reply(hello_sequence, Message::Error(reply)).await?;
            return Err(ServerError::Selection(err));
        }
    };

    let (mut reader, mut writer) = frames.into_split();
    let (views_tx, mut views_rx) = mpsc::channel::<String>(VIEW_QUEUE_CAPACITY);

    let session_task = tokio::spawn(session.run(views_tx));
    let writer_task = tokio::spawn(async move {
        while let Some(text) = views_rx.recv().await {
            if let Err(e) = writer.send(Message::View(View { text })).await {
                debug!(error = %e, "Failed to send view");
                break;
            }
        }
        if let Err(e) = writer.shutdown().await {
            debug!(error = %e, "Failed to shut down writer");
        }
    });

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = input_tx.send(InputEvent::Quit.into()).await;
                break;
            }
            _ = input_tx.closed() => break,
            envelope = reader.recv() => match envelope {
                Ok(Some(envelope)) => match envelope.payload {
                    Message::Input(input) => {
                        if input_tx.send(input.event.into()).await.is_err() {
                            break;
                        }
                    }
                    other => debug!(message = message_name(&other), "Ignoring message in interactive session"),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Interactive session read failed");
                    break;
                }
            },
        }
    }

    drop(input_tx);
    let state = session_task.await?;
    writer_task.await?;
    let report = state.report();
    info!(
        phase = ?state.phase(),
        selected = state.selected().len(),
        attempted = ?report.map(DispatchReport::attempted),
        all_sent = ?report.map(DispatchReport::all_sent),
        "Interactive session closed"
    );
    Ok(())
}

/// Short name of a message for logs and errors.
fn message_name(message: &Message) -> &'static str {
    match message {
        Message::Hello(_) => "Hello",
        Message::FileRequest(_) => "FileRequest",
        Message::CursorOpened(_) => "CursorOpened",
        Message::ListAt(_) => "ListAt",
        Message::ListPage(_) => "ListPage",
        Message::HandleOpened(_) => "HandleOpened",
        Message::ReadAt(_) => "ReadAt",
        Message::FileData(_) => "FileData",
        Message::WriteAt(_) => "WriteAt",
        Message::Written(_) => "Written",
        Message::Close(_) => "Close",
        Message::Closed(_) => "Closed",
        Message::Input(_) => "Input",
        Message::View(_) => "View",
        Message::Ping(_) => "Ping",
        Message::Pong(_) => "Pong",
        Message::Error(_) => "Error",
    }
}
