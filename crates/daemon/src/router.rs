//! Message router for file-service sessions.
//!
//! One `MessageRouter` serves one file session. It answers `FileRequest`s
//! through the shared [`RemoteFileService`] and keeps the resulting cursors
//! and open files under numeric ids until the peer closes them or the
//! session ends.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::sync::Arc;

use protocol::messages::{
    Close, Closed, CursorOpened, FileData, FileRequest, HandleOpened, ListAt, ListPage, Ping,
    Pong, ReadAt, WriteAt, Written,
};
use protocol::{ErrorCode, ErrorMessage, Message};
use tracing::{debug, warn};

use crate::files::{FileResponse, FileServiceError, ListCursor, RemoteFileService};

/// Largest positioned read served in one response.
pub const MAX_READ_CHUNK: usize = 256 * 1024;

/// Most directory entries served in one page. Keeps a page well inside
/// `MAX_FRAME_SIZE` even with maximum-length names.
pub const MAX_LIST_PAGE: usize = 1024;

/// Result type for router operations.
pub type RouterResult = Result<Option<Message>, RouterError>;

/// Errors that can occur during message routing.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The file service rejected the request.
    #[error(transparent)]
    File(#[from] FileServiceError),

    /// Unknown id or a message that makes no sense in a file session.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Positioned I/O on an open handle failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RouterError {
    /// Convert the error to a protocol ErrorMessage.
    pub fn to_error_message(&self, context: Option<String>) -> ErrorMessage {
        match self {
            RouterError::File(e) => e.to_error_message(context.as_deref()),
            other => {
                let (code, recoverable) = match other {
                    RouterError::InvalidRequest(_) => (ErrorCode::InvalidRequest, false),
                    RouterError::Io(_) => (ErrorCode::Io, true),
                    _ => (ErrorCode::Unknown, true),
                };
                ErrorMessage {
                    code,
                    message: other.to_string(),
                    context,
                    recoverable,
                }
            }
        }
    }
}

/// Per-session router for file-service messages.
pub struct MessageRouter {
    service: Arc<RemoteFileService>,
    cursors: HashMap<u32, ListCursor>,
    handles: HashMap<u32, Arc<File>>,
    next_id: u32,
}

impl MessageRouter {
    /// Create a router over a shared file service.
    pub fn new(service: Arc<RemoteFileService>) -> Self {
        Self {
            service,
            cursors: HashMap::new(),
            handles: HashMap::new(),
            next_id: 1,
        }
    }

    /// Number of open cursors.
    pub fn open_cursors(&self) -> usize {
        self.cursors.len()
    }

    /// Number of open file handles.
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    /// Route one incoming message, returning the response if there is one.
    pub async fn route(&mut self, message: Message) -> RouterResult {
        debug!(?message, "Routing message");

        match message {
            Message::FileRequest(req) => self.handle_file_request(req).await,
            Message::ListAt(req) => self.handle_list_at(req),
            Message::ReadAt(req) => self.handle_read_at(req).await,
            Message::WriteAt(req) => self.handle_write_at(req).await,
            Message::Close(req) => self.handle_close(req),

            Message::CursorOpened(_)
            | Message::ListPage(_)
            | Message::HandleOpened(_)
            | Message::FileData(_)
            | Message::Written(_)
            | Message::Closed(_) => {
                // These are response messages, not requests - ignore them
                debug!("Ignoring response message received as request");
                Ok(None)
            }

            Message::Hello(_) | Message::Input(_) | Message::View(_) => Err(
                RouterError::InvalidRequest("message not valid in a file session".to_string()),
            ),

            // Control messages
            Message::Ping(ping) => Ok(Some(Self::handle_ping(ping))),
            Message::Pong(_) => {
                debug!("Received pong");
                Ok(None)
            }
            Message::Error(err) => {
                warn!(?err, "Received error from peer");
                Ok(None)
            }
        }
    }

    // =========================================================================
    // File Handlers
    // =========================================================================

    async fn handle_file_request(&mut self, req: FileRequest) -> RouterResult {
        let service = Arc::clone(&self.service);
        let response = tokio::task::spawn_blocking(move || service.dispatch(&req))
            .await
            .map_err(|e| RouterError::Internal(e.to_string()))??;

        let id = self.allocate_id()?;
        match response {
            FileResponse::Listing(cursor) => {
                let len = cursor.len() as u64;
                self.cursors.insert(id, cursor);
                debug!(cursor = id, len, "Cursor opened");
                Ok(Some(Message::CursorOpened(CursorOpened { cursor: id, len })))
            }
            FileResponse::File(file) => {
                self.handles.insert(id, Arc::new(file));
                debug!(handle = id, "Handle opened");
                Ok(Some(Message::HandleOpened(HandleOpened { handle: id })))
            }
        }
    }

    fn handle_list_at(&mut self, req: ListAt) -> RouterResult {
        let cursor = self.cursors.get(&req.cursor).ok_or_else(|| {
            RouterError::InvalidRequest(format!("unknown cursor {}", req.cursor))
        })?;

        let page = cursor.page(req.offset, (req.count as usize).min(MAX_LIST_PAGE));
        Ok(Some(Message::ListPage(ListPage {
            cursor: req.cursor,
            entries: page.entries.iter().map(|e| e.to_protocol()).collect(),
            end_of_list: page.end_of_list,
        })))
    }

    async fn handle_read_at(&mut self, req: ReadAt) -> RouterResult {
        let file = self.handle(req.handle)?;
        let len = (req.len as usize).min(MAX_READ_CHUNK);
        let offset = req.offset;

        let (data, eof) = tokio::task::spawn_blocking(move || read_chunk(&file, offset, len))
            .await
            .map_err(|e| RouterError::Internal(e.to_string()))??;

        Ok(Some(Message::FileData(FileData {
            handle: req.handle,
            offset,
            data,
            eof,
        })))
    }

    async fn handle_write_at(&mut self, req: WriteAt) -> RouterResult {
        let file = self.handle(req.handle)?;
        let WriteAt {
            handle,
            offset,
            data,
        } = req;

        let count = data.len() as u64;
        tokio::task::spawn_blocking(move || file.write_all_at(&data, offset))
            .await
            .map_err(|e| RouterError::Internal(e.to_string()))??;

        Ok(Some(Message::Written(Written { handle, count })))
    }

    fn handle_close(&mut self, req: Close) -> RouterResult {
        let closed = self.cursors.remove(&req.id).is_some() || self.handles.remove(&req.id).is_some();
        if !closed {
            return Err(RouterError::InvalidRequest(format!("unknown id {}", req.id)));
        }
        debug!(id = req.id, "Closed");
        Ok(Some(Message::Closed(Closed { id: req.id })))
    }

    // =========================================================================
    // Control Handlers
    // =========================================================================

    fn handle_ping(ping: Ping) -> Message {
        debug!(timestamp = ping.timestamp, "Received ping");

        Message::Pong(Pong {
            timestamp: ping.timestamp,
            payload: ping.payload,
        })
    }

    fn handle(&self, id: u32) -> Result<Arc<File>, RouterError> {
        self.handles
            .get(&id)
            .cloned()
            .ok_or_else(|| RouterError::InvalidRequest(format!("unknown handle {}", id)))
    }

    fn allocate_id(&mut self) -> Result<u32, RouterError> {
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| RouterError::Internal("id space exhausted".to_string()))?;
        Ok(id)
    }
}

/// Read up to `len` bytes at `offset`. The flag is set when end of file was
/// hit before `len` bytes were read.
fn read_chunk(file: &File, offset: u64, len: usize) -> io::Result<(Vec<u8>, bool)> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match file.read_at(&mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    buf.truncate(filled);
    Ok((buf, filled < len))
}
