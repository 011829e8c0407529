//! Protocol message definitions for filemover.
//!
//! This module defines every message exchanged between the server and a
//! connected peer. All messages are serialized using MessagePack.

use serde::{Deserialize, Serialize};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Envelope wrapper for all protocol messages.
///
/// The envelope provides versioning and sequence numbers so a peer can match
/// responses to the request that caused them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version for compatibility checking.
    pub version: u8,
    /// Sequence number for message ordering and acknowledgment.
    pub sequence: u64,
    /// The actual message payload.
    pub payload: Message,
}

impl Envelope {
    /// Create a new envelope with the current protocol version.
    pub fn new(sequence: u64, payload: Message) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sequence,
            payload,
        }
    }
}

/// Top-level message enum containing all message types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    // Session setup
    /// First message of every session, choosing what the session is for.
    Hello(Hello),

    // File service
    /// A file-service request identified by its method tag.
    FileRequest(FileRequest),
    /// A listing or stat produced a cursor.
    CursorOpened(CursorOpened),
    /// Request a page from an open cursor.
    ListAt(ListAt),
    /// A page of directory entries.
    ListPage(ListPage),
    /// A file was opened for positioned I/O.
    HandleOpened(HandleOpened),
    /// Positioned read from an open handle.
    ReadAt(ReadAt),
    /// Bytes returned by a positioned read.
    FileData(FileData),
    /// Positioned write to an open handle.
    WriteAt(WriteAt),
    /// Acknowledges a positioned write.
    Written(Written),
    /// Release a cursor or handle.
    Close(Close),
    /// Acknowledges a close.
    Closed(Closed),

    // Interactive selection
    /// A key-level input event for the selection session.
    Input(Input),
    /// The rendered selection view.
    View(View),

    // Control messages
    /// Ping for keepalive.
    Ping(Ping),
    /// Pong response to ping.
    Pong(Pong),
    /// Error message.
    Error(ErrorMessage),
}

// ============================================================================
// Session setup
// ============================================================================

/// What a freshly accepted session will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    /// Remote file-service requests (list/stat/read).
    Files,
    /// Interactive file selection.
    Interactive,
}

/// Session opening message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Requested session kind.
    pub kind: SessionKind,
    /// Optional client name, used only for logging.
    pub client: Option<String>,
}

// ============================================================================
// File service
// ============================================================================

/// Method tag for listing a directory.
pub const METHOD_LIST: &str = "List";
/// Method tag for stat of a single path.
pub const METHOD_STAT: &str = "Stat";
/// Method tag for opening a file.
pub const METHOD_READ: &str = "Read";
/// Alias of [`METHOD_READ`] accepted from clients that name it after the open call.
pub const METHOD_OPEN: &str = "Open";

/// Parsed form of a request method tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileMethod {
    /// Enumerate a directory.
    List,
    /// Describe a single path.
    Stat,
    /// Open a file with an [`OpenIntent`].
    Read,
    /// Anything else. Answered with an unsupported-operation error.
    Unsupported(String),
}

impl FileMethod {
    /// Parse a method tag. Tags are case sensitive.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            METHOD_LIST => FileMethod::List,
            METHOD_STAT => FileMethod::Stat,
            METHOD_READ | METHOD_OPEN => FileMethod::Read,
            other => FileMethod::Unsupported(other.to_string()),
        }
    }

    /// The canonical tag for this method.
    pub fn as_tag(&self) -> &str {
        match self {
            FileMethod::List => METHOD_LIST,
            FileMethod::Stat => METHOD_STAT,
            FileMethod::Read => METHOD_READ,
            FileMethod::Unsupported(tag) => tag,
        }
    }
}

/// How a client wants a remote file opened.
///
/// The fields mirror the SFTP v3 `pflags` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenIntent {
    /// Position every write at the end of the file.
    pub append: bool,
    /// Create the file if it does not exist.
    pub create: bool,
    /// Fail if the file already exists (with `create`).
    pub exclusive: bool,
    /// Truncate an existing file to zero length.
    pub truncate: bool,
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
}

impl OpenIntent {
    /// Intent for a plain read.
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }
}

/// A file-service request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRequest {
    /// Method tag (`List`, `Stat`, `Read`, ...).
    pub method: String,
    /// Path relative to the served root.
    pub path: String,
    /// Open intent. Only meaningful for `Read`.
    #[serde(default)]
    pub open: OpenIntent,
}

impl FileRequest {
    /// Build a `List` request.
    pub fn list(path: impl Into<String>) -> Self {
        Self {
            method: METHOD_LIST.to_string(),
            path: path.into(),
            open: OpenIntent::default(),
        }
    }

    /// Build a `Stat` request.
    pub fn stat(path: impl Into<String>) -> Self {
        Self {
            method: METHOD_STAT.to_string(),
            path: path.into(),
            open: OpenIntent::default(),
        }
    }

    /// Build a `Read` request with the given intent.
    pub fn read(path: impl Into<String>, open: OpenIntent) -> Self {
        Self {
            method: METHOD_READ.to_string(),
            path: path.into(),
            open,
        }
    }

    /// Parsed method.
    pub fn file_method(&self) -> FileMethod {
        FileMethod::from_tag(&self.method)
    }
}

/// A single file or directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Unix permission bits.
    pub mode: u32,
    /// Last modified timestamp (Unix epoch seconds).
    pub modified: u64,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// A listing or stat produced a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorOpened {
    /// Cursor id, valid until closed or the session ends.
    pub cursor: u32,
    /// Total number of entries behind the cursor.
    pub len: u64,
}

/// Request a page of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAt {
    /// Cursor id.
    pub cursor: u32,
    /// Index of the first entry wanted.
    pub offset: u64,
    /// Maximum number of entries wanted.
    pub count: u32,
}

/// A page of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage {
    /// Cursor id the page came from.
    pub cursor: u32,
    /// Entries in the page.
    pub entries: Vec<FileEntry>,
    /// No entries remain past this page.
    pub end_of_list: bool,
}

/// A file was opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleOpened {
    /// Handle id, valid until closed or the session ends.
    pub handle: u32,
}

/// Positioned read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadAt {
    /// Handle id.
    pub handle: u32,
    /// Byte offset to read from.
    pub offset: u64,
    /// Maximum number of bytes wanted.
    pub len: u32,
}

/// Bytes returned by a positioned read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    /// Handle id.
    pub handle: u32,
    /// Offset the data starts at.
    pub offset: u64,
    /// The data.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    /// The read reached end of file.
    pub eof: bool,
}

/// Positioned write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAt {
    /// Handle id.
    pub handle: u32,
    /// Byte offset to write at.
    pub offset: u64,
    /// The data.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

/// Acknowledges a positioned write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Written {
    /// Handle id.
    pub handle: u32,
    /// Number of bytes written.
    pub count: u64,
}

/// Release a cursor or handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Close {
    /// Cursor or handle id.
    pub id: u32,
}

/// Acknowledges a close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closed {
    /// Cursor or handle id.
    pub id: u32,
}

// ============================================================================
// Interactive selection
// ============================================================================

/// Input events understood by a selection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputEvent {
    /// Move the cursor up one row.
    MoveUp,
    /// Move the cursor down one row.
    MoveDown,
    /// Toggle selection of the row under the cursor.
    ToggleSelect,
    /// Send every selected file.
    SendTrigger,
    /// End the session.
    Quit,
}

/// Wraps an [`InputEvent`] for the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// The event.
    pub event: InputEvent,
}

/// Rendered view text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    /// The full view, newline separated.
    pub text: String,
}

// ============================================================================
// Control Messages
// ============================================================================

/// Ping for keepalive and latency measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    /// Timestamp when ping was sent (for latency calculation).
    pub timestamp: u64,
    /// Optional payload for echo.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

/// Pong response to ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    /// Original timestamp from ping.
    pub timestamp: u64,
    /// Echo of the original payload.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

/// Error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Error code for programmatic handling.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Optional context (e.g. the requested path).
    pub context: Option<String>,
    /// Whether retrying the same request could succeed.
    pub recoverable: bool,
}

/// Error codes for common error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Unknown or unspecified error.
    Unknown,
    /// Path does not exist.
    NotFound,
    /// Path exists but is not a directory.
    NotADirectory,
    /// Local permissions forbid the operation.
    PermissionDenied,
    /// Any other local filesystem failure.
    Io,
    /// The request method is not implemented.
    Unsupported,
    /// Malformed request or unknown id.
    InvalidRequest,
}

// ============================================================================
// Serialization helpers
// ============================================================================

impl Envelope {
    /// Serialize the envelope to MessagePack bytes.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    /// Deserialize an envelope from MessagePack bytes.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to test roundtrip serialization
    fn roundtrip_envelope(msg: Message) {
        let envelope = Envelope::new(42, msg);
        let bytes = envelope.to_msgpack().expect("serialization failed");
        let decoded = Envelope::from_msgpack(&bytes).expect("deserialization failed");
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn test_envelope_version() {
        let envelope = Envelope::new(
            1,
            Message::Ping(Ping {
                timestamp: 12345,
                payload: vec![],
            }),
        );
        assert_eq!(envelope.version, PROTOCOL_VERSION);
        assert_eq!(envelope.sequence, 1);
    }

    #[test]
    fn test_method_tags() {
        assert_eq!(FileMethod::from_tag("List"), FileMethod::List);
        assert_eq!(FileMethod::from_tag("Stat"), FileMethod::Stat);
        assert_eq!(FileMethod::from_tag("Read"), FileMethod::Read);
        assert_eq!(FileMethod::from_tag("Open"), FileMethod::Read);
        assert_eq!(
            FileMethod::from_tag("Rename"),
            FileMethod::Unsupported("Rename".to_string())
        );
        // Tags are case sensitive.
        assert_eq!(
            FileMethod::from_tag("list"),
            FileMethod::Unsupported("list".to_string())
        );
        assert_eq!(FileMethod::from_tag("Rename").as_tag(), "Rename");
    }

    #[test]
    fn test_request_constructors() {
        let req = FileRequest::read("docs/a.txt", OpenIntent::read_only());
        assert_eq!(req.file_method(), FileMethod::Read);
        assert!(req.open.read);
        assert!(!req.open.write);

        assert_eq!(FileRequest::list("/").file_method(), FileMethod::List);
        assert_eq!(FileRequest::stat("a").open, OpenIntent::default());
    }

    #[test]
    fn test_file_request_missing_open_defaults() {
        let json = r#"{"method":"List","path":"sub"}"#;
        let req: FileRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.open, OpenIntent::default());
    }

    #[test]
    fn test_list_page_roundtrip() {
        roundtrip_envelope(Message::ListPage(ListPage {
            cursor: 3,
            entries: vec![
                FileEntry {
                    name: "a.txt".to_string(),
                    size: 5,
                    mode: 0o644,
                    modified: 1_704_067_200,
                    is_dir: false,
                },
                FileEntry {
                    name: "docs".to_string(),
                    size: 4096,
                    mode: 0o755,
                    modified: 1_704_067_200,
                    is_dir: true,
                },
            ],
            end_of_list: true,
        }));
    }

    #[test]
    fn test_file_data_roundtrip() {
        roundtrip_envelope(Message::FileData(FileData {
            handle: 1,
            offset: 1024,
            data: b"Hello, World!".to_vec(),
            eof: false,
        }));
    }

    #[test]
    fn test_hello_and_input_roundtrip() {
        roundtrip_envelope(Message::Hello(Hello {
            kind: SessionKind::Interactive,
            client: Some("laptop".to_string()),
        }));
        roundtrip_envelope(Message::Input(Input {
            event: InputEvent::ToggleSelect,
        }));
    }

    #[test]
    fn test_error_roundtrip() {
        roundtrip_envelope(Message::Error(ErrorMessage {
            code: ErrorCode::Unsupported,
            message: "operation not supported: Rename".to_string(),
            context: Some("a.txt".to_string()),
            recoverable: false,
        }));
    }

    #[test]
    fn test_json_tagging() {
        let msg = Message::Close(Close { id: 7 });
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"Close","data":{"id":7}}"#);
    }
}
