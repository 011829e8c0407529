//! # filemover Protocol Library
//!
//! Wire types shared by the filemover server and its peers.
//!
//! ## Overview
//!
//! - **Message Definitions**: session setup, file-service requests and
//!   responses, interactive selection input and views
//! - **Open Intents**: the structured open flags a client sends with a read
//! - **Frame Codec**: length-prefixed framing with optional LZ4 compression
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Application Messages           │  MessagePack-encoded
//! ├─────────────────────────────────────────┤
//! │              Framing                    │  Length-prefixed, LZ4
//! ├─────────────────────────────────────────┤
//! │        Session transport (TCP)          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{Envelope, FrameCodec, Message};
//! use protocol::messages::FileRequest;
//!
//! let envelope = Envelope::new(1, Message::FileRequest(FileRequest::list("/")));
//! let codec = FrameCodec::new();
//! let frame = codec.encode_envelope(&envelope).unwrap();
//! let (decoded, _) = codec.try_decode_envelope(&frame).unwrap().unwrap();
//! assert_eq!(decoded, envelope);
//! ```

pub mod error;
pub mod framing;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use framing::{
    FrameCodec, COMPRESSION_THRESHOLD, FRAME_HEADER_SIZE, FRAME_MAGIC, MAX_FRAME_SIZE,
};
pub use messages::{
    Envelope, ErrorCode, ErrorMessage, FileEntry, FileMethod, FileRequest, InputEvent, Message,
    OpenIntent, SessionKind, PROTOCOL_VERSION,
};
