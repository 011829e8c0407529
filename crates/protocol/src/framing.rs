//! Frame codec for length-prefixed framing with optional LZ4 compression.
//!
//! # Frame Format
//!
//! Each frame consists of:
//! - 4 bytes: magic bytes "FMVR"
//! - 4 bytes: content length (big-endian, includes flags byte)
//! - 1 byte: flags (bit 0 = compressed)
//! - N bytes: payload (possibly LZ4 compressed)
//!
//! Payloads larger than [`COMPRESSION_THRESHOLD`] are compressed when that
//! actually makes them smaller.

use crate::error::{ProtocolError, Result};
use crate::messages::{Envelope, PROTOCOL_VERSION};

/// Magic bytes identifying a filemover frame.
pub const FRAME_MAGIC: [u8; 4] = *b"FMVR";

/// Compression threshold in bytes. Payloads larger than this are compressed.
pub const COMPRESSION_THRESHOLD: usize = 1024;

/// Maximum frame size (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Frame header size: 4 (magic) + 4 (length) + 1 (flags) = 9 bytes.
pub const FRAME_HEADER_SIZE: usize = 9;

/// Flag bit marking an LZ4 compressed payload.
const FLAG_COMPRESSED: u8 = 0b0000_0001;

/// Encoder and decoder for frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        Self
    }

    /// Encode a payload into a complete frame.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() > MAX_FRAME_SIZE - FRAME_HEADER_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len() + FRAME_HEADER_SIZE,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut flags = 0u8;
        let compressed;
        let body: &[u8] = if payload.len() > COMPRESSION_THRESHOLD {
            compressed = lz4_flex::compress_prepend_size(payload);
            if compressed.len() < payload.len() {
                flags |= FLAG_COMPRESSED;
                &compressed
            } else {
                payload
            }
        } else {
            payload
        };

        let content_len = 1 + body.len();
        let mut output = Vec::with_capacity(8 + content_len);
        output.extend_from_slice(&FRAME_MAGIC);
        output.extend_from_slice(&(content_len as u32).to_be_bytes());
        output.push(flags);
        output.extend_from_slice(body);
        Ok(output)
    }

    /// Try to decode one frame from the front of `data`.
    ///
    /// Returns `Ok(None)` when more bytes are needed, otherwise the decoded
    /// payload and the number of bytes consumed.
    pub fn try_decode(&self, data: &[u8]) -> Result<Option<(Vec<u8>, usize)>> {
        if data.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let magic: [u8; 4] = [data[0], data[1], data[2], data[3]];
        if magic != FRAME_MAGIC {
            return Err(ProtocolError::InvalidFrameMagic {
                expected: u32::from_be_bytes(FRAME_MAGIC),
                got: u32::from_be_bytes(magic),
            });
        }

        let content_len = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let total = 8 + content_len;
        if total > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: total,
                max: MAX_FRAME_SIZE,
            });
        }
        if content_len < 1 {
            return Err(ProtocolError::Deserialization(
                "invalid frame: content length must include the flags byte".to_string(),
            ));
        }
        if data.len() < total {
            return Ok(None);
        }

        let flags = data[8];
        let body = &data[FRAME_HEADER_SIZE..total];
        let payload = if flags & FLAG_COMPRESSED != 0 {
            lz4_flex::decompress_size_prepended(body).map_err(|e| {
                ProtocolError::Deserialization(format!("failed to decompress payload: {}", e))
            })?
        } else {
            body.to_vec()
        };

        Ok(Some((payload, total)))
    }

    /// Serialize and frame an envelope.
    pub fn encode_envelope(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        let bytes = envelope.to_msgpack()?;
        self.encode(&bytes)
    }

    /// Try to decode one envelope from the front of `data`.
    pub fn try_decode_envelope(&self, data: &[u8]) -> Result<Option<(Envelope, usize)>> {
        match self.try_decode(data)? {
            Some((payload, consumed)) => {
                let envelope = Envelope::from_msgpack(&payload)?;
                if envelope.version != PROTOCOL_VERSION {
                    return Err(ProtocolError::UnsupportedVersion(envelope.version));
                }
                Ok(Some((envelope, consumed)))
            }
            None => Ok(None),
        }
    }
}
