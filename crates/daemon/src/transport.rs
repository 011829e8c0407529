//! Framed envelope transport over any byte stream.
//!
//! Envelopes are MessagePack encoded and wrapped by [`FrameCodec`]. A
//! [`FrameStream`] can be split into a reader and a writer so a session can
//! wait for input while another task sends output.

use bytes::{Buf, BytesMut};
use protocol::{Envelope, FrameCodec, Message, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// Initial read buffer capacity.
const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reading half of a framed stream.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    codec: FrameCodec,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            codec: FrameCodec::new(),
        }
    }

    /// Read the next envelope.
    ///
    /// Returns `None` if the peer closed the stream between frames. A close
    /// in the middle of a frame is an error.
    pub async fn recv(&mut self) -> Result<Option<Envelope>, ProtocolError> {
        loop {
            if let Some((envelope, consumed)) = self.codec.try_decode_envelope(&self.buf)? {
                self.buf.advance(consumed);
                return Ok(Some(envelope));
            }

            if self.inner.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(ProtocolError::ConnectionClosed(format!(
                    "stream ended with {} bytes of a partial frame",
                    self.buf.len()
                )));
            }
        }
    }
}

/// Writing half of a framed stream.
pub struct FrameWriter<W> {
    inner: W,
    codec: FrameCodec,
    sequence: u64,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            codec: FrameCodec::new(),
            sequence: 0,
        }
    }

    /// Send a message under the next outgoing sequence number.
    pub async fn send(&mut self, message: Message) -> Result<u64, ProtocolError> {
        self.sequence += 1;
        let sequence = self.sequence;
        self.write(&Envelope::new(sequence, message)).await?;
        Ok(sequence)
    }

    /// Send a response carrying the sequence number of the request it answers.
    pub async fn reply(&mut self, sequence: u64, message: Message) -> Result<(), ProtocolError> {
        self.write(&Envelope::new(sequence, message)).await
    }

    async fn write(&mut self, envelope: &Envelope) -> Result<(), ProtocolError> {
        let frame = self.codec.encode_envelope(envelope)?;
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Flush and shut down the write side.
    pub async fn shutdown(&mut self) -> Result<(), ProtocolError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// A byte stream carrying framed envelopes in both directions.
pub struct FrameStream<S> {
    reader: FrameReader<ReadHalf<S>>,
    writer: FrameWriter<WriteHalf<S>>,
}

impl<S: AsyncRead + AsyncWrite> FrameStream<S> {
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
        }
    }

    /// Read the next envelope. See [`FrameReader::recv`].
    pub async fn recv(&mut self) -> Result<Option<Envelope>, ProtocolError> {
        self.reader.recv().await
    }

    /// Send a message. See [`FrameWriter::send`].
    pub async fn send(&mut self, message: Message) -> Result<u64, ProtocolError> {
        self.writer.send(message).await
    }

    /// Reply to a request. See [`FrameWriter::reply`].
    pub async fn reply(&mut self, sequence: u64, message: Message) -> Result<(), ProtocolError> {
        self.writer.reply(sequence, message).await
    }

    /// Split into independently usable halves.
    pub fn into_split(self) -> (FrameReader<ReadHalf<S>>, FrameWriter<WriteHalf<S>>) {
        (self.reader, self.writer)
    }
}
