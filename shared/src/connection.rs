//! Duplex byte stream shared between the receive loop and every sender
//!
//! Writes go through a single `tokio::sync::Mutex`, which is the exclusive send
//! token: acknowledgements from the receive loop and asynchronous sends from the
//! notification dispatcher never interleave. The guard is dropped when `send`
//! returns, on success and on error alike. Reads are owned by one task through
//! [`FrameReader`] and need no token.

use crate::codec::{Command, WireFormat};
use log::{debug, error};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;

const READ_BUFFER_SIZE: usize = 2048;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Send side of a connection. Cheap to clone; all clones share the send token.
#[derive(Clone)]
pub struct SocketChannel {
    writer: Arc<Mutex<BoxedWriter>>,
    format: WireFormat,
}

impl SocketChannel {
    /// Splits a stream into the shared send side and the single reader.
    pub fn from_stream<S>(stream: S, format: WireFormat) -> (Self, FrameReader)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer): (ReadHalf<S>, WriteHalf<S>) = tokio::io::split(stream);
        let channel = Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
            format,
        };
        let reader = FrameReader {
            reader: Box::new(reader),
            buffer: [0u8; READ_BUFFER_SIZE],
            partial: Vec::new(),
        };
        (channel, reader)
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub async fn send(&self, command: &Command) -> io::Result<()> {
        let bytes = self.format.encode(command);
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes.as_bytes()).await?;
        writer.flush().await?;
        debug!("Sent {}", command);
        Ok(())
    }

    /// Shuts down the write direction so the peer observes end-of-stream.
    pub async fn close(&self) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await
    }
}

/// Receive side of a connection, owned by the receive loop.
pub struct FrameReader {
    reader: BoxedReader,
    buffer: [u8; READ_BUFFER_SIZE],
    /// Leading bytes of a character the last read cut in half.
    partial: Vec<u8>,
}

impl FrameReader {
    /// Reads whatever bytes are available and returns the text they complete.
    ///
    /// A multi-byte character split between reads is held back until the rest
    /// of it arrives, so the result may be empty. Returns `None` when the peer
    /// closed the connection or the read failed; callers treat both as
    /// terminal and do not retry.
    pub async fn receive(&mut self) -> Option<String> {
        match self.reader.read(&mut self.buffer).await {
            Ok(0) => None,
            Ok(len) => {
                self.partial.extend_from_slice(&self.buffer[..len]);
                Some(take_text(&mut self.partial))
            }
            Err(e) => {
                error!("Error receiving from peer: {}", e);
                None
            }
        }
    }
}

/// Drains the decodable text from `bytes`, leaving an unfinished trailing
/// character in place. Invalid sequences become U+FFFD.
fn take_text(bytes: &mut Vec<u8>) -> String {
    let mut text = String::new();
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                text.push_str(valid);
                bytes.clear();
                return text;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&bytes[..valid]));
                match e.error_len() {
                    None => {
                        bytes.drain(..valid);
                        return text;
                    }
                    Some(invalid) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        bytes.drain(..valid + invalid);
                    }
                }
            }
        }
    }
}
