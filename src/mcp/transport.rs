//! Newline-delimited JSON-RPC framing over async byte streams.
//!
//! The server reads one message per line from its input and writes one
//! message per line to its output. Output is shared between concurrently
//! running calls, so every write takes the writer lock for a whole line and
//! frames never interleave.

use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::trace;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One line of input. Lines that are not valid UTF-8 are surfaced rather
/// than failing the stream, so the server can answer them and keep reading.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    InvalidUtf8(std::str::Utf8Error),
}

/// Reads newline-terminated frames, skipping blank lines.
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Next non-empty frame with its line terminator stripped, or `None` at
    /// end of input.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        loop {
            self.buf.clear();
            if self.inner.read_until(b'\n', &mut self.buf).await? == 0 {
                return Ok(None);
            }
            let line = strip_terminator(&self.buf);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            trace!("read frame: {} bytes", line.len());
            return Ok(Some(match std::str::from_utf8(line) {
                Ok(text) => Frame::Text(text.to_string()),
                Err(e) => Frame::InvalidUtf8(e),
            }));
        }
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !matches!(b, b'\r' | b'\n'))
        .map_or(0, |last| last + 1);
    &line[..end]
}

/// Cloneable handle that writes whole frames to the shared output.
pub struct FrameWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for FrameWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub async fn write<T: Serialize>(&self, message: &T) -> Result<(), TransportError> {
        let mut framed = serde_json::to_vec(message)?;
        framed.push(b'\n');

        let mut out = self.inner.lock().await;
        out.write_all(&framed).await?;
        out.flush().await?;
        trace!("wrote frame: {} bytes", framed.len());
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), TransportError> {
        self.inner.lock().await.shutdown().await?;
        Ok(())
    }
}
