//! Newline-delimited JSON-RPC transport.

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::types::{Request, Response};

/// Result alias for transport operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors surfaced by the line transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The underlying stream failed.
    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A line was not a valid request object.
    #[error("failed to parse request: {0}")]
    Parse(#[source] serde_json::Error),

    /// A response could not be encoded.
    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

/// One JSON object per line in each direction.
#[derive(Debug)]
pub struct Protocol<R, W> {
    reader: R,
    writer: W,
    line: String,
}

impl<R, W> Protocol<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wraps a buffered reader and a writer.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line: String::new(),
        }
    }

    /// Reads the next request, skipping blank lines.
    ///
    /// Returns `Ok(None)` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Io`] if reading fails or
    /// [`ProtocolError::Parse`] if the line is not a request. The offending line
    /// is consumed in both cases.
    pub async fn read_request(&mut self) -> ProtocolResult<Option<Request>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                return Ok(None);
            }
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let request: Request = serde_json::from_str(trimmed).map_err(ProtocolError::Parse)?;
            debug!(id = ?request.id, method = %request.method, "received request");
            return Ok(Some(request));
        }
    }

    /// Writes one response line and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] or [`ProtocolError::Io`].
    pub async fn write_response(&mut self, response: &Response) -> ProtocolResult<()> {
        let mut data = serde_json::to_vec(response).map_err(ProtocolError::Encode)?;
        data.push(b'\n');
        self.writer.write_all(&data).await?;
        self.writer.flush().await?;
        debug!(id = %response.id, has_error = response.is_error(), "sent response");
        Ok(())
    }

    /// Returns the last line read, including a failed one.
    #[must_use]
    pub fn last_line(&self) -> &str {
        self.line.trim_end()
    }

    /// Consumes the transport, returning the reader and writer.
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}
