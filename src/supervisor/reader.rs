//! Non-blocking, line-delimiting reader over one child output stream.

use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 4096;

/// Which child stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    /// Stable name for logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Presents one output descriptor as a line-delimited sequence of text.
///
/// Each [`drain`](Self::drain) performs a single bounded read, splits the
/// accumulated bytes on line boundaries, and retains any partial trailing
/// fragment for the next call. A zero-byte read marks the stream closed;
/// closed readers stop participating in the multiplexed wait.
#[derive(Debug)]
pub struct StreamReader<R> {
    source: R,
    kind: StreamKind,
    pending: Vec<u8>,
    closed: bool,
}

impl<R: AsyncRead + Unpin> StreamReader<R> {
    /// Wrap a stream handle.
    pub fn new(source: R, kind: StreamKind) -> Self {
        Self {
            source,
            kind,
            pending: Vec::new(),
            closed: false,
        }
    }

    /// Which stream this reader covers.
    #[must_use]
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Whether EOF has been observed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read currently available bytes and return the completed lines.
    ///
    /// Lines keep their trailing newline. At EOF the stream is marked closed
    /// and any retained fragment is delivered as a final newline-less line, so
    /// a consumer sees all output the process produced. Text is recovered with
    /// lossy UTF-8; bytes are otherwise passed through as received.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the read fails.
    pub async fn drain(&mut self) -> std::io::Result<Vec<String>> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.source.read(&mut chunk).await?;

        if n == 0 {
            self.closed = true;
            tracing::debug!(stream = self.kind.as_str(), "Stream closed");
            if self.pending.is_empty() {
                return Ok(Vec::new());
            }
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            return Ok(vec![tail]);
        }

        self.pending.extend_from_slice(&chunk[..n]);

        let mut lines = Vec::new();
        let mut consumed = 0;
        while let Some(pos) = self.pending[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + pos + 1;
            lines.push(String::from_utf8_lossy(&self.pending[consumed..end]).into_owned());
            consumed = end;
        }
        self.pending.drain(..consumed);

        Ok(lines)
    }
}
