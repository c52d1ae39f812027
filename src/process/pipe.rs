//! Deadline-bounded draining of a child's output pipe.
//!
//! The companion has no framing beyond newlines and a prompt that is not
//! always newline-terminated, so a drain is best effort: it reads until the
//! prompt shows up, the buffer fills, the pipe closes, or the deadline
//! passes, and returns whatever it got.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::time::Instant;

/// Default capacity of the per-exchange read buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// A drain stops once the buffer is within this many bytes of full.
pub const BUFFER_MARGIN: usize = 100;

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainEnd {
    /// The prompt marker appeared in the output.
    Prompt,
    /// Enough lines were read.
    LineLimit,
    /// The buffer reached its early-stop margin.
    BufferFull,
    /// The pipe was closed by the child.
    Eof,
    /// The deadline passed first.
    Deadline,
    /// A read failed.
    ReadError,
}

/// Output collected for one command (or for the banner, when there is no
/// command).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExchange {
    /// The command line that prompted this output, if any.
    pub command: Option<String>,
    /// Everything read, lossily decoded.
    pub response: String,
    /// Number of read attempts made.
    pub attempts: usize,
    /// Why the drain stopped.
    pub end: DrainEnd,
}

impl CommandExchange {
    /// Whether the drain saw the prompt marker.
    #[must_use]
    pub fn prompt_seen(&self) -> bool {
        self.end == DrainEnd::Prompt
    }

    /// Whether anything at all was read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.response.is_empty()
    }
}

/// Buffered reader over a child's stdout.
#[derive(Debug)]
pub struct PipeReader<R> {
    reader: BufReader<R>,
    capacity: usize,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> PipeReader<R> {
    /// Create a reader with the default buffer capacity.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_CAPACITY)
    }

    /// Create a reader whose per-exchange buffer holds `capacity` bytes.
    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        Self {
            reader: BufReader::new(inner),
            capacity,
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Drain output until `prompt` appears or `timeout` elapses.
    ///
    /// An empty `prompt` disables the early stop on the marker.
    pub async fn read_exchange(
        &mut self,
        command: Option<&str>,
        prompt: &str,
        timeout: Duration,
    ) -> CommandExchange {
        self.drain(command, prompt, usize::MAX, timeout).await
    }

    /// Drain a single line, or whatever partial line arrives before
    /// `timeout`.
    pub async fn read_line(&mut self, command: Option<&str>, timeout: Duration) -> CommandExchange {
        self.drain(command, "", 1, timeout).await
    }

    async fn drain(
        &mut self,
        command: Option<&str>,
        prompt: &str,
        max_lines: usize,
        timeout: Duration,
    ) -> CommandExchange {
        self.buffer.clear();
        let deadline = Instant::now() + timeout;
        let limit = self.capacity.saturating_sub(BUFFER_MARGIN);
        let mut attempts = 0;
        let mut lines = 0;

        let end = loop {
            let room = self.capacity.saturating_sub(self.buffer.len());
            if room == 0 {
                break DrainEnd::BufferFull;
            }
            attempts += 1;

            // fill_buf is cancel-safe: whatever is not consumed stays
            // buffered for the next drain.
            let chunk = match tokio::time::timeout_at(deadline, self.reader.fill_buf()).await {
                Ok(Ok(chunk)) if chunk.is_empty() => break DrainEnd::Eof,
                Ok(Ok(chunk)) => chunk,
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "Pipe read failed");
                    break DrainEnd::ReadError;
                }
                Err(_) => break DrainEnd::Deadline,
            };

            // At most one line per read, and never past the buffer capacity.
            let take = chunk
                .iter()
                .position(|&b| b == b'\n')
                .map_or(chunk.len(), |i| i + 1)
                .min(room);
            let line_done = chunk[take - 1] == b'\n';
            self.buffer.extend_from_slice(&chunk[..take]);
            self.reader.consume(take);

            if contains(&self.buffer, prompt.as_bytes()) {
                break DrainEnd::Prompt;
            }
            if line_done {
                lines += 1;
                if lines >= max_lines {
                    break DrainEnd::LineLimit;
                }
            }
            if self.buffer.len() >= limit {
                break DrainEnd::BufferFull;
            }
        };

        let exchange = CommandExchange {
            command: command.map(str::to_string),
            response: String::from_utf8_lossy(&self.buffer).into_owned(),
            attempts,
            end,
        };
        tracing::trace!(
            command = ?exchange.command,
            attempts,
            ?end,
            bytes = self.buffer.len(),
            "Drained pipe"
        );
        exchange
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}
