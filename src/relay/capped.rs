//! Length-capped pass-through of the upstream body.
//!
//! The stream pulls one upstream chunk at a time, accounts for it in decoded
//! characters, and either forwards it as-is or forwards a truncated prefix and
//! stops. Nothing is pulled once the budget is spent.

use async_stream::stream;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::decoder::{DecodeError, Utf8ChunkDecoder};

/// What to do with one upstream chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Forward these bytes and keep reading
    Forward(Bytes),
    /// Forward these bytes and close; the budget is spent
    Truncate(Bytes),
}

/// Per-request accounting state. Owned by a single relay stream.
#[derive(Debug)]
pub struct RelaySession {
    decoder: Utf8ChunkDecoder,
    total_emitted: usize,
    max_chars: usize,
}

impl RelaySession {
    pub fn new(max_chars: usize) -> Self {
        Self {
            decoder: Utf8ChunkDecoder::new(),
            total_emitted: 0,
            max_chars,
        }
    }

    pub fn total_emitted(&self) -> usize {
        self.total_emitted
    }

    pub fn is_exhausted(&self) -> bool {
        self.total_emitted >= self.max_chars
    }

    /// Account for one chunk in full before anything is forwarded.
    pub fn accept(&mut self, chunk: Bytes) -> Result<Step, DecodeError> {
        let decoded = self.decoder.decode(chunk)?;
        let chars = decoded.char_count();

        if self.total_emitted + chars <= self.max_chars {
            self.total_emitted += chars;
            return Ok(Step::Forward(decoded.into_bytes()));
        }

        let remaining = self.max_chars - self.total_emitted;
        self.total_emitted = self.max_chars;
        Ok(Step::Truncate(decoded.take_chars(remaining)))
    }

    /// End of upstream; flushes the decoder.
    pub fn finish(self) -> Result<(), DecodeError> {
        self.decoder.finish()
    }
}

/// Logs when the downstream goes away before the relay reached an end state.
/// Dropping the stream drops the upstream body with it, which releases the
/// upstream connection.
struct DisconnectGuard {
    done: bool,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.done {
            debug!("Client disconnected mid-stream, releasing upstream connection");
        }
    }
}

/// Relay `upstream` while emitting at most `max_chars` decoded characters.
///
/// Upstream read errors and invalid UTF-8 end the stream with an
/// `io::Error` item, which aborts the downstream body. Reaching the cap ends
/// it normally.
pub fn cap_stream<S, E>(
    upstream: S,
    max_chars: usize,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    stream! {
        let mut upstream = std::pin::pin!(upstream);
        let mut session = RelaySession::new(max_chars);
        let mut guard = DisconnectGuard { done: false };

        while !session.is_exhausted() {
            let Some(next) = upstream.next().await else {
                guard.done = true;
                let emitted = session.total_emitted();
                match session.finish() {
                    Ok(()) => debug!(emitted, "Upstream stream completed"),
                    Err(e) => {
                        warn!("Upstream stream ended badly: {e}");
                        yield Err(std::io::Error::other(e));
                    }
                }
                return;
            };

            let chunk = match next {
                Ok(c) => c,
                Err(e) => {
                    guard.done = true;
                    warn!("Upstream read failed: {e}");
                    yield Err(std::io::Error::other(e));
                    return;
                }
            };

            match session.accept(chunk) {
                Ok(Step::Forward(bytes)) => {
                    if !bytes.is_empty() {
                        yield Ok(bytes);
                    }
                }
                Ok(Step::Truncate(bytes)) => {
                    guard.done = true;
                    if !bytes.is_empty() {
                        yield Ok(bytes);
                    }
                    info!(max_chars, "Response truncated at length cap");
                    return;
                }
                Err(e) => {
                    guard.done = true;
                    warn!("Upstream sent undecodable data: {e}");
                    yield Err(std::io::Error::other(e));
                    return;
                }
            }
        }

        guard.done = true;
        info!(max_chars, "Response reached length cap");
    }
}
