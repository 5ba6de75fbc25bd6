//! Incremental UTF-8 decoding over arbitrarily split byte chunks.

use bytes::{Bytes, BytesMut};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid UTF-8 at byte offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("stream ended inside a multi-byte character ({pending} trailing bytes)")]
    Incomplete { pending: usize },
}

/// Bytes that decode to whole characters.
///
/// Always valid UTF-8 and always begins on a character boundary, so a char
/// start is any byte that is not a continuation byte (`0b10xx_xxxx`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedChunk {
    bytes: Bytes,
    chars: usize,
}

impl DecodedChunk {
    fn new(bytes: Bytes) -> Self {
        let chars = bytes.iter().filter(|b| is_char_start(**b)).count();
        Self { bytes, chars }
    }

    pub fn char_count(&self) -> usize {
        self.chars
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// The encoded form of the first `n` characters.
    pub fn take_chars(self, n: usize) -> Bytes {
        if n >= self.chars {
            return self.bytes;
        }
        let end = self
            .bytes
            .iter()
            .enumerate()
            .filter(|(_, b)| is_char_start(**b))
            .nth(n)
            .map_or(self.bytes.len(), |(idx, _)| idx);
        self.bytes.slice(..end)
    }
}

fn is_char_start(byte: u8) -> bool {
    byte & 0xC0 != 0x80
}

/// Stateful decoder. A character split across chunks is held back until the
/// chunk that completes it arrives, so every [`DecodedChunk`] is
/// self-contained. One decoder must serve the whole stream.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: BytesMut,
    consumed: usize,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: Bytes) -> Result<DecodedChunk, DecodeError> {
        let buf = if self.pending.is_empty() {
            chunk
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(&chunk);
            joined.freeze()
        };

        match std::str::from_utf8(&buf) {
            Ok(_) => {
                self.consumed += buf.len();
                Ok(DecodedChunk::new(buf))
            }
            Err(e) if e.error_len().is_none() => {
                // Truncated sequence at the end: keep it for the next chunk
                let valid = e.valid_up_to();
                self.pending.extend_from_slice(&buf[valid..]);
                self.consumed += valid;
                Ok(DecodedChunk::new(buf.slice(..valid)))
            }
            Err(e) => Err(DecodeError::InvalidUtf8 {
                offset: self.consumed + e.valid_up_to(),
            }),
        }
    }

    /// Call once at end of stream; leftover bytes mean a truncated character.
    pub fn finish(self) -> Result<(), DecodeError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::Incomplete {
                pending: self.pending.len(),
            })
        }
    }
}
