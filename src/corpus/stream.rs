//! Byte-stream view over a vector cursor.
//!
//! [`VectorCursorStream`] presents the logical byte sequence
//! `(vector_0, vector_1, ...)` of a corpus, each element encoded as
//! little-endian `f32`, without materializing more than one vector at a time.
//! A stream covers `[byte_offset, byte_offset + byte_length)` of that
//! sequence, so several streams over fresh cursors of the same corpus can
//! serve disjoint partitions of one upload concurrently.
//!
//! Positioning happens once, in the constructor: the cursor is advanced from
//! document zero to the start offset. That skip is O(n) in the offset but only
//! calls `next_doc`, which never materializes a vector.

use std::io::{self, Read, Seek, SeekFrom};

use tracing::trace;

use crate::error::{GraphliftError, Result};
use crate::types::VectorDataType;

use super::{VectorCorpus, VectorCursor};

pub struct VectorCursorStream {
    cursor: Box<dyn VectorCursor>,
    /// One vector wide; `buffer_pos == buffer.len()` means it needs a refill.
    buffer: Vec<u8>,
    buffer_pos: usize,
    /// Bytes still allowed to be produced. `u64::MAX` when unbounded.
    remaining: u64,
    exhausted: bool,
}

impl VectorCursorStream {
    /// Wrap `cursor`, which must be freshly opened (positioned before the
    /// first document).
    ///
    /// `byte_offset` must fall on a vector boundary. `byte_length` of `None`
    /// reads to the end of the corpus.
    pub fn new(
        mut cursor: Box<dyn VectorCursor>,
        bytes_per_vector: usize,
        byte_offset: u64,
        byte_length: Option<u64>,
    ) -> Result<Self> {
        if bytes_per_vector == 0 || byte_offset % bytes_per_vector as u64 != 0 {
            return Err(GraphliftError::InvalidRange {
                offset: byte_offset,
                bytes_per_vector,
            });
        }

        let vectors_to_skip = byte_offset / bytes_per_vector as u64;
        let mut exhausted = false;
        for _ in 0..vectors_to_skip {
            if cursor.next_doc()?.is_none() {
                exhausted = true;
                break;
            }
        }
        trace!(byte_offset, vectors_to_skip, "positioned vector stream");

        Ok(Self {
            cursor,
            buffer: vec![0u8; bytes_per_vector],
            buffer_pos: bytes_per_vector,
            remaining: byte_length.unwrap_or(u64::MAX),
            exhausted,
        })
    }

    /// Open a stream over a fresh cursor of `corpus`.
    pub fn open(corpus: &dyn VectorCorpus, byte_offset: u64, byte_length: Option<u64>) -> Result<Self> {
        if corpus.data_type() != VectorDataType::Float32 {
            return Err(GraphliftError::UnsupportedOperation(format!(
                "streaming {} vectors",
                corpus.data_type()
            )));
        }
        Self::new(corpus.cursor()?, corpus.bytes_per_vector(), byte_offset, byte_length)
    }

    /// Always fails: the underlying cursor is forward-only and materializing
    /// vectors may hit disk. Position streams through the constructor.
    pub fn skip(&mut self, n: u64) -> Result<u64> {
        Err(GraphliftError::UnsupportedOperation(format!(
            "skipping {n} bytes of a vector stream"
        )))
    }

    /// Advance the cursor one vector and re-encode it into the buffer.
    /// Returns `false` once the cursor is exhausted.
    fn reload(&mut self) -> io::Result<bool> {
        if self.cursor.next_doc()?.is_none() {
            self.exhausted = true;
            return Ok(false);
        }

        let vector = self.cursor.vector()?;
        if vector.len() * 4 != self.buffer.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "vector has {} elements, stream expects {} bytes per vector",
                    vector.len(),
                    self.buffer.len()
                ),
            ));
        }
        for (bytes, value) in self.buffer.chunks_exact_mut(4).zip(vector) {
            bytes.copy_from_slice(&value.to_le_bytes());
        }
        self.buffer_pos = 0;
        Ok(true)
    }
}

impl Read for VectorCursorStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.remaining == 0 || self.exhausted {
            return Ok(0);
        }

        if self.buffer_pos == self.buffer.len() && !self.reload()? {
            return Ok(0);
        }

        let available = self.buffer.len() - self.buffer_pos;
        let allowed = self.remaining.min(usize::MAX as u64) as usize;
        let n = available.min(buf.len()).min(allowed);
        buf[..n].copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + n]);
        self.buffer_pos += n;
        self.remaining -= n as u64;
        Ok(n)
    }
}

impl Seek for VectorCursorStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("vector streams cannot seek ({pos:?}); open a new stream at the offset"),
        ))
    }
}
