//! Vector corpora handed to the build pipeline.
//!
//! A corpus is a re-creatable supplier of forward-only cursors over the live
//! `(doc_id, vector)` pairs of one field in one build unit. Cursors cannot be
//! rewound, so every consumer (each upload partition, the doc-id pass, a
//! local fallback build) asks the corpus for a fresh one.

pub mod file;
pub mod memory;
pub mod stream;

use std::io;
use std::sync::Arc;

use crate::types::{DocId, VectorDataType};

pub use file::FlatFileCorpus;
pub use memory::InMemoryCorpus;
pub use stream::VectorCursorStream;

/// Forward-only cursor over the live documents of a corpus.
///
/// A fresh cursor is positioned before the first document.
pub trait VectorCursor: Send {
    /// Advance to the next live document without materializing its vector.
    /// Returns `None` once the cursor is exhausted.
    fn next_doc(&mut self) -> io::Result<Option<DocId>>;

    /// Materialize the vector of the current document. May perform I/O.
    fn vector(&mut self) -> io::Result<&[f32]>;
}

/// Re-creatable source of cursors for one field in one build unit.
pub trait VectorCorpus: Send + Sync {
    /// Open a new cursor positioned before the first document.
    fn cursor(&self) -> io::Result<Box<dyn VectorCursor>>;

    /// Number of elements per vector.
    fn dimension(&self) -> usize;

    /// Number of live vectors a cursor will yield.
    fn live_count(&self) -> usize;

    fn data_type(&self) -> VectorDataType {
        VectorDataType::Float32
    }

    fn bytes_per_vector(&self) -> usize {
        self.dimension() * self.data_type().element_width()
    }

    /// Length of the logical `(vector_0, vector_1, ...)` byte sequence.
    fn total_bytes(&self) -> u64 {
        self.live_count() as u64 * self.bytes_per_vector() as u64
    }
}

/// Shared handle to a corpus. Cloning is cheap and yields the same supplier.
pub type CorpusHandle = Arc<dyn VectorCorpus>;

/// Encode every live doc id of the corpus as little-endian `i32`.
///
/// Walks a fresh cursor without materializing any vector.
pub fn encode_doc_ids(corpus: &dyn VectorCorpus) -> io::Result<Vec<u8>> {
    let mut cursor = corpus.cursor()?;
    let mut out = Vec::with_capacity(corpus.live_count() * std::mem::size_of::<DocId>());
    while let Some(doc_id) = cursor.next_doc()? {
        out.extend_from_slice(&doc_id.to_le_bytes());
    }
    Ok(out)
}
