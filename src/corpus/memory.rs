use std::io;
use std::sync::Arc;

use crate::error::{GraphliftError, Result};
use crate::types::DocId;

use super::{VectorCorpus, VectorCursor};

#[derive(Debug)]
struct Entries {
    dimension: usize,
    doc_ids: Vec<DocId>,
    /// Row-major, `doc_ids.len() * dimension` values.
    values: Vec<f32>,
}

/// Corpus backed by vectors already resident in memory.
#[derive(Debug, Clone)]
pub struct InMemoryCorpus {
    entries: Arc<Entries>,
}

impl InMemoryCorpus {
    /// Build a corpus from parallel doc-id and vector lists.
    pub fn new(dimension: usize, doc_ids: Vec<DocId>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if doc_ids.len() != vectors.len() {
            return Err(GraphliftError::Internal(format!(
                "{} doc ids for {} vectors",
                doc_ids.len(),
                vectors.len()
            )));
        }
        let mut values = Vec::with_capacity(vectors.len() * dimension);
        for v in &vectors {
            if v.len() != dimension {
                return Err(GraphliftError::Internal(format!(
                    "vector has {} elements, expected {dimension}",
                    v.len()
                )));
            }
            values.extend_from_slice(v);
        }
        Ok(Self {
            entries: Arc::new(Entries {
                dimension,
                doc_ids,
                values,
            }),
        })
    }

    /// Build a corpus whose doc ids are the vector ordinals.
    pub fn from_vectors(dimension: usize, vectors: Vec<Vec<f32>>) -> Result<Self> {
        let doc_ids = (0..vectors.len() as DocId).collect();
        Self::new(dimension, doc_ids, vectors)
    }
}

impl VectorCorpus for InMemoryCorpus {
    fn cursor(&self) -> io::Result<Box<dyn VectorCursor>> {
        Ok(Box::new(InMemoryCursor {
            entries: self.entries.clone(),
            position: None,
        }))
    }

    fn dimension(&self) -> usize {
        self.entries.dimension
    }

    fn live_count(&self) -> usize {
        self.entries.doc_ids.len()
    }
}

struct InMemoryCursor {
    entries: Arc<Entries>,
    /// `None` before the first `next_doc`.
    position: Option<usize>,
}

impl VectorCursor for InMemoryCursor {
    fn next_doc(&mut self) -> io::Result<Option<DocId>> {
        let next = self.position.map_or(0, |p| p + 1);
        if next >= self.entries.doc_ids.len() {
            self.position = Some(self.entries.doc_ids.len());
            return Ok(None);
        }
        self.position = Some(next);
        Ok(Some(self.entries.doc_ids[next]))
    }

    fn vector(&mut self) -> io::Result<&[f32]> {
        let dim = self.entries.dimension;
        match self.position {
            Some(p) if p < self.entries.doc_ids.len() => {
                Ok(&self.entries.values[p * dim..(p + 1) * dim])
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cursor is not positioned on a document",
            )),
        }
    }
}
