//! Corpus over a flat little-endian vector file.
//!
//! Layout: `[u32 num_vectors][u32 dimension][f32 * num_vectors * dimension]`.
//! Doc ids are the vector ordinals.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{GraphliftError, Result};
use crate::types::DocId;

use super::{VectorCorpus, VectorCursor};

const HEADER_LEN: u64 = 8;

#[derive(Debug, Clone)]
pub struct FlatFileCorpus {
    path: PathBuf,
    num_vectors: usize,
    dimension: usize,
}

impl FlatFileCorpus {
    /// Open a vector file and validate its header against the file length.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)?;
        let num_vectors = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let dimension = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

        if dimension == 0 {
            return Err(GraphliftError::Internal(format!(
                "{} has dimension 0",
                path.display()
            )));
        }

        if DocId::try_from(num_vectors).is_err() {
            return Err(GraphliftError::Internal(format!(
                "{} holds {num_vectors} vectors, more than doc ids can address",
                path.display()
            )));
        }
        let expected = num_vectors
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| u64::try_from(n).ok())
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| {
                GraphliftError::Internal(format!(
                    "{} header overflows: {num_vectors} vectors of dimension {dimension}",
                    path.display()
                ))
            })?;
        let actual = file.metadata()?.len();
        if actual < expected {
            return Err(GraphliftError::Internal(format!(
                "{} is truncated: expected {expected} bytes, found {actual}",
                path.display()
            )));
        }

        Ok(Self {
            path,
            num_vectors,
            dimension,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write vectors in the flat layout read by [`FlatFileCorpus`].
pub fn write_flat_file(path: impl AsRef<Path>, dimension: usize, vectors: &[Vec<f32>]) -> Result<()> {
    let mut out = io::BufWriter::new(File::create(path)?);
    out.write_all(&(vectors.len() as u32).to_le_bytes())?;
    out.write_all(&(dimension as u32).to_le_bytes())?;
    for v in vectors {
        if v.len() != dimension {
            return Err(GraphliftError::Internal(format!(
                "vector has {} elements, expected {dimension}",
                v.len()
            )));
        }
        for x in v {
            out.write_all(&x.to_le_bytes())?;
        }
    }
    out.flush()?;
    Ok(())
}

impl VectorCorpus for FlatFileCorpus {
    fn cursor(&self) -> io::Result<Box<dyn VectorCursor>> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        reader.seek(SeekFrom::Start(HEADER_LEN))?;
        Ok(Box::new(FlatFileCursor {
            reader,
            num_vectors: self.num_vectors,
            next: 0,
            positioned: false,
            loaded: false,
            raw: vec![0u8; self.dimension * 4],
            values: vec![0.0; self.dimension],
        }))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn live_count(&self) -> usize {
        self.num_vectors
    }
}

struct FlatFileCursor {
    reader: BufReader<File>,
    num_vectors: usize,
    next: usize,
    positioned: bool,
    /// Whether the current vector's bytes were already consumed from `reader`.
    loaded: bool,
    raw: Vec<u8>,
    values: Vec<f32>,
}

impl VectorCursor for FlatFileCursor {
    fn next_doc(&mut self) -> io::Result<Option<DocId>> {
        if self.positioned && !self.loaded {
            self.reader.seek_relative(self.raw.len() as i64)?;
        }
        if self.next >= self.num_vectors {
            self.positioned = false;
            return Ok(None);
        }
        let doc_id = DocId::try_from(self.next)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "doc id out of range"))?;
        self.next += 1;
        self.positioned = true;
        self.loaded = false;
        Ok(Some(doc_id))
    }

    fn vector(&mut self) -> io::Result<&[f32]> {
        if !self.positioned {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cursor is not positioned on a document",
            ));
        }
        if !self.loaded {
            self.reader.read_exact(&mut self.raw)?;
            for (value, bytes) in self.values.iter_mut().zip(self.raw.chunks_exact(4)) {
                *value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
            self.loaded = true;
        }
        Ok(&self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vectors.bin");
        let vectors = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        write_flat_file(&path, 2, &vectors).unwrap();

        let corpus = FlatFileCorpus::open(&path).unwrap();
        assert_eq!(corpus.live_count(), 3);
        assert_eq!(corpus.dimension(), 2);

        // Skip the first vector without reading it, then read the rest.
        let mut cursor = corpus.cursor().unwrap();
        assert_eq!(cursor.next_doc().unwrap(), Some(0));
        assert_eq!(cursor.next_doc().unwrap(), Some(1));
        assert_eq!(cursor.vector().unwrap(), &[3.0, 4.0]);
        assert_eq!(cursor.vector().unwrap(), &[3.0, 4.0]);
        assert_eq!(cursor.next_doc().unwrap(), Some(2));
        assert_eq!(cursor.vector().unwrap(), &[5.0, 6.0]);
        assert_eq!(cursor.next_doc().unwrap(), None);
    }

    #[test]
    fn test_truncated_file_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("short.bin");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&10u32.to_le_bytes());
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        std::fs::write(&path, bytes).unwrap();

        assert!(FlatFileCorpus::open(&path).is_err());
    }

    fn write_header(path: &Path, num_vectors: u32, dimension: u32) {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&num_vectors.to_le_bytes());
        bytes.extend_from_slice(&dimension.to_le_bytes());
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_corrupt_header_is_error_not_panic() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("corrupt.bin");

        // Past the doc id range.
        write_header(&path, u32::MAX, 1);
        assert!(matches!(
            FlatFileCorpus::open(&path),
            Err(GraphliftError::Internal(_))
        ));

        // Byte length overflows usize.
        write_header(&path, i32::MAX as u32, u32::MAX);
        assert!(matches!(
            FlatFileCorpus::open(&path),
            Err(GraphliftError::Internal(_))
        ));
    }
}
