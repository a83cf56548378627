//! Moves vector and doc-id bytes to and from the staging container.
//!
//! Uploads of large blobs are split into fixed-size parts, each read from its
//! own [`VectorCursorStream`] on the blocking pool and sent through a single
//! multipart upload. Downloads fetch fixed-size ranges concurrently and write
//! them to the sink in index order once every range has arrived.

pub mod artifact;
pub mod progress;

use std::io::{self, Read};
use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use object_store::{MultipartUpload, PutPayload};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::config::TransferConfig;
use crate::corpus::VectorCursorStream;
use crate::error::{GraphliftError, Result};
use crate::storage::BlobStore;

pub use artifact::{StagingArtifact, StagingKeys};
pub use progress::{LoggingListener, NoopListener, TransferListener};

/// One contiguous byte range of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSpec {
    pub index: usize,
    pub offset: u64,
    pub length: u64,
}

/// Sizing for chunked transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    pub part_size: usize,
    pub chunk_size: usize,
    pub concurrency: usize,
}

impl TransferOptions {
    pub fn from_config(config: &TransferConfig) -> Self {
        let concurrency = if config.concurrency == 0 {
            default_concurrency()
        } else {
            config.concurrency
        };
        Self {
            part_size: config.part_size_bytes.max(1),
            chunk_size: config.chunk_size_bytes.max(1),
            concurrency,
        }
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::from_config(&TransferConfig::default())
    }
}

/// One and a half workers per available core.
fn default_concurrency() -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    (cores * 3).div_ceil(2).max(1)
}

/// Split `total_length` into `ceil(total / part_size)` parts; the last part
/// carries the remainder.
pub fn plan_parts(total_length: u64, part_size: usize) -> Vec<PartSpec> {
    let part_size = part_size.max(1) as u64;
    let count = total_length.div_ceil(part_size);
    (0..count)
        .map(|i| {
            let offset = i * part_size;
            PartSpec {
                index: i as usize,
                offset,
                length: part_size.min(total_length - offset),
            }
        })
        .collect()
}

/// Byte ranges for a ranged download of `size` bytes.
pub fn plan_chunks(size: usize, chunk_size: usize) -> Vec<Range<usize>> {
    let chunk_size = chunk_size.max(1);
    (0..size.div_ceil(chunk_size))
        .map(|i| {
            let start = i * chunk_size;
            start..(start + chunk_size).min(size)
        })
        .collect()
}

/// Write downloaded chunks to `sink` in ascending index order.
///
/// `chunks` may arrive in any order; every index in `0..count` must be
/// present exactly once, otherwise nothing is written.
pub async fn write_chunks_in_order<W>(
    key: &str,
    chunks: Vec<(usize, Bytes)>,
    count: usize,
    sink: &mut W,
) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut slots: Vec<Option<Bytes>> = vec![None; count];
    for (index, data) in chunks {
        let Some(slot) = slots.get_mut(index) else {
            return Err(GraphliftError::PartialTransfer {
                key: key.to_string(),
                chunk: index,
                reason: format!("chunk index out of range (expected {count})"),
            });
        };
        if slot.replace(data).is_some() {
            return Err(GraphliftError::PartialTransfer {
                key: key.to_string(),
                chunk: index,
                reason: "chunk received twice".to_string(),
            });
        }
    }
    if let Some(missing) = slots.iter().position(Option::is_none) {
        return Err(GraphliftError::PartialTransfer {
            key: key.to_string(),
            chunk: missing,
            reason: "chunk never arrived".to_string(),
        });
    }

    let mut written = 0u64;
    for data in slots.into_iter().flatten() {
        sink.write_all(&data).await?;
        written += data.len() as u64;
    }
    sink.flush().await?;
    Ok(written)
}

/// Chunked, parallel transfers against one [`BlobStore`].
#[derive(Clone, Debug)]
pub struct BlobStagingClient {
    store: BlobStore,
    options: TransferOptions,
}

impl BlobStagingClient {
    pub fn new(store: BlobStore, options: TransferOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &BlobStore {
        &self.store
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// A client whose part size is a whole multiple of `unit` bytes, so every
    /// part boundary falls between two records.
    pub fn aligned_to(&self, unit: usize) -> Self {
        let unit = unit.max(1);
        let mut options = self.options;
        options.part_size = (options.part_size / unit).max(1) * unit;
        Self {
            store: self.store.clone(),
            options,
        }
    }

    /// Upload `total_length` bytes produced by `factory` to `key`.
    ///
    /// With a multipart-capable store, `factory` is called once per part with
    /// that part's range and the parts are sent concurrently; otherwise it is
    /// called once for the whole range. The object only becomes visible once
    /// every part is acknowledged. Fails with `AlreadyExists` if `key` is
    /// already present.
    #[instrument(skip(self, factory, listener), fields(container = %self.store.container()))]
    pub async fn upload<F>(
        &self,
        key: &str,
        total_length: u64,
        factory: F,
        listener: &dyn TransferListener,
    ) -> Result<u64>
    where
        F: Fn(PartSpec) -> Result<VectorCursorStream> + Send + Sync + 'static,
    {
        self.ensure_absent(key).await?;
        listener.on_started(key, total_length);

        let factory = Arc::new(factory);
        let sent = if self.store.supports_multipart() && total_length > 0 {
            self.upload_multipart(key, total_length, factory, listener)
                .await?
        } else {
            let whole = PartSpec {
                index: 0,
                offset: 0,
                length: total_length,
            };
            let data = read_part(factory, key.to_string(), whole).await?;
            self.put_whole(key, data).await?
        };

        crate::metrics::BYTES_TRANSFERRED_TOTAL
            .with_label_values(&["upload"])
            .inc_by(sent);
        listener.on_complete(key, sent);
        Ok(sent)
    }

    /// Upload a small, already materialized blob in one request.
    #[instrument(skip(self, data, listener), fields(bytes = data.len()))]
    pub async fn upload_bytes(
        &self,
        key: &str,
        data: Bytes,
        listener: &dyn TransferListener,
    ) -> Result<u64> {
        self.ensure_absent(key).await?;
        listener.on_started(key, data.len() as u64);
        let sent = self.put_whole(key, data).await?;
        crate::metrics::BYTES_TRANSFERRED_TOTAL
            .with_label_values(&["upload"])
            .inc_by(sent);
        listener.on_complete(key, sent);
        Ok(sent)
    }

    /// Download `key` into `sink`, returning the number of bytes written.
    ///
    /// Chunks are fetched concurrently and buffered until all have arrived;
    /// the sink is untouched if any chunk fails.
    #[instrument(skip(self, sink, listener), fields(container = %self.store.container()))]
    pub async fn download<W>(
        &self,
        key: &str,
        sink: &mut W,
        listener: &dyn TransferListener,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let size = self.store.head(key).await?.size;
        let chunks = plan_chunks(size, self.options.chunk_size);
        let count = chunks.len();
        listener.on_started(key, size as u64);

        let mut fetches = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, range)| {
                let store = self.store.clone();
                async move {
                    let expected = range.len();
                    let data = store.get_range(key, range).await.map_err(|e| {
                        GraphliftError::PartialTransfer {
                            key: key.to_string(),
                            chunk: index,
                            reason: e.to_string(),
                        }
                    })?;
                    if data.len() != expected {
                        return Err(GraphliftError::PartialTransfer {
                            key: key.to_string(),
                            chunk: index,
                            reason: format!("short chunk: {} of {expected} bytes", data.len()),
                        });
                    }
                    Ok((index, data))
                }
            })
            .buffer_unordered(self.options.concurrency.max(1));

        let mut received = Vec::with_capacity(count);
        let mut transferred = 0u64;
        while let Some(chunk) = fetches.next().await {
            let (index, data) = chunk?;
            transferred += data.len() as u64;
            listener.on_progress(key, transferred, size as u64);
            received.push((index, data));
        }

        let written = write_chunks_in_order(key, received, count, sink).await?;
        crate::metrics::BYTES_TRANSFERRED_TOTAL
            .with_label_values(&["download"])
            .inc_by(written);
        listener.on_complete(key, written);
        debug!(key, chunks = count, bytes = written, "downloaded object");
        Ok(written)
    }

    async fn ensure_absent(&self, key: &str) -> Result<()> {
        let exists = self
            .store
            .exists(key)
            .await
            .map_err(|e| GraphliftError::transfer(key, e))?;
        if exists {
            return Err(GraphliftError::AlreadyExists {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    async fn put_whole(&self, key: &str, data: Bytes) -> Result<u64> {
        let len = data.len() as u64;
        let path = BlobStore::path(key)?;
        self.store
            .inner()
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|e| GraphliftError::transfer(key, e))?;
        Ok(len)
    }

    async fn upload_multipart<F>(
        &self,
        key: &str,
        total_length: u64,
        factory: Arc<F>,
        listener: &dyn TransferListener,
    ) -> Result<u64>
    where
        F: Fn(PartSpec) -> Result<VectorCursorStream> + Send + Sync + 'static,
    {
        let path = BlobStore::path(key)?;
        let parts = plan_parts(total_length, self.options.part_size);
        let mut upload = self
            .store
            .inner()
            .put_multipart(&path)
            .await
            .map_err(|e| GraphliftError::transfer(key, e))?;

        debug!(key, parts = parts.len(), total_length, "starting multipart upload");

        let result = self
            .send_parts(key, total_length, parts, factory, upload.as_mut(), listener)
            .await;
        let sent = match result {
            Ok(sent) => sent,
            Err(e) => {
                abort_upload(key, upload.as_mut()).await;
                return Err(e);
            }
        };

        if let Err(e) = upload.complete().await {
            abort_upload(key, upload.as_mut()).await;
            return Err(GraphliftError::transfer(key, e));
        }
        Ok(sent)
    }

    /// Read parts in index order (reads overlap on the blocking pool) and
    /// hand each to the multipart upload as soon as it is ready, keeping at
    /// most `concurrency` part uploads in flight.
    async fn send_parts<F>(
        &self,
        key: &str,
        total_length: u64,
        parts: Vec<PartSpec>,
        factory: Arc<F>,
        upload: &mut dyn MultipartUpload,
        listener: &dyn TransferListener,
    ) -> Result<u64>
    where
        F: Fn(PartSpec) -> Result<VectorCursorStream> + Send + Sync + 'static,
    {
        let concurrency = self.options.concurrency.max(1);
        let mut reads = stream::iter(parts)
            .map(|spec| {
                let factory = Arc::clone(&factory);
                let key = key.to_string();
                async move { read_part(factory, key, spec).await.map(|data| (spec, data)) }
            })
            .buffered(concurrency);

        // Dropping the set aborts any part still in flight.
        let mut in_flight = JoinSet::new();
        let mut sent = 0u64;

        while let Some(read) = reads.next().await {
            let (spec, data) = read?;
            let pending = upload.put_part(PutPayload::from(data));
            in_flight.spawn(async move { pending.await.map(|()| spec) });

            while in_flight.len() >= concurrency {
                sent += join_part(key, &mut in_flight).await?;
                listener.on_progress(key, sent, total_length);
            }
        }
        while !in_flight.is_empty() {
            sent += join_part(key, &mut in_flight).await?;
            listener.on_progress(key, sent, total_length);
        }
        Ok(sent)
    }
}

/// Wait for the next part upload and return its length.
async fn join_part(
    key: &str,
    in_flight: &mut JoinSet<object_store::Result<PartSpec>>,
) -> Result<u64> {
    match in_flight.join_next().await {
        Some(Ok(Ok(spec))) => {
            debug!(key, part = spec.index, bytes = spec.length, "part acknowledged");
            Ok(spec.length)
        }
        Some(Ok(Err(e))) => Err(GraphliftError::transfer(key, e)),
        Some(Err(e)) => Err(GraphliftError::transfer(key, e)),
        None => Ok(0),
    }
}

async fn abort_upload(key: &str, upload: &mut dyn MultipartUpload) {
    if let Err(e) = upload.abort().await {
        warn!(key, error = %e, "failed to abort multipart upload");
    }
}

/// Materialize one part on the blocking pool.
async fn read_part<F>(factory: Arc<F>, key: String, spec: PartSpec) -> Result<Bytes>
where
    F: Fn(PartSpec) -> Result<VectorCursorStream> + Send + Sync + 'static,
{
    tokio::task::spawn_blocking(move || {
        let stream = (*factory)(spec)?;
        let mut data = Vec::with_capacity(spec.length as usize);
        stream
            .take(spec.length)
            .read_to_end(&mut data)
            .map_err(|e| GraphliftError::transfer(key.as_str(), e))?;
        if data.len() as u64 != spec.length {
            return Err(GraphliftError::transfer(
                key.as_str(),
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "part {} produced {} of {} bytes",
                        spec.index,
                        data.len(),
                        spec.length
                    ),
                ),
            ));
        }
        Ok(Bytes::from(data))
    })
    .await
    .map_err(|e| GraphliftError::Internal(format!("part reader failed: {e}")))?
}
