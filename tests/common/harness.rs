use std::sync::Arc;

use object_store::local::LocalFileSystem;
use tempfile::TempDir;

use graphlift::staging::{BlobStagingClient, TransferOptions};
use graphlift::storage::BlobStore;

pub const CONTAINER: &str = "knn-staging";

/// A staging store isolated to one test, in memory or on a temp directory.
pub struct TestHarness {
    pub store: BlobStore,
    pub prefix: String,
    _dir: Option<TempDir>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            store: BlobStore::in_memory(CONTAINER),
            prefix: format!("test-{}", ulid::Ulid::new()),
            _dir: None,
        }
    }

    /// Backed by `LocalFileSystem` under a temp dir that lives as long as the harness.
    pub fn on_disk() -> Self {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new_with_prefix(dir.path()).unwrap();
        Self {
            store: BlobStore::new(Arc::new(fs), CONTAINER, true),
            prefix: format!("test-{}", ulid::Ulid::new()),
            _dir: Some(dir),
        }
    }

    /// Same backend kind, but uploads go through a single `put`.
    pub fn single_stream() -> Self {
        Self {
            store: BlobStore::new(
                Arc::new(object_store::memory::InMemory::new()),
                CONTAINER,
                false,
            ),
            prefix: format!("test-{}", ulid::Ulid::new()),
            _dir: None,
        }
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}/{}", self.prefix, name)
    }

    pub fn staging(&self, part_size: usize, chunk_size: usize) -> BlobStagingClient {
        BlobStagingClient::new(
            self.store.clone(),
            TransferOptions {
                part_size,
                chunk_size,
                concurrency: 4,
            },
        )
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys = self.store.list_prefix(&self.prefix).await.unwrap();
        keys.sort();
        keys
    }
}
