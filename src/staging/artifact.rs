use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub const VECTOR_BLOB_EXTENSION: &str = ".knnvec";
pub const DOC_ID_BLOB_EXTENSION: &str = ".knndid";

/// Object keys for one build attempt.
///
/// The fresh ULID keeps concurrent attempts (other shards, retries of the
/// same segment) from ever colliding on a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingKeys {
    pub blob_name: String,
    pub vector_key: String,
    pub doc_id_key: String,
}

impl StagingKeys {
    pub fn generate(prefix: &str, field: &str, build_unit: &str) -> Self {
        let blob_name = format!("{prefix}{}_{field}_{build_unit}", Ulid::new());
        Self {
            vector_key: format!("{blob_name}{VECTOR_BLOB_EXTENSION}"),
            doc_id_key: format!("{blob_name}{DOC_ID_BLOB_EXTENSION}"),
            blob_name,
        }
    }
}

/// Vectors and doc ids committed to the staging container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingArtifact {
    pub container: String,
    pub vector_key: String,
    pub doc_id_key: String,
    pub vector_bytes: u64,
    pub doc_id_bytes: u64,
    pub staging_duration: Duration,
    pub staged_at: DateTime<Utc>,
}
