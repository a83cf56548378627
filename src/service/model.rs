//! Wire types for the build service.

use serde::{Deserialize, Serialize};

use crate::staging::StagingArtifact;
use crate::types::{FieldDescriptor, VectorDataType};

/// Everything the service needs to build one graph.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildJob {
    pub container: String,
    pub vector_key: String,
    pub doc_id_key: String,
    pub dimension: usize,
    pub vector_count: usize,
    pub space_type: String,
    pub data_type: VectorDataType,
    pub engine: String,
    pub parameters: serde_json::Map<String, serde_json::Value>,
    pub tenant_id: Option<String>,
}

impl BuildJob {
    pub fn from_artifact(
        artifact: &StagingArtifact,
        field: &FieldDescriptor,
        vector_count: usize,
        tenant_id: Option<String>,
    ) -> Self {
        Self {
            container: artifact.container.clone(),
            vector_key: artifact.vector_key.clone(),
            doc_id_key: artifact.doc_id_key.clone(),
            dimension: field.dimension,
            vector_count,
            space_type: field.space_type.to_string(),
            data_type: VectorDataType::Float32,
            engine: field.engine.clone(),
            parameters: field.parameters.clone(),
            tenant_id,
        }
    }
}

/// Body of `POST /create_index`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateIndexRequest {
    pub bucket_name: String,
    pub object_location: String,
    pub doc_id_location: String,
    pub dimensions: usize,
    pub number_of_vectors: usize,
    pub space_type: String,
    pub data_type: String,
    pub engine: String,
    pub index_parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tenant_id: Option<String>,
}

impl From<&BuildJob> for CreateIndexRequest {
    fn from(job: &BuildJob) -> Self {
        Self {
            bucket_name: job.container.clone(),
            object_location: job.vector_key.clone(),
            doc_id_location: job.doc_id_key.clone(),
            dimensions: job.dimension,
            number_of_vectors: job.vector_count,
            space_type: job.space_type.clone(),
            data_type: job.data_type.to_string(),
            engine: job.engine.clone(),
            index_parameters: job.parameters.clone(),
            tenant_id: job.tenant_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIndexResponse {
    #[serde(alias = "jobId", alias = "indexCreationRequestId")]
    pub job_id: String,
}

/// Lifecycle of a remote job as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildJobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    /// A status this client does not know; treated as still running.
    Unknown(String),
}

impl BuildJobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildJobStatus::Completed | BuildJobStatus::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            BuildJobStatus::Pending => "pending",
            BuildJobStatus::InProgress => "in_progress",
            BuildJobStatus::Completed => "completed",
            BuildJobStatus::Failed => "failed",
            BuildJobStatus::Unknown(s) => s,
        }
    }
}

impl From<&str> for BuildJobStatus {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "pending" => BuildJobStatus::Pending,
            "in_progress" | "running" => BuildJobStatus::InProgress,
            "completed" => BuildJobStatus::Completed,
            "failed" => BuildJobStatus::Failed,
            _ => BuildJobStatus::Unknown(s.to_string()),
        }
    }
}

impl std::fmt::Display for BuildJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BuildJobStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BuildJobStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(BuildJobStatus::from(s.as_str()))
    }
}

/// Where the finished graph was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    #[serde(rename = "bucketName")]
    pub bucket_name: String,
    #[serde(rename = "graphFileLocation")]
    pub graph_file_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<serde_json::Value>,
}

/// Body of `GET /job/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub status: BuildJobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BuildResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusResponse {
    pub fn new(status: BuildJobStatus) -> Self {
        Self {
            status,
            result: None,
            error: None,
        }
    }

    pub fn completed(bucket_name: impl Into<String>, graph_file_location: impl Into<String>) -> Self {
        Self {
            status: BuildJobStatus::Completed,
            result: Some(BuildResult {
                bucket_name: bucket_name.into(),
                graph_file_location: graph_file_location.into(),
                stats: None,
            }),
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: BuildJobStatus::Failed,
            result: None,
            error: Some(reason.into()),
        }
    }
}
