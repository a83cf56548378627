//! Client side of the remote build service.

pub mod http;
pub mod model;

use async_trait::async_trait;

use crate::error::Result;

pub use http::HttpBuildServiceClient;
pub use model::{
    BuildJob, BuildJobStatus, BuildResult, CreateIndexRequest, CreateIndexResponse,
    JobStatusResponse,
};

/// A service that builds graphs from staged vectors.
///
/// Each call is a single attempt; retry and polling policy belong to the
/// caller.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Submit a job and return the identifier the service assigned to it.
    async fn submit(&self, job: &BuildJob) -> Result<String>;

    /// Current status of a previously submitted job.
    async fn get_status(&self, job_id: &str) -> Result<JobStatusResponse>;
}
