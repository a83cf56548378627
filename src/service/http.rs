use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use crate::config::BuildServiceConfig;
use crate::error::{GraphliftError, Result};

use super::model::{BuildJob, CreateIndexRequest, CreateIndexResponse, JobStatusResponse};
use super::BuildService;

/// HTTP client for the build service.
#[derive(Debug, Clone)]
pub struct HttpBuildServiceClient {
    base_url: Url,
    http: reqwest::Client,
    credentials: Option<(String, Option<String>)>,
}

impl HttpBuildServiceClient {
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self> {
        // A trailing slash makes `join` append instead of replacing the last segment.
        let normalized = format!("{}/", endpoint.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| GraphliftError::Config(format!("invalid build service endpoint {endpoint}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(8)
            .build()?;
        Ok(Self {
            base_url,
            http,
            credentials: None,
        })
    }

    pub fn from_config(config: &BuildServiceConfig) -> Result<Self> {
        let client = Self::new(
            &config.endpoint,
            Duration::from_millis(config.request_timeout_ms),
        )?;
        Ok(match &config.username {
            Some(username) => client.with_basic_auth(username.clone(), config.password.clone()),
            None => client,
        })
    }

    pub fn with_basic_auth(mut self, username: String, password: Option<String>) -> Self {
        self.credentials = Some((username, password));
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| GraphliftError::Internal(format!("bad build service path {path}: {e}")))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, password.as_ref()),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GraphliftError::Service {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl BuildService for HttpBuildServiceClient {
    #[instrument(skip(self, job), fields(vector_key = %job.vector_key))]
    async fn submit(&self, job: &BuildJob) -> Result<String> {
        let body = CreateIndexRequest::from(job);
        let response = self
            .authorize(self.http.post(self.url("create_index")?))
            .json(&body)
            .send()
            .await?;
        let created: CreateIndexResponse = Self::check(response).await?.json().await?;
        debug!(job_id = %created.job_id, "build job submitted");
        Ok(created.job_id)
    }

    #[instrument(skip(self))]
    async fn get_status(&self, job_id: &str) -> Result<JobStatusResponse> {
        let mut url = self.url("job/")?;
        url.path_segments_mut()
            .map_err(|()| GraphliftError::Internal("build service endpoint cannot be a base".into()))?
            .pop_if_empty()
            .push(job_id);
        let response = self.authorize(self.http.get(url)).send().await?;
        let status: JobStatusResponse = Self::check(response).await?.json().await?;
        debug!(status = %status.status, "job status");
        Ok(status)
    }
}
