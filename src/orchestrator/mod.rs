//! Remote build pipeline with local fallback.
//!
//! [`RemoteBuildOrchestrator::execute`] stages a corpus, submits a build job,
//! polls it, and downloads the finished graph into the caller's sink. Any
//! failure along the way is logged with the stage it happened in and the
//! local builder takes over with the same request and sink. Only a local
//! build failure reaches the caller.

pub mod eligibility;
pub mod poll;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWrite;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::corpus::{encode_doc_ids, CorpusHandle, VectorCursorStream};
use crate::error::{GraphliftError, Result};
use crate::local::LocalBuilder;
use crate::metrics;
use crate::service::{BuildJob, BuildResult, BuildService};
use crate::staging::{BlobStagingClient, LoggingListener, PartSpec, StagingArtifact, StagingKeys};
use crate::types::FieldDescriptor;

pub use eligibility::{check_eligibility, Eligibility, RemoteBuildSettings};
pub use poll::await_completion;

/// One graph to build: a field of one build unit and the corpus behind it.
#[derive(Clone)]
pub struct BuildRequest {
    pub field: FieldDescriptor,
    /// Segment or shard identifier, folded into staged keys.
    pub build_unit: String,
    pub corpus: CorpusHandle,
    pub total_live_docs: usize,
}

impl BuildRequest {
    pub fn new(field: FieldDescriptor, build_unit: impl Into<String>, corpus: CorpusHandle) -> Self {
        let total_live_docs = corpus.live_count();
        Self {
            field,
            build_unit: build_unit.into(),
            corpus,
            total_live_docs,
        }
    }
}

impl std::fmt::Debug for BuildRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildRequest")
            .field("field", &self.field.name)
            .field("build_unit", &self.build_unit)
            .field("total_live_docs", &self.total_live_docs)
            .finish()
    }
}

/// Where a build attempt is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStage {
    Ineligible,
    Staging,
    Submitted,
    Polling,
    Downloading,
    Installed,
    Fallback,
}

impl BuildStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStage::Ineligible => "ineligible",
            BuildStage::Staging => "staging",
            BuildStage::Submitted => "submitted",
            BuildStage::Polling => "polling",
            BuildStage::Downloading => "downloading",
            BuildStage::Installed => "installed",
            BuildStage::Fallback => "fallback",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStage::Ineligible | BuildStage::Installed | BuildStage::Fallback
        )
    }
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTimings {
    pub staging: Duration,
    pub submit: Duration,
    pub polling: Duration,
    pub download: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.staging + self.submit + self.polling + self.download
    }
}

/// Summary of a successful remote build.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteBuildReport {
    pub job_id: String,
    pub graph_key: String,
    pub bytes_written: u64,
    pub artifact: StagingArtifact,
    pub timings: StageTimings,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Remote(RemoteBuildReport),
    /// Built by the local builder. `fallback_from` is the stage the remote
    /// attempt failed in, or `None` when the corpus was ineligible.
    Local { fallback_from: Option<BuildStage> },
}

impl BuildOutcome {
    pub fn is_remote(&self) -> bool {
        matches!(self, BuildOutcome::Remote(_))
    }
}

/// Per-attempt bookkeeping shared between the pipeline and its cleanup.
#[derive(Debug)]
struct Attempt {
    stage: BuildStage,
    uploaded: Vec<String>,
    timings: StageTimings,
}

impl Attempt {
    fn new() -> Self {
        Self {
            stage: BuildStage::Staging,
            uploaded: Vec::new(),
            timings: StageTimings::default(),
        }
    }

    fn enter(&mut self, stage: BuildStage) {
        debug!(from = %self.stage, to = %stage, "build stage transition");
        self.stage = stage;
    }
}

fn record_stage(stage: BuildStage, elapsed: Duration) {
    metrics::STAGE_DURATION
        .with_label_values(&[stage.as_str()])
        .observe(elapsed.as_secs_f64());
}

pub struct RemoteBuildOrchestrator {
    staging: BlobStagingClient,
    service: Arc<dyn BuildService>,
    local: Arc<dyn LocalBuilder>,
}

impl RemoteBuildOrchestrator {
    pub fn new(
        staging: BlobStagingClient,
        service: Arc<dyn BuildService>,
        local: Arc<dyn LocalBuilder>,
    ) -> Self {
        Self {
            staging,
            service,
            local,
        }
    }

    /// Build the graph for `request` into `sink`, remotely when eligible.
    ///
    /// Returns an error only when the local builder fails.
    #[instrument(
        skip(self, request, settings, sink),
        fields(field = %request.field.name, build_unit = %request.build_unit)
    )]
    pub async fn execute(
        &self,
        request: &BuildRequest,
        settings: &RemoteBuildSettings,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<BuildOutcome> {
        if let Eligibility::Ineligible(reason) = check_eligibility(request.corpus.as_ref(), settings) {
            info!(%reason, "building locally");
            metrics::REMOTE_BUILDS_TOTAL
                .with_label_values(&[BuildStage::Ineligible.as_str()])
                .inc();
            self.local.build_locally(request, &mut *sink).await?;
            return Ok(BuildOutcome::Local {
                fallback_from: None,
            });
        }

        let mut attempt = Attempt::new();
        let result = self.run_remote(request, settings, &mut *sink, &mut attempt).await;

        if settings.cleanup_staged_blobs {
            self.cleanup(&attempt.uploaded).await;
        }

        match result {
            Ok(report) => {
                attempt.enter(BuildStage::Installed);
                metrics::REMOTE_BUILDS_TOTAL
                    .with_label_values(&[BuildStage::Installed.as_str()])
                    .inc();
                info!(
                    job_id = %report.job_id,
                    bytes = report.bytes_written,
                    staging_ms = report.timings.staging.as_millis() as u64,
                    polling_ms = report.timings.polling.as_millis() as u64,
                    download_ms = report.timings.download.as_millis() as u64,
                    "remote build installed"
                );
                Ok(BuildOutcome::Remote(report))
            }
            Err(e) => {
                let failed_in = attempt.stage;
                if e.is_programming_error() {
                    error!(stage = %failed_in, error = %e, "remote build hit a streaming contract violation");
                }
                warn!(
                    stage = %failed_in,
                    kind = e.kind(),
                    error = %e,
                    "remote build failed, falling back to local build"
                );
                metrics::FALLBACKS_TOTAL
                    .with_label_values(&[failed_in.as_str(), e.kind()])
                    .inc();
                metrics::REMOTE_BUILDS_TOTAL
                    .with_label_values(&[BuildStage::Fallback.as_str()])
                    .inc();
                attempt.enter(BuildStage::Fallback);

                self.local.build_locally(request, &mut *sink).await?;
                Ok(BuildOutcome::Local {
                    fallback_from: Some(failed_in),
                })
            }
        }
    }

    async fn run_remote(
        &self,
        request: &BuildRequest,
        settings: &RemoteBuildSettings,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        attempt: &mut Attempt,
    ) -> Result<RemoteBuildReport> {
        let started = Instant::now();
        let artifact = self.stage(request, settings, &mut attempt.uploaded).await?;
        attempt.timings.staging = started.elapsed();
        record_stage(BuildStage::Staging, attempt.timings.staging);

        attempt.enter(BuildStage::Submitted);
        let started = Instant::now();
        let job = BuildJob::from_artifact(
            &artifact,
            &request.field,
            request.total_live_docs,
            settings.tenant_id.clone(),
        );
        let job_id = self.service.submit(&job).await?;
        attempt.timings.submit = started.elapsed();
        record_stage(BuildStage::Submitted, attempt.timings.submit);
        info!(%job_id, vector_key = %artifact.vector_key, "submitted remote build");

        attempt.enter(BuildStage::Polling);
        let started = Instant::now();
        let result = await_completion(self.service.as_ref(), &job_id, settings).await?;
        attempt.timings.polling = started.elapsed();
        record_stage(BuildStage::Polling, attempt.timings.polling);

        attempt.enter(BuildStage::Downloading);
        let started = Instant::now();
        let bytes_written = self.download(&result, sink).await?;
        attempt.timings.download = started.elapsed();
        record_stage(BuildStage::Downloading, attempt.timings.download);

        debug!(total_ms = attempt.timings.total().as_millis() as u64, "remote build timings");
        Ok(RemoteBuildReport {
            job_id,
            graph_key: result.graph_file_location,
            bytes_written,
            artifact,
            timings: attempt.timings.clone(),
        })
    }

    /// Upload the vector blob (partitioned) and the doc-id blob.
    /// Every key that was fully written is pushed onto `uploaded`.
    async fn stage(
        &self,
        request: &BuildRequest,
        settings: &RemoteBuildSettings,
        uploaded: &mut Vec<String>,
    ) -> Result<StagingArtifact> {
        let container = self.staging.store().container();
        if settings.container != container {
            return Err(GraphliftError::Config(format!(
                "staging container {} does not match store container {container}",
                settings.container
            )));
        }
        let live_count = request.corpus.live_count();
        if request.total_live_docs != live_count {
            return Err(GraphliftError::Internal(format!(
                "request claims {} live docs but corpus holds {live_count}",
                request.total_live_docs
            )));
        }

        let started_at = chrono::Utc::now();
        let started = Instant::now();
        let keys = StagingKeys::generate(&settings.key_prefix, &request.field.name, &request.build_unit);
        let listener = LoggingListener::new("stage", container);

        let corpus = Arc::clone(&request.corpus);
        let vector_bytes = self
            .staging
            .aligned_to(corpus.bytes_per_vector())
            .upload(
                &keys.vector_key,
                corpus.total_bytes(),
                move |part: PartSpec| {
                    VectorCursorStream::open(corpus.as_ref(), part.offset, Some(part.length))
                },
                &listener,
            )
            .await?;
        uploaded.push(keys.vector_key.clone());

        let corpus = Arc::clone(&request.corpus);
        let doc_ids = tokio::task::spawn_blocking(move || encode_doc_ids(corpus.as_ref()))
            .await
            .map_err(|e| GraphliftError::Internal(format!("doc id encoder failed: {e}")))??;
        let doc_id_bytes = self
            .staging
            .upload_bytes(&keys.doc_id_key, Bytes::from(doc_ids), &listener)
            .await?;
        uploaded.push(keys.doc_id_key.clone());

        Ok(StagingArtifact {
            container: container.to_string(),
            vector_key: keys.vector_key,
            doc_id_key: keys.doc_id_key,
            vector_bytes,
            doc_id_bytes,
            staging_duration: started.elapsed(),
            staged_at: started_at,
        })
    }

    async fn download(
        &self,
        result: &BuildResult,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        let container = self.staging.store().container();
        if !result.bucket_name.is_empty() && result.bucket_name != container {
            return Err(GraphliftError::Internal(format!(
                "graph written to container {} but staging store is {container}",
                result.bucket_name
            )));
        }
        let listener = LoggingListener::new("download", container);
        self.staging
            .download(&result.graph_file_location, sink, &listener)
            .await
    }

    /// Best-effort removal of staged blobs; failures are only logged.
    async fn cleanup(&self, keys: &[String]) {
        for key in keys {
            match self.staging.store().delete(key).await {
                Ok(()) | Err(GraphliftError::NotFound { .. }) => {}
                Err(e) => warn!(key = %key, error = %e, "failed to delete staged blob"),
            }
        }
    }
}
