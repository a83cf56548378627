use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use graphlift::corpus::{InMemoryCorpus, VectorCorpus, VectorCursor};
use graphlift::error::{GraphliftError, Result};
use graphlift::local::LocalBuilder;
use graphlift::orchestrator::BuildRequest;
use graphlift::service::{BuildJob, BuildJobStatus, BuildService, JobStatusResponse};
use graphlift::types::DocId;

/// Build service that replays a script and counts calls.
///
/// Once the status script runs dry every call reports `in_progress`.
pub struct ScriptedBuildService {
    submit_reply: Mutex<Option<Result<String>>>,
    statuses: Mutex<VecDeque<Result<JobStatusResponse>>>,
    pub submitted: Mutex<Vec<BuildJob>>,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl ScriptedBuildService {
    pub fn accepting(job_id: &str) -> Self {
        Self {
            submit_reply: Mutex::new(Some(Ok(job_id.to_string()))),
            statuses: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(status: u16, body: &str) -> Self {
        let service = Self::accepting("unused");
        *service.submit_reply.lock().unwrap() = Some(Err(GraphliftError::Service {
            status,
            body: body.to_string(),
        }));
        service
    }

    pub fn with_statuses(self, statuses: Vec<Result<JobStatusResponse>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    /// `pending`, `in_progress`, then `completed` with the graph at `graph_key`.
    pub fn completing(self, container: &str, graph_key: &str) -> Self {
        self.with_statuses(vec![
            Ok(JobStatusResponse::new(BuildJobStatus::Pending)),
            Ok(JobStatusResponse::new(BuildJobStatus::InProgress)),
            Ok(JobStatusResponse::completed(container, graph_key)),
        ])
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildService for ScriptedBuildService {
    async fn submit(&self, job: &BuildJob) -> Result<String> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(job.clone());
        match self.submit_reply.lock().unwrap().take() {
            Some(reply) => reply,
            None => Err(GraphliftError::Internal("submitted twice".to_string())),
        }
    }

    async fn get_status(&self, _job_id: &str) -> Result<JobStatusResponse> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(JobStatusResponse::new(BuildJobStatus::InProgress)))
    }
}

/// What the local builder was asked to build.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCall {
    pub field: String,
    pub build_unit: String,
    pub total_live_docs: usize,
}

/// Local builder that records its calls and writes a fixed marker.
pub struct SpyLocalBuilder {
    pub calls: Mutex<Vec<LocalCall>>,
    output: Vec<u8>,
}

impl SpyLocalBuilder {
    pub const OUTPUT: &'static [u8] = b"local-graph";

    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            output: Self::OUTPUT.to_vec(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LocalBuilder for SpyLocalBuilder {
    async fn build_locally(
        &self,
        request: &BuildRequest,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<()> {
        self.calls.lock().unwrap().push(LocalCall {
            field: request.field.name.clone(),
            build_unit: request.build_unit.clone(),
            total_live_docs: request.total_live_docs,
        });
        sink.write_all(&self.output).await?;
        Ok(())
    }
}

/// Corpus whose cursors fail to materialize vectors from `fail_at` on.
pub struct FailingCorpus {
    inner: InMemoryCorpus,
    fail_at: usize,
}

impl FailingCorpus {
    pub fn new(inner: InMemoryCorpus, fail_at: usize) -> Self {
        Self { inner, fail_at }
    }
}

impl VectorCorpus for FailingCorpus {
    fn cursor(&self) -> io::Result<Box<dyn VectorCursor>> {
        Ok(Box::new(FailingCursor {
            inner: self.inner.cursor()?,
            position: 0,
            fail_at: self.fail_at,
        }))
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn live_count(&self) -> usize {
        self.inner.live_count()
    }
}

struct FailingCursor {
    inner: Box<dyn VectorCursor>,
    position: usize,
    fail_at: usize,
}

impl VectorCursor for FailingCursor {
    fn next_doc(&mut self) -> io::Result<Option<DocId>> {
        let doc = self.inner.next_doc()?;
        if doc.is_some() {
            self.position += 1;
        }
        Ok(doc)
    }

    fn vector(&mut self) -> io::Result<&[f32]> {
        if self.position > self.fail_at {
            return Err(io::Error::new(io::ErrorKind::Other, "disk went away"));
        }
        self.inner.vector()
    }
}
