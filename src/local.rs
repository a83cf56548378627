//! Seam to the in-process graph builder.

use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tracing::warn;

use crate::error::{GraphliftError, Result};
use crate::orchestrator::BuildRequest;

/// Builds a graph in-process and writes it to `sink`.
///
/// Invoked for ineligible corpora and as the fallback after any remote
/// failure, so it may run after staged bytes already reached the store.
/// A failed download only touches `sink` when writing to `sink` itself
/// fails partway through the graph; the bytes written before that error
/// stay in place. Implementations own resetting the sink if that matters to
/// them. Errors propagate to the caller unchanged.
#[async_trait]
pub trait LocalBuilder: Send + Sync {
    async fn build_locally(
        &self,
        request: &BuildRequest,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<()>;
}

/// Local builder for hosts without a native graph builder. Always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableLocalBuilder;

#[async_trait]
impl LocalBuilder for UnavailableLocalBuilder {
    async fn build_locally(
        &self,
        request: &BuildRequest,
        _sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<()> {
        warn!(field = %request.field.name, build_unit = %request.build_unit, "no local graph builder available");
        Err(GraphliftError::LocalBuild(format!(
            "no local builder for field {} in {}",
            request.field.name, request.build_unit
        )))
    }
}
