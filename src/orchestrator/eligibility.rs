use std::time::Duration;

use crate::config::RemoteBuildConfig;
use crate::corpus::VectorCorpus;
use crate::types::VectorDataType;

/// Snapshot of the remote-build settings for one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBuildSettings {
    pub enabled: bool,
    pub container: String,
    pub key_prefix: String,
    pub size_threshold_bytes: u64,
    pub min_live_vectors: usize,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub max_poll_errors: u32,
    pub cleanup_staged_blobs: bool,
    pub tenant_id: Option<String>,
}

impl From<&RemoteBuildConfig> for RemoteBuildSettings {
    fn from(config: &RemoteBuildConfig) -> Self {
        Self {
            enabled: config.enabled,
            container: config.container.clone(),
            key_prefix: config.key_prefix.clone(),
            size_threshold_bytes: config.size_threshold_bytes,
            min_live_vectors: config.min_live_vectors,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
            max_poll_errors: config.max_poll_errors,
            cleanup_staged_blobs: config.cleanup_staged_blobs,
            tenant_id: config.tenant_id.clone(),
        }
    }
}

impl Default for RemoteBuildSettings {
    fn default() -> Self {
        Self::from(&RemoteBuildConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible(String),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Decide whether `corpus` should be built remotely. Pure; touches neither
/// the store nor the service.
pub fn check_eligibility(corpus: &dyn VectorCorpus, settings: &RemoteBuildSettings) -> Eligibility {
    if !settings.enabled {
        return Eligibility::Ineligible("remote build disabled".to_string());
    }
    if settings.container.is_empty() {
        return Eligibility::Ineligible("no staging container configured".to_string());
    }
    if corpus.data_type() != VectorDataType::Float32 {
        return Eligibility::Ineligible(format!("{} vectors are built locally", corpus.data_type()));
    }
    let live = corpus.live_count();
    if live == 0 || live < settings.min_live_vectors {
        return Eligibility::Ineligible(format!(
            "{live} live vectors, need at least {}",
            settings.min_live_vectors.max(1)
        ));
    }
    let bytes = corpus.total_bytes();
    if bytes < settings.size_threshold_bytes {
        return Eligibility::Ineligible(format!(
            "{bytes} vector bytes below threshold of {}",
            settings.size_threshold_bytes
        ));
    }
    Eligibility::Eligible
}
