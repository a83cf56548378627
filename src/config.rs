//! Configuration for graphlift.
//!
//! Values are resolved in order: built-in defaults, then an optional TOML
//! file, then `GRAPHLIFT_*` environment variables. The orchestrator never
//! reads this directly; callers turn it into a
//! [`RemoteBuildSettings`](crate::orchestrator::RemoteBuildSettings) snapshot
//! per build.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GraphliftError, Result};
use crate::orchestrator::RemoteBuildSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub build_service: BuildServiceConfig,
    pub remote_build: RemoteBuildConfig,
    pub transfer: TransferConfig,
    pub logging: LoggingConfig,
}

/// Where staged vectors and built graphs live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// One of `s3`, `gcs`, `azure`, `local`, `memory`.
    pub backend: String,
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack).
    pub endpoint: Option<String>,
    /// Root directory for the `local` backend.
    pub local_path: Option<String>,
    pub allow_http: bool,
    /// Whether the backend should be driven through multipart uploads.
    pub multipart: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "s3".to_string(),
            bucket: String::new(),
            region: None,
            endpoint: None,
            local_path: None,
            allow_http: false,
            multipart: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildServiceConfig {
    pub endpoint: String,
    pub request_timeout_ms: u64,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for BuildServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:1025".to_string(),
            request_timeout_ms: 30_000,
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteBuildConfig {
    pub enabled: bool,
    /// Staging container (bucket) name. Empty disables remote builds.
    pub container: String,
    /// Prefix prepended to every staged key.
    pub key_prefix: String,
    /// Minimum vector blob size worth shipping to the service.
    pub size_threshold_bytes: u64,
    pub min_live_vectors: usize,
    pub poll_interval_ms: u64,
    pub poll_timeout_secs: u64,
    /// Consecutive status-call failures tolerated before giving up.
    pub max_poll_errors: u32,
    pub cleanup_staged_blobs: bool,
    pub tenant_id: Option<String>,
}

impl Default for RemoteBuildConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            container: String::new(),
            key_prefix: String::new(),
            size_threshold_bytes: 50 * 1024 * 1024,
            min_live_vectors: 0,
            poll_interval_ms: 5_000,
            poll_timeout_secs: 60 * 60,
            max_poll_errors: 3,
            cleanup_staged_blobs: true,
            tenant_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub part_size_bytes: usize,
    pub chunk_size_bytes: usize,
    /// Maximum in-flight parts or chunks. `0` sizes it from available parallelism.
    pub concurrency: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            part_size_bytes: 16 * 1024 * 1024,
            chunk_size_bytes: 10 * 1024 * 1024,
            concurrency: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `pretty`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply environment
    /// overrides. A missing file is an error; `None` means defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                if !Path::new(p).exists() {
                    return Err(GraphliftError::Config(format!("config file not found: {p}")));
                }
                let contents = std::fs::read_to_string(p)?;
                toml::from_str(&contents)?
            }
            None => Config::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Snapshot handed to the orchestrator for one build. An empty
    /// `remote_build.container` defaults to the storage bucket.
    pub fn remote_build_settings(&self) -> RemoteBuildSettings {
        let mut settings = RemoteBuildSettings::from(&self.remote_build);
        if settings.container.is_empty() {
            settings.container = self.storage.bucket.clone();
        }
        settings
    }

    fn apply_env_overrides(&mut self) {
        // Storage
        env_string("GRAPHLIFT_STORAGE_BACKEND", &mut self.storage.backend);
        env_string("GRAPHLIFT_STORAGE_BUCKET", &mut self.storage.bucket);
        env_optional("GRAPHLIFT_STORAGE_REGION", &mut self.storage.region);
        env_optional("GRAPHLIFT_STORAGE_ENDPOINT", &mut self.storage.endpoint);
        env_optional("GRAPHLIFT_STORAGE_LOCAL_PATH", &mut self.storage.local_path);
        env_bool("GRAPHLIFT_STORAGE_ALLOW_HTTP", &mut self.storage.allow_http);
        env_bool("GRAPHLIFT_STORAGE_MULTIPART", &mut self.storage.multipart);

        // Build service
        env_string("GRAPHLIFT_BUILD_SERVICE_ENDPOINT", &mut self.build_service.endpoint);
        env_parse(
            "GRAPHLIFT_BUILD_SERVICE_REQUEST_TIMEOUT_MS",
            &mut self.build_service.request_timeout_ms,
        );
        env_optional("GRAPHLIFT_BUILD_SERVICE_USERNAME", &mut self.build_service.username);
        env_optional("GRAPHLIFT_BUILD_SERVICE_PASSWORD", &mut self.build_service.password);

        // Remote build
        env_bool("GRAPHLIFT_REMOTE_BUILD_ENABLED", &mut self.remote_build.enabled);
        env_string("GRAPHLIFT_REMOTE_BUILD_CONTAINER", &mut self.remote_build.container);
        env_string("GRAPHLIFT_REMOTE_BUILD_KEY_PREFIX", &mut self.remote_build.key_prefix);
        env_parse(
            "GRAPHLIFT_REMOTE_BUILD_SIZE_THRESHOLD_BYTES",
            &mut self.remote_build.size_threshold_bytes,
        );
        env_parse(
            "GRAPHLIFT_REMOTE_BUILD_MIN_LIVE_VECTORS",
            &mut self.remote_build.min_live_vectors,
        );
        env_parse(
            "GRAPHLIFT_REMOTE_BUILD_POLL_INTERVAL_MS",
            &mut self.remote_build.poll_interval_ms,
        );
        env_parse(
            "GRAPHLIFT_REMOTE_BUILD_POLL_TIMEOUT_SECS",
            &mut self.remote_build.poll_timeout_secs,
        );
        env_parse(
            "GRAPHLIFT_REMOTE_BUILD_MAX_POLL_ERRORS",
            &mut self.remote_build.max_poll_errors,
        );
        env_bool(
            "GRAPHLIFT_REMOTE_BUILD_CLEANUP_STAGED_BLOBS",
            &mut self.remote_build.cleanup_staged_blobs,
        );
        env_optional("GRAPHLIFT_REMOTE_BUILD_TENANT_ID", &mut self.remote_build.tenant_id);

        // Transfer
        env_parse("GRAPHLIFT_TRANSFER_PART_SIZE_BYTES", &mut self.transfer.part_size_bytes);
        env_parse("GRAPHLIFT_TRANSFER_CHUNK_SIZE_BYTES", &mut self.transfer.chunk_size_bytes);
        env_parse("GRAPHLIFT_TRANSFER_CONCURRENCY", &mut self.transfer.concurrency);

        // Logging
        env_string("GRAPHLIFT_LOG_LEVEL", &mut self.logging.level);
        env_string("GRAPHLIFT_LOG_FORMAT", &mut self.logging.format);
    }

    /// Reject values that would make transfers or polling spin.
    pub fn validate(&self) -> Result<()> {
        if self.transfer.part_size_bytes == 0 {
            return Err(GraphliftError::Config("transfer.part_size_bytes must be > 0".into()));
        }
        if self.transfer.chunk_size_bytes == 0 {
            return Err(GraphliftError::Config("transfer.chunk_size_bytes must be > 0".into()));
        }
        if self.remote_build.poll_interval_ms == 0 {
            return Err(GraphliftError::Config(
                "remote_build.poll_interval_ms must be > 0".into(),
            ));
        }
        match self.storage.backend.as_str() {
            "s3" | "gcs" | "azure" | "local" | "memory" => {}
            other => {
                return Err(GraphliftError::Config(format!(
                    "unknown storage backend: {other}"
                )))
            }
        }
        if self.build_service.password.is_some() && self.build_service.username.is_none() {
            return Err(GraphliftError::Config(
                "build_service.username must be set if password is set".into(),
            ));
        }
        Ok(())
    }
}

fn env_string(key: &str, target: &mut String) {
    if let Ok(val) = std::env::var(key) {
        *target = val;
    }
}

fn env_optional(key: &str, target: &mut Option<String>) {
    if let Ok(val) = std::env::var(key) {
        *target = if val.is_empty() { None } else { Some(val) };
    }
}

fn env_bool(key: &str, target: &mut bool) {
    if let Ok(val) = std::env::var(key) {
        *target = val.eq_ignore_ascii_case("true") || val == "1";
    }
}

fn env_parse<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = std::env::var(key) {
        if let Ok(v) = val.parse() {
            *target = v;
        }
    }
}
